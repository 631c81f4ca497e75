use axum::{Json, extract::State, http::StatusCode};
use uuid::Uuid;

use crate::data_models::{Listing, NewListing, NewSearch, Search, SearchWithListings};
use crate::db::{Database, Table};
use crate::error::{ApiError, ApiResult};

use super::extractors::{ValidJson, ValidUuid};
use super::models::HealthResponse;

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::default())
}

pub async fn create_search(
    State(db): State<Database>,
    ValidJson(payload): ValidJson<NewSearch>,
) -> ApiResult<(StatusCode, Json<Search>)> {
    let on_failure = Table::Searches.write_failure();

    let search = db
        .searches_repo()
        .create(&payload)
        .await
        .map_err(|e| ApiError::write_failed(on_failure, e))?
        .ok_or_else(|| ApiError::new(on_failure, "Failed to create search"))?;

    tracing::info!("Created search {}", search.id);
    Ok((StatusCode::CREATED, Json(search)))
}

pub async fn get_search(
    State(db): State<Database>,
    ValidUuid(search_id): ValidUuid,
) -> ApiResult<Json<Search>> {
    fetch_search(&db, search_id).await.map(Json)
}

pub async fn get_listings_for_search(
    State(db): State<Database>,
    ValidUuid(search_id): ValidUuid,
) -> ApiResult<Json<Vec<Listing>>> {
    fetch_listings(&db, search_id).await.map(Json)
}

/// The search first, then its listings. A missing search stops before the listing query.
pub async fn get_search_with_listings(
    State(db): State<Database>,
    ValidUuid(search_id): ValidUuid,
) -> ApiResult<Json<SearchWithListings>> {
    let search = fetch_search(&db, search_id).await?;
    let listings = fetch_listings(&db, search_id).await?;

    Ok(Json(SearchWithListings { search, listings }))
}

pub async fn create_listing(
    State(db): State<Database>,
    ValidJson(payload): ValidJson<NewListing>,
) -> ApiResult<(StatusCode, Json<Listing>)> {
    let on_failure = Table::Listings.write_failure();

    let listing = db
        .listings_repo()
        .create(&payload)
        .await
        .map_err(|e| ApiError::write_failed(on_failure, e))?
        .ok_or_else(|| ApiError::new(on_failure, "Failed to create listing"))?;

    tracing::info!("Created listing {} for search {}", listing.id, listing.search_id);
    Ok((StatusCode::CREATED, Json(listing)))
}

pub async fn get_listing(
    State(db): State<Database>,
    ValidUuid(listing_id): ValidUuid,
) -> ApiResult<Json<Listing>> {
    db.listings_repo()
        .find_by_id(listing_id)
        .await
        .map_err(ApiError::datastore)?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Listing", listing_id))
}

async fn fetch_search(db: &Database, search_id: Uuid) -> ApiResult<Search> {
    db.searches_repo()
        .find_by_id(search_id)
        .await
        .map_err(ApiError::datastore)?
        .ok_or_else(|| ApiError::not_found("Search", search_id))
}

async fn fetch_listings(db: &Database, search_id: Uuid) -> ApiResult<Vec<Listing>> {
    db.listings_repo()
        .find_by_search(search_id)
        .await
        .map_err(ApiError::datastore)
}
