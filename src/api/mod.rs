use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::db::Database;

pub mod extractors;
pub mod handlers;
pub mod models;

pub fn create_router(db: Database) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .route("/searches", post(handlers::create_search))
        .route("/searches/:id", get(handlers::get_search))
        .route("/searches/:id/listings", get(handlers::get_listings_for_search))
        .route("/searches/:id/full", get(handlers::get_search_with_listings))
        .route("/listings", post(handlers::create_listing))
        .route("/listings/:id", get(handlers::get_listing));

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api", api)
        .with_state(db)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
