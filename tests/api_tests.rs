use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tower::ServiceExt;
use uuid::Uuid;

use scout::api::create_router;
use scout::db::{Database, RecordStore, Table};
use scout::error::StoreError;
use scout::memory_store::MemoryStore;

mod test_helpers {
    use super::*;

    pub fn spawn_app() -> (Arc<MemoryStore>, Router) {
        let store = Arc::new(MemoryStore::with_schema());
        let router = create_router(Database::new(store.clone()));
        (store, router)
    }

    pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, body)
    }

    pub async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
        send(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
    }

    pub async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
        send(
            app,
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn create_search(app: &Router, prompt: &str) -> Value {
        let (status, body) = post_json(app, "/api/searches", json!({ "prompt": prompt })).await;
        assert_eq!(status, StatusCode::CREATED);
        body
    }

    /// Wraps a store and counts calls per table.
    pub struct CountingStore {
        pub inner: MemoryStore,
        pub listing_selects: AtomicUsize,
    }

    #[async_trait]
    impl RecordStore for CountingStore {
        async fn insert(&self, table: Table, row: Value) -> Result<Vec<Value>, StoreError> {
            self.inner.insert(table, row).await
        }

        async fn select_eq(
            &self,
            table: Table,
            column: &str,
            value: &str,
        ) -> Result<Vec<Value>, StoreError> {
            if table == Table::Listings {
                self.listing_selects.fetch_add(1, Ordering::SeqCst);
            }
            self.inner.select_eq(table, column, value).await
        }
    }

    /// Accepts every insert but hands back no rows.
    pub struct SilentInsertStore;

    #[async_trait]
    impl RecordStore for SilentInsertStore {
        async fn insert(&self, _table: Table, _row: Value) -> Result<Vec<Value>, StoreError> {
            Ok(Vec::new())
        }

        async fn select_eq(
            &self,
            _table: Table,
            _column: &str,
            _value: &str,
        ) -> Result<Vec<Value>, StoreError> {
            Ok(Vec::new())
        }
    }
}

use test_helpers::*;

#[tokio::test]
async fn test_health() {
    let (_, app) = spawn_app();
    let (status, body) = get(&app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_create_search_echoes_input_and_generates_fields() {
    let (_, app) = spawn_app();
    let (status, body) = post_json(
        &app,
        "/api/searches",
        json!({
            "prompt": "2BR apartment under $2000 in downtown",
            "metadata": { "bedrooms": 2, "max_price": 2000 }
        }),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["prompt"], "2BR apartment under $2000 in downtown");
    assert_eq!(body["metadata"], json!({ "bedrooms": 2, "max_price": 2000 }));
    assert!(Uuid::parse_str(body["id"].as_str().unwrap()).is_ok());
    assert!(body["created_at"].is_string());
}

#[tokio::test]
async fn test_create_search_without_metadata_returns_null_metadata() {
    let (_, app) = spawn_app();
    let body = create_search(&app, "studio near the beach").await;
    assert_eq!(body["metadata"], Value::Null);
}

#[tokio::test]
async fn test_read_after_write_returns_same_search() {
    let (_, app) = spawn_app();
    let created = create_search(&app, "loft").await;
    let id = created["id"].as_str().unwrap();

    let (status, fetched) = get(&app, &format!("/api/searches/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created);
}

#[tokio::test]
async fn test_missing_search_is_404() {
    let (_, app) = spawn_app();
    let id = Uuid::new_v4();
    let (status, body) = get(&app, &format!("/api/searches/{id}")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], format!("Search with ID {id} not found"));
    assert_eq!(body["status"], 404);
}

#[tokio::test]
async fn test_missing_listing_is_404() {
    let (_, app) = spawn_app();
    let id = Uuid::new_v4();
    let (status, body) = get(&app, &format!("/api/listings/{id}")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], format!("Listing with ID {id} not found"));
}

#[tokio::test]
async fn test_malformed_id_is_rejected_before_lookup() {
    let store = Arc::new(CountingStore {
        inner: MemoryStore::with_schema(),
        listing_selects: AtomicUsize::new(0),
    });
    let app = create_router(Database::new(store.clone()));

    for uri in ["/api/searches/not-a-uuid/full", "/api/listings/42"] {
        let (status, body) = get(&app, uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body["status"], 400);
        assert!(body["error"].as_str().unwrap().contains("expected a UUID"));
    }
    assert_eq!(store.listing_selects.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_search_without_listings_returns_empty_list() {
    let (_, app) = spawn_app();
    let created = create_search(&app, "cabin").await;
    let id = created["id"].as_str().unwrap();

    let (status, body) = get(&app, &format!("/api/searches/{id}/listings")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_listings_for_unknown_search_is_empty_not_404() {
    let (_, app) = spawn_app();
    let (status, body) = get(&app, &format!("/api/searches/{}/listings", Uuid::new_v4())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_listing_with_unknown_search_is_400() {
    let (store, app) = spawn_app();
    let (status, body) = post_json(
        &app,
        "/api/listings",
        json!({ "search_id": Uuid::new_v4(), "link": "https://example.com/listing/1" }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let message = body["error"].as_str().unwrap();
    assert!(message.starts_with("Database error:"));
    assert!(message.contains("foreign key"));
    assert_eq!(store.row_count(Table::Listings), 0);
}

#[tokio::test]
async fn test_create_and_fetch_listing() {
    let (_, app) = spawn_app();
    let search = create_search(&app, "duplex").await;

    let (status, created) = post_json(
        &app,
        "/api/listings",
        json!({
            "search_id": search["id"],
            "link": "https://example.com/listing/7",
            "metadata": { "zone": "Pocitos", "price": 1800 }
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["search_id"], search["id"]);
    assert_eq!(created["link"], "https://example.com/listing/7");

    let id = created["id"].as_str().unwrap();
    let (status, fetched) = get(&app, &format!("/api/listings/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created);
}

#[tokio::test]
async fn test_full_search_scenario() {
    let (_, app) = spawn_app();
    let (status, search) = post_json(
        &app,
        "/api/searches",
        json!({
            "prompt": "2BR apartment under $2000 in downtown",
            "metadata": { "bedrooms": 2, "max_price": 2000 }
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = search["id"].as_str().unwrap().to_string();

    let (status, _) = post_json(
        &app,
        "/api/listings",
        json!({ "search_id": id, "link": "https://example.com/listing/1" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, full) = get(&app, &format!("/api/searches/{id}/full")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(full["search"], search);
    let listings = full["listings"].as_array().unwrap();
    assert_eq!(listings.len(), 1);
    assert_eq!(listings[0]["link"], "https://example.com/listing/1");
    assert_eq!(listings[0]["search_id"], json!(id));
}

#[tokio::test]
async fn test_full_search_returns_every_listing() {
    let (_, app) = spawn_app();
    let search = create_search(&app, "penthouse").await;
    let other = create_search(&app, "garage").await;

    for n in 0..3 {
        let (status, _) = post_json(
            &app,
            "/api/listings",
            json!({ "search_id": search["id"], "link": format!("https://example.com/{n}") }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }
    post_json(
        &app,
        "/api/listings",
        json!({ "search_id": other["id"], "link": "https://example.com/other" }),
    )
    .await;

    let id = search["id"].as_str().unwrap();
    let (_, full) = get(&app, &format!("/api/searches/{id}/full")).await;
    let listings = full["listings"].as_array().unwrap();
    assert_eq!(listings.len(), 3);
    assert!(listings.iter().all(|l| l["search_id"] == search["id"]));
}

#[tokio::test]
async fn test_full_search_for_missing_search_skips_listing_fetch() {
    let store = Arc::new(CountingStore {
        inner: MemoryStore::with_schema(),
        listing_selects: AtomicUsize::new(0),
    });
    let app = create_router(Database::new(store.clone()));

    let (status, _) = get(&app, &format!("/api/searches/{}/full", Uuid::new_v4())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(store.listing_selects.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_datastore_outage_maps_per_operation() {
    let (store, app) = spawn_app();
    let search = create_search(&app, "farm").await;
    store.set_offline(true);

    let (status, body) = post_json(&app, "/api/searches", json!({ "prompt": "x" })).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().starts_with("Database error:"));

    let (status, _) = post_json(
        &app,
        "/api/listings",
        json!({ "search_id": search["id"], "link": "https://example.com/1" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let id = search["id"].as_str().unwrap();
    for uri in [
        format!("/api/searches/{id}"),
        format!("/api/searches/{id}/listings"),
        format!("/api/searches/{id}/full"),
        format!("/api/listings/{}", Uuid::new_v4()),
    ] {
        let (status, _) = get(&app, &uri).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{uri}");
    }
}

#[tokio::test]
async fn test_insert_without_returned_row_is_an_error() {
    let app = create_router(Database::new(Arc::new(SilentInsertStore)));

    let (status, body) = post_json(&app, "/api/searches", json!({ "prompt": "x" })).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to create search");

    let (status, body) = post_json(
        &app,
        "/api/listings",
        json!({ "search_id": Uuid::new_v4(), "link": "https://example.com/1" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Failed to create listing");
}

#[tokio::test]
async fn test_create_search_requires_prompt() {
    let (store, app) = spawn_app();
    let (status, body) = post_json(&app, "/api/searches", json!({ "metadata": {} })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
    assert!(body["error"].as_str().unwrap().contains("prompt"));
    assert_eq!(store.row_count(Table::Searches), 0);
}

#[tokio::test]
async fn test_invalid_listing_payloads_use_error_body() {
    let (store, app) = spawn_app();

    let (status, body) = post_json(
        &app,
        "/api/listings",
        json!({ "search_id": "nope", "link": "https://example.com/1" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    // Missing content type
    let (status, body) = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/api/listings")
            .body(Body::from(r#"{"search_id": "x", "link": "y"}"#))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);

    assert_eq!(store.row_count(Table::Listings), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_listing_creates_share_one_handle() {
    const N: usize = 32;
    let (store, app) = spawn_app();
    let search = create_search(&app, "shared").await;

    let tasks: Vec<_> = (0..N)
        .map(|n| {
            let app = app.clone();
            let search_id = search["id"].clone();
            tokio::spawn(async move {
                post_json(
                    &app,
                    "/api/listings",
                    json!({ "search_id": search_id, "link": format!("https://example.com/{n}") }),
                )
                .await
            })
        })
        .collect();

    for task in tasks {
        let (status, _) = task.await.unwrap();
        assert_eq!(status, StatusCode::CREATED);
    }

    let id = search["id"].as_str().unwrap();
    let (status, full) = get(&app, &format!("/api/searches/{id}/full")).await;
    assert_eq!(status, StatusCode::OK);
    let listings = full["listings"].as_array().unwrap();
    assert_eq!(listings.len(), N);
    assert!(listings.iter().all(|l| l["search_id"] == search["id"]));
    assert_eq!(store.row_count(Table::Listings), N);
}
