//! Integration tests for the HTTP API
//!
//! Tests cover:
//! - Insert, lookup, update and delete of taxa
//! - Error kinds mapped to status codes and error bodies
//! - Paged listings and prefix search
//! - Batch insert, boolean queries and export

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use taxon_db::taxonomy::observer::NoopObserver;
use taxon_db::web::server::{build_router, AppState};
use taxon_db::{RankSchema, TaxonStore};
use tower::util::ServiceExt; // for `oneshot` method

/// Test helper: Create app over an empty store
fn setup_app() -> Router {
    let store = TaxonStore::with_observer(
        RankSchema::load_embedded().expect("embedded schema"),
        Arc::new(NoopObserver),
    );
    build_router(Arc::new(AppState::new(store)))
}

/// Test helper: Create request with an optional JSON body
fn test_request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder().method(method).uri(uri);
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Test helper: Extract JSON body from response
async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

/// Test helper: Send one request and decode the response
async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(test_request(method, uri, body))
        .await
        .unwrap();
    let status = response.status();
    (status, extract_json(response.into_body()).await)
}

/// Test helper: Insert a taxon and return its id
async fn insert(app: &Router, name: &str, rank: &str, parent: Option<u64>) -> u64 {
    let (status, body) = send(
        app,
        "POST",
        "/api/taxa",
        Some(json!({"name": name, "rank": rank, "parent_id": parent})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["id"].as_u64().unwrap()
}

// =============================================================================
// Service endpoints
// =============================================================================

#[tokio::test]
async fn test_health_and_ranks() {
    let app = setup_app();

    let (status, body) = send(&app, "GET", "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["taxa"], 0);
    assert!(body["version"].is_string());

    let (status, body) = send(&app, "GET", "/api/ranks", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ranks"][0], "domain");
    assert_eq!(body["ranks"][7], "species");
}

#[tokio::test]
async fn test_unknown_route_uses_error_shape() {
    let app = setup_app();
    let (status, body) = send(&app, "GET", "/api/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error_type"], "invalid_request");
}

// =============================================================================
// Taxon CRUD
// =============================================================================

#[tokio::test]
async fn test_insert_and_lookup() {
    let app = setup_app();
    let animalia = insert(&app, "Animalia", "kingdom", None).await;
    let chordata = insert(&app, "Chordata", "phylum", Some(animalia)).await;

    let (status, body) = send(&app, "GET", &format!("/api/taxa/{chordata}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Chordata");
    assert_eq!(body["rank"], "phylum");
    assert_eq!(body["parent_id"], animalia);

    let (status, body) = send(&app, "GET", "/api/names/CHORDATA", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], chordata);

    let (_, body) = send(&app, "GET", &format!("/api/taxa/{animalia}/children"), None).await;
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
    assert!(body.get("next_cursor").is_none());

    let (_, body) = send(&app, "GET", &format!("/api/taxa/{chordata}/ancestors"), None).await;
    assert_eq!(body[0]["name"], "Animalia");
}

#[tokio::test]
async fn test_error_status_mapping() {
    let app = setup_app();
    let animalia = insert(&app, "Animalia", "kingdom", None).await;
    let chordata = insert(&app, "Chordata", "phylum", Some(animalia)).await;

    let cases = [
        ("GET", "/api/taxa/999".to_string(), None, StatusCode::NOT_FOUND, "not_found"),
        (
            "POST",
            "/api/taxa".to_string(),
            Some(json!({"name": "animalia", "rank": "kingdom"})),
            StatusCode::CONFLICT,
            "duplicate_name",
        ),
        (
            "PATCH",
            format!("/api/taxa/{animalia}"),
            Some(json!({"parent_id": chordata})),
            StatusCode::CONFLICT,
            "cycle_detected",
        ),
        (
            "DELETE",
            format!("/api/taxa/{animalia}"),
            None,
            StatusCode::CONFLICT,
            "has_children",
        ),
        (
            "POST",
            "/api/taxa".to_string(),
            Some(json!({"name": "Plantae", "rank": "realm"})),
            StatusCode::UNPROCESSABLE_ENTITY,
            "invalid_rank",
        ),
        (
            "POST",
            "/api/taxa".to_string(),
            Some(json!({"name": "Vertebrata", "rank": "kingdom", "parent_id": chordata})),
            StatusCode::UNPROCESSABLE_ENTITY,
            "rank_order_violation",
        ),
        (
            "POST",
            "/api/taxa".to_string(),
            Some(json!({"name": "Vertebrata", "rank": "class", "parent_id": 77})),
            StatusCode::UNPROCESSABLE_ENTITY,
            "missing_parent",
        ),
        (
            "POST",
            "/api/taxa".to_string(),
            Some(json!({"name": "   ", "rank": "class"})),
            StatusCode::BAD_REQUEST,
            "invalid_input",
        ),
    ];

    for (method, uri, body, status, error_type) in cases {
        let (actual, response) = send(&app, method, &uri, body).await;
        assert_eq!(actual, status, "{method} {uri}: {response}");
        assert_eq!(response["error_type"], error_type, "{method} {uri}");
        assert!(response["error"].is_string());
    }

    // Nothing changed
    let (_, stats) = send(&app, "GET", "/api/stats", None).await;
    assert_eq!(stats["taxa"], 2);
}

#[tokio::test]
async fn test_malformed_requests_are_rejected() {
    let app = setup_app();

    let (status, body) = send(&app, "GET", "/api/taxa/not-a-number", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_type"], "invalid_request");

    let (status, body) = send(&app, "POST", "/api/taxa", Some(json!({"rank": "genus"}))).await;
    assert!(status.is_client_error());
    assert_eq!(body["error_type"], "invalid_request");

    let (status, _) = send(&app, "GET", "/api/taxa?limit=0", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "GET", "/api/taxa?cursor=zz", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_and_synonyms() {
    let app = setup_app();
    let canidae = insert(&app, "Canidae", "family", None).await;
    let canis = insert(&app, "Canis", "genus", Some(canidae)).await;

    let (status, body) = send(
        &app,
        "PATCH",
        &format!("/api/taxa/{canis}"),
        Some(json!({"name": "Lupulella", "synonyms": ["Jackals"]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["name"], "Lupulella");
    assert_eq!(body["synonyms"], json!(["Jackals"]));

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/taxa/{canis}/synonyms"),
        Some(json!({"synonym": "Side-striped jackals"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["synonyms"].as_array().unwrap().len(), 2);

    let (status, body) = send(&app, "DELETE", &format!("/api/taxa/{canis}/synonyms/Jackals"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["synonyms"], json!(["Side-striped jackals"]));

    // Explicit null moves the taxon to the root level
    let (_, body) = send(
        &app,
        "PATCH",
        &format!("/api/taxa/{canis}"),
        Some(json!({"parent_id": null})),
    )
    .await;
    assert!(body.get("parent_id").map_or(true, Value::is_null));
}

#[tokio::test]
async fn test_delete_with_policy() {
    let app = setup_app();
    let canidae = insert(&app, "Canidae", "family", None).await;
    let canis = insert(&app, "Canis", "genus", Some(canidae)).await;

    let (status, body) = send(&app, "DELETE", &format!("/api/taxa/{canidae}?policy=cascade"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], json!([canidae, canis]));

    let (status, body) = send(&app, "GET", &format!("/api/taxa/{canis}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("deleted"));

    let (status, _) = send(&app, "DELETE", &format!("/api/taxa/{canidae}?policy=shred"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Listing, search and query
// =============================================================================

#[tokio::test]
async fn test_roots_are_paged() {
    let app = setup_app();
    for name in ["Fungi", "Animalia", "Plantae"] {
        insert(&app, name, "kingdom", None).await;
    }

    let (_, first) = send(&app, "GET", "/api/taxa?limit=2", None).await;
    assert_eq!(first["items"][0]["name"], "Animalia");
    assert_eq!(first["items"][1]["name"], "Fungi");
    let cursor = first["next_cursor"].as_str().unwrap();

    let (_, second) = send(&app, "GET", &format!("/api/taxa?limit=2&cursor={cursor}"), None).await;
    assert_eq!(second["items"][0]["name"], "Plantae");
    assert!(second.get("next_cursor").is_none());
}

#[tokio::test]
async fn test_search_matches_synonyms() {
    let app = setup_app();
    let (status, _) = send(
        &app,
        "POST",
        "/api/taxa",
        Some(json!({"name": "Canis lupus", "rank": "species", "synonyms": ["Grey wolf"]})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&app, "GET", "/api/search?prefix=grey", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"][0]["matched"], "grey wolf");
    assert_eq!(body["items"][0]["kind"], "synonym");
    assert_eq!(body["items"][0]["taxon"]["name"], "Canis lupus");
}

#[tokio::test]
async fn test_batch_query_and_export() {
    let app = setup_app();
    let (status, body) = send(
        &app,
        "POST",
        "/api/taxa/batch",
        Some(json!([
            {"key": "lupus", "name": "Canis lupus", "rank": "species", "parent": {"key": "canis"}},
            {"key": "canis", "name": "Canis", "rank": "genus"},
            {"key": "latrans", "name": "Canis latrans", "rank": "species", "parent": {"key": "canis"}}
        ])),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["inserted"].as_array().unwrap().len(), 3);
    let canis = body["inserted"][1]["id"].as_u64().unwrap();

    let (status, body) = send(
        &app,
        "POST",
        "/api/query",
        Some(json!({"and": [{"rank": "species"}, {"under": canis}]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    assert_eq!(body["taxa"][0]["name"], "Canis latrans");

    let (status, body) = send(&app, "GET", "/api/export", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["taxa"].as_array().unwrap().len(), 3);
    assert_eq!(body["next_id"], 4);

    // A failing batch inserts nothing
    let (status, _) = send(
        &app,
        "POST",
        "/api/taxa/batch",
        Some(json!([
            {"key": "a", "name": "Vulpes", "rank": "genus"},
            {"key": "b", "name": "Vulpes vulpes", "rank": "species", "parent": {"key": "nowhere"}}
        ])),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let (status, _) = send(&app, "GET", "/api/names/Vulpes", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
