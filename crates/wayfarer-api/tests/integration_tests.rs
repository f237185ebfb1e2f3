//! Integration tests for the Wayfarer API.
//!
//! Drives the full router with `oneshot` requests. Each test builds its own
//! in-memory catalog seeded with the demo offers and uses heuristic
//! extraction only, so no network access is needed. Prompts avoid relative
//! dates so results do not depend on the day the suite runs.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use wayfarer_api::create_router;
use wayfarer_api::error::ErrorBody;
use wayfarer_api::handlers::HealthResponse;
use wayfarer_api::state::AppState;
use wayfarer_chat::{SqliteCatalog, SuggestResponse, SuggestService};
use wayfarer_core::config::WayfarerConfig;
use wayfarer_storage::{seed_demo_catalog, Database, OfferRepository};

// =============================================================================
// Helpers
// =============================================================================

/// Create a fresh AppState over a seeded in-memory catalog.
fn make_state() -> AppState {
    let config = WayfarerConfig::default();
    let db = Arc::new(Database::in_memory().unwrap());
    let repo = OfferRepository::new(db);
    seed_demo_catalog(&repo).unwrap();
    let service = SuggestService::new(&config, Arc::new(SqliteCatalog::new(repo)));
    AppState::new(config, service)
}

fn make_app() -> axum::Router {
    create_router(make_state())
}

fn post_json(uri: &str, json: &str) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(json.to_string()))
        .unwrap()
}

fn suggest_request(body: Value) -> Request<Body> {
    post_json("/chat/suggest", &body.to_string())
}

async fn body_bytes(resp: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .unwrap()
        .to_vec()
}

async fn suggest_ok(app: &axum::Router, body: Value) -> SuggestResponse {
    let resp = app.clone().oneshot(suggest_request(body)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    serde_json::from_slice(&body_bytes(resp).await).unwrap()
}

async fn expect_bad_request(app: &axum::Router, request: Request<Body>) -> ErrorBody {
    let resp = app.clone().oneshot(request).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: ErrorBody = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(body.error, "bad_request");
    body
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_happy_path() {
    let app = make_app();
    let resp = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let health: HealthResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(health.status, "healthy");
    assert_eq!(health.active_conversations, 0);
    assert!(!health.llm_enabled);
}

#[tokio::test]
async fn test_health_counts_conversations() {
    let app = make_app();
    suggest_ok(&app, json!({ "prompt": "trip to Cairo" })).await;
    suggest_ok(&app, json!({ "prompt": "trip to Luxor" })).await;

    let resp = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let health: HealthResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(health.active_conversations, 2);
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let app = make_app();
    let resp = app
        .oneshot(Request::get("/offers").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: ErrorBody = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(body.error, "not_found");
}

// =============================================================================
// POST /chat/suggest - happy paths
// =============================================================================

#[tokio::test]
async fn test_suggest_response_shape() {
    let app = make_app();
    let resp = app
        .oneshot(suggest_request(json!({ "prompt": "trip to Paris under $1200" })))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert!(body["conversationId"].as_str().is_some_and(|id| !id.is_empty()));
    assert_eq!(body["extracted"]["destination"], "Paris, France");
    assert_eq!(body["extracted"]["budgetMax"], 1200.0);
    assert!(body["extracted"]["mustInclude"].is_array());
    assert_eq!(body["offers"].as_array().unwrap().len(), 1);
    assert_eq!(body["offers"][0]["title"], "Paris City Break");
    assert_eq!(body["nextQuestion"], "How many days would you like the trip to last?");
    assert_eq!(body["meta"]["enoughFilters"], false);
    assert_eq!(body["meta"]["usedRelaxations"]["dateRelaxed"], false);
    assert_eq!(body["meta"]["usedRelaxations"]["budgetRelaxed"], false);
}

#[tokio::test]
async fn test_suggest_without_destination_asks_for_it() {
    let app = make_app();
    let response = suggest_ok(&app, json!({ "prompt": "a cheap luxury trip under $900" })).await;
    assert!(response.offers.is_empty());
    assert_eq!(
        response.next_question.as_deref(),
        Some("Where would you like to go?")
    );
    assert_eq!(response.extracted.budget_max, Some(900.0));
}

#[tokio::test]
async fn test_suggest_budget_relaxation_and_strict() {
    let app = make_app();

    let relaxed = suggest_ok(&app, json!({ "prompt": "to Bali under $1000" })).await;
    assert_eq!(relaxed.offers.len(), 1);
    assert!(!relaxed.meta.used_relaxations.date_relaxed);
    assert!(relaxed.meta.used_relaxations.budget_relaxed);

    let strict = suggest_ok(&app, json!({ "prompt": "to Bali under $1000", "strict": true })).await;
    assert!(strict.offers.is_empty());
    assert!(!strict.meta.used_relaxations.date_relaxed);
    assert!(!strict.meta.used_relaxations.budget_relaxed);
}

#[tokio::test]
async fn test_suggest_sort_and_limit() {
    let app = make_app();
    let response = suggest_ok(
        &app,
        json!({ "prompt": "a trip to Egypt", "sort": "price:desc", "limit": 3 }),
    )
    .await;
    let prices: Vec<f64> = response.offers.iter().map(|o| o.price).collect();
    assert_eq!(prices, vec![18000.0, 15000.0, 12000.0]);
}

#[tokio::test]
async fn test_suggest_multi_turn_conversation() {
    let app = make_app();

    let first = suggest_ok(&app, json!({ "prompt": "trip to Paris" })).await;
    assert_eq!(first.next_question.as_deref(), Some("Any budget range in mind?"));

    let second = suggest_ok(
        &app,
        json!({ "prompt": "1200", "conversationId": first.conversation_id }),
    )
    .await;
    assert_eq!(second.conversation_id, first.conversation_id);
    assert_eq!(second.extracted.destination.as_deref(), Some("Paris, France"));
    assert_eq!(second.extracted.budget_max, Some(1200.0));

    let third = suggest_ok(
        &app,
        json!({ "prompt": "5", "conversationId": first.conversation_id }),
    )
    .await;
    assert_eq!(third.extracted.duration_days, Some(5));
    assert!(third.meta.enough_filters);
    assert_eq!(third.offers.len(), 1);
}

#[tokio::test]
async fn test_suggest_unknown_conversation_id_starts_fresh() {
    let app = make_app();
    let response = suggest_ok(
        &app,
        json!({ "prompt": "trip to Luxor", "conversationId": "client-chosen-id" }),
    )
    .await;
    assert_eq!(response.conversation_id, "client-chosen-id");
    assert_eq!(response.extracted.destination.as_deref(), Some("Luxor"));
}

// =============================================================================
// POST /chat/suggest - validation
// =============================================================================

#[tokio::test]
async fn test_suggest_rejects_empty_prompt() {
    let app = make_app();
    let body = expect_bad_request(&app, suggest_request(json!({ "prompt": "   " }))).await;
    assert!(body.message.contains("prompt"));
}

#[tokio::test]
async fn test_suggest_rejects_missing_prompt() {
    let app = make_app();
    expect_bad_request(&app, suggest_request(json!({ "limit": 5 }))).await;
}

#[tokio::test]
async fn test_suggest_rejects_out_of_range_limit() {
    let app = make_app();
    for limit in [0, 51, -1] {
        let body = expect_bad_request(
            &app,
            suggest_request(json!({ "prompt": "trip to Cairo", "limit": limit })),
        )
        .await;
        assert!(body.message.contains("limit"), "{}", body.message);
    }
}

#[tokio::test]
async fn test_suggest_rejects_unknown_sort() {
    let app = make_app();
    let body = expect_bad_request(
        &app,
        suggest_request(json!({ "prompt": "trip to Cairo", "sort": "popularity" })),
    )
    .await;
    assert!(body.message.contains("sort"));
}

#[tokio::test]
async fn test_suggest_rejects_wrong_types() {
    let app = make_app();
    expect_bad_request(
        &app,
        suggest_request(json!({ "prompt": "trip to Cairo", "strict": "yes" })),
    )
    .await;
    expect_bad_request(&app, suggest_request(json!({ "prompt": 42 }))).await;
}

#[tokio::test]
async fn test_suggest_rejects_malformed_json() {
    let app = make_app();
    expect_bad_request(&app, post_json("/chat/suggest", "{ prompt: ")).await;
}

#[tokio::test]
async fn test_suggest_rejects_missing_content_type() {
    let app = make_app();
    let request = Request::post("/chat/suggest")
        .body(Body::from(r#"{"prompt":"trip to Cairo"}"#))
        .unwrap();
    expect_bad_request(&app, request).await;
}

#[tokio::test]
async fn test_suggest_rejects_oversized_conversation_id() {
    let app = make_app();
    expect_bad_request(
        &app,
        suggest_request(json!({ "prompt": "trip to Cairo", "conversationId": "x".repeat(200) })),
    )
    .await;
}

#[tokio::test]
async fn test_rejected_requests_create_no_conversation() {
    let state = make_state();
    let app = create_router(state.clone());
    expect_bad_request(
        &app,
        suggest_request(json!({ "prompt": "", "conversationId": "c1" })),
    )
    .await;
    assert!(state.suggest.conversations().is_empty());
}
