//! End-to-end tests of the HTTP API against in-memory stores.

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use emojiplace_core::clock::ManualClock;
use emojiplace_llm::BackendConfig;
use emojiplace_web::{create_router, AppState, Config};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const PAINTING_AGENT: &str = r#"{"thought":"paint","messages":[{"to":"gemini-2.5-pro","content":"hi"}],"placePixel":{"x":7,"y":7,"mark":"🤖"}}"#;

fn app_with(config: Config) -> (Router, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(1_000_000));
    let state = AppState::with_clock(&config, clock.clone()).unwrap();
    (create_router(state), clock)
}

fn app() -> (Router, Arc<ManualClock>) {
    let mut config = Config::default();
    config.agents.enabled = false;
    app_with(config)
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn get(uri: &str, from: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-forwarded-for", from)
        .body(Body::empty())
        .unwrap()
}

fn post(uri: &str, from: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("x-forwarded-for", from)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health() {
    let (app, _) = app();
    let (status, body) = send(&app, get("/health", "1.1.1.1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["timestamp"], 1_000_000);
}

#[tokio::test]
async fn test_place_then_read_pixel() {
    let (app, _) = app();

    let (status, body) = send(
        &app,
        post("/api/pixels", "10.0.0.1", json!({"x": 5, "y": -5, "mark": "🙂"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pixel"]["placedBy"], "10.0.0.1");
    assert_eq!(body["cooldown"]["eligible"], false);
    assert_eq!(body["cooldown"]["remaining"], 30);

    let (status, body) = send(&app, get("/api/pixels/5/-5", "9.9.9.9")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mark"], "🙂");

    let (status, body) = send(&app, get("/api/pixels/6/-5", "9.9.9.9")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Pixel not found");
}

#[tokio::test]
async fn test_cooldown_rejection_and_expiry() {
    let (app, clock) = app();

    let place = |x: i64| post("/api/pixels", "10.0.0.2", json!({"x": x, "y": 0, "emoji": "🌵"}));

    let (status, _) = send(&app, place(0)).await;
    assert_eq!(status, StatusCode::OK);

    clock.advance(Duration::from_secs(10));
    let (status, body) = send(&app, place(1)).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["reason"], "cooldown");
    assert_eq!(body["remaining"], 20);

    let (_, body) = send(&app, get("/api/cooldown", "10.0.0.2")).await;
    assert_eq!(body["eligible"], false);

    clock.advance(Duration::from_secs(21));
    let (status, _) = send(&app, place(1)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_invalid_mark_is_bad_request() {
    let (app, _) = app();
    let (status, body) = send(
        &app,
        post("/api/pixels", "10.0.0.3", json!({"x": 0, "y": 0, "mark": "ab"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["reason"], "validation");

    // A rejected placement starts no cooldown.
    let (_, body) = send(&app, get("/api/cooldown", "10.0.0.3")).await;
    assert_eq!(body["eligible"], true);
}

#[tokio::test]
async fn test_chunk_and_region_reads() {
    let (app, _) = app();
    for (i, (x, y)) in [(1, 1), (-1, -1), (150, 2)].into_iter().enumerate() {
        let from = format!("10.0.1.{}", i);
        let (status, _) = send(
            &app,
            post("/api/pixels", &from, json!({"x": x, "y": y, "mark": "⭐"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = send(&app, get("/api/chunks/0/0", "9.9.9.9")).await;
    assert_eq!(status, StatusCode::OK);
    let pixels = body["pixels"].as_object().unwrap();
    assert_eq!(pixels.len(), 1);
    assert_eq!(pixels["1,1"]["mark"], "⭐");

    let (_, body) = send(&app, get("/api/chunks/-1/-1", "9.9.9.9")).await;
    assert!(body["pixels"]["-1,-1"].is_object());

    let (status, body) = send(&app, get("/api/pixels/region/-1/-1/200/5", "9.9.9.9")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pixels"].as_array().unwrap().len(), 3);

    let (status, _) = send(&app, get("/api/pixels/region/0/0/1001/5", "9.9.9.9")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_display_name_registration() {
    let (app, _) = app();

    let (status, body) = send(
        &app,
        post("/api/users/username", "10.0.0.4", json!({"username": "  Ada  "})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["displayName"], "Ada");

    let (_, body) = send(&app, get("/api/users/me", "10.0.0.4")).await;
    assert_eq!(body["identity"], "10.0.0.4");
    assert_eq!(body["displayName"], "Ada");
    assert_eq!(body["cooldown"]["eligible"], true);

    let (_, body) = send(
        &app,
        post("/api/pixels", "10.0.0.4", json!({"x": 3, "y": 3, "mark": "🙂"})),
    )
    .await;
    assert_eq!(body["pixel"]["displayName"], "Ada");

    let (status, _) = send(
        &app,
        post("/api/users/username", "10.0.0.4", json!({"username": "x".repeat(21)})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_agent_endpoints_disabled() {
    let (app, _) = app();
    let (status, _) = send(&app, post("/api/agents/run", "1.1.1.1", json!({}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, get("/api/agents/messages", "1.1.1.1")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_agent_run_with_mock_gateway() {
    let mut config = Config::default();
    config.agents.fallback = Some(BackendConfig {
        response: Some(PAINTING_AGENT.to_string()),
        ..BackendConfig::mock()
    });
    let (app, _) = app_with(config);

    let (status, body) = send(&app, post("/api/agents/run", "1.1.1.1", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["run"], 1);
    let agents = body["agents"].as_array().unwrap();
    assert_eq!(agents.len(), 3);
    for entry in agents {
        assert_eq!(entry[1]["status"], "completed");
    }

    let (status, body) = send(&app, get("/api/pixels/7/7", "9.9.9.9")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mark"], "🤖");

    let (_, body) = send(&app, get("/api/agents/messages?limit=2", "9.9.9.9")).await;
    let messages = body.as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["to"], "gemini-2.5-pro");
}
