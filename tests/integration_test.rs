use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use flashcard_forge::services::simulated_gateway::SimulatedGateway;

mod common;

async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn json(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health_live() {
    let app = common::create_test_app(SimulatedGateway::new());
    let (status, _) = send(&app.router, get("/health/live")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_health_root_reports_processing_flag() {
    let app = common::create_test_app(SimulatedGateway::new());
    let (status, body) = send(&app.router, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isProcessing"], false);
    assert_eq!(body["wordCount"], 0);
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let app = common::create_test_app(SimulatedGateway::new());
    let (status, body) = send(&app.router, get("/api/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_snapshot_shape() {
    let app = common::create_test_app(SimulatedGateway::new());
    app.orchestrator.load_catalog().await;

    let (status, body) = send(&app.router, get("/api/flashcards")).await;
    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert!(data["words"].as_array().unwrap().is_empty());
    assert_eq!(data["isProcessing"], false);
    assert_eq!(data["settings"]["sourceLanguage"], "en");
    assert_eq!(data["settings"]["translationDirection"], "sourceToTarget");
    assert_eq!(data["settings"]["selectedVoice"], "es-ES-ElviraNeural");
    assert_eq!(data["availableLanguages"].as_array().unwrap().len(), 10);
    assert_eq!(data["availableVoices"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_add_words_then_export() {
    let app = common::create_test_app(SimulatedGateway::new());

    let (status, body) = send(
        &app.router,
        json("POST", "/api/words", serde_json::json!({ "text": "run, jump\nswim" })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["data"]["wordIds"].as_array().unwrap().len(), 3);

    let orchestrator = app.orchestrator.clone();
    common::wait_until(|| !orchestrator.is_processing()).await;

    let (_, body) = send(&app.router, get("/api/flashcards")).await;
    let words = body["data"]["words"].as_array().unwrap();
    assert_eq!(words.len(), 3);
    assert!(words.iter().all(|w| w["status"] == "completed"));
    assert_eq!(words[2]["sourceWord"], "swim");

    let (status, body) = send(
        &app.router,
        json("POST", "/api/export", serde_json::json!({ "format": "csv" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["url"].as_str().unwrap().contains("format=csv"));
}

#[tokio::test]
async fn test_add_words_rejects_empty_input() {
    let app = common::create_test_app(SimulatedGateway::new());

    let (status, body) = send(
        &app.router,
        json("POST", "/api/words", serde_json::json!({ "words": ["  ", ""] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, _) = send(&app.router, json("POST", "/api/words", serde_json::json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(app.orchestrator.words().is_empty());
}

#[tokio::test]
async fn test_export_guard_statuses() {
    let app = common::create_test_app(SimulatedGateway::new().failing_on("bad"));

    let (status, body) = send(
        &app.router,
        json("POST", "/api/export", serde_json::json!({ "format": "html" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "NOTHING_TO_EXPORT");

    app.orchestrator.add_words(["bad"]).await;
    let (status, body) = send(
        &app.router,
        json("POST", "/api/export", serde_json::json!({ "format": "html" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "NOTHING_READY");
    assert!(app.gateway.export_calls().is_empty());
}

#[tokio::test]
async fn test_export_gateway_failure_is_bad_gateway() {
    let app = common::create_test_app(SimulatedGateway::new());
    app.orchestrator.add_words(["run"]).await;
    app.gateway.set_fail_exports(true);

    let (status, body) = send(
        &app.router,
        json("POST", "/api/export", serde_json::json!({ "format": "anki" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["code"], "EXPORT_FAILED");
}

#[tokio::test]
async fn test_clear_conflicts_while_busy() {
    let app = common::create_test_app(SimulatedGateway::with_latency_scale(0.02));

    let (status, _) = send(
        &app.router,
        json("POST", "/api/words", serde_json::json!({ "words": ["run"] })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let delete = Request::builder()
        .method("DELETE")
        .uri("/api/words")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app.router, delete).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "BUSY");
    assert_eq!(app.orchestrator.words().len(), 1);

    let orchestrator = app.orchestrator.clone();
    common::wait_until(|| !orchestrator.is_processing()).await;

    let delete = Request::builder()
        .method("DELETE")
        .uri("/api/words")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app.router, delete).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["removed"], 1);
}

#[tokio::test]
async fn test_patch_settings_refreshes_voices() {
    let app = common::create_test_app(SimulatedGateway::new());

    let (status, body) = send(
        &app.router,
        json(
            "PATCH",
            "/api/settings",
            serde_json::json!({ "targetLanguage": "de", "toneInstructions": "friendly" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["targetLanguage"], "de");
    assert_eq!(body["data"]["toneInstructions"], "friendly");
    assert_eq!(body["data"]["selectedVoice"], "de-DE-KatjaNeural");

    let (_, body) = send(&app.router, get("/api/voices")).await;
    let voices = body["data"].as_array().unwrap();
    assert!(voices.iter().all(|v| v["language"] == "de"));
}
