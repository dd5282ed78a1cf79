mod flashcards;
mod health;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use axum::Router;
use tower_http::services::ServeDir;

use crate::response::ErrorResponse;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let exports = ServeDir::new(state.export_dir());
    let audio = ServeDir::new(state.audio_dir());

    Router::new()
        .nest("/health", health::router())
        .nest("/api", flashcards::router())
        .nest_service("/exports", exports)
        .nest_service("/audio", audio)
        .fallback(fallback_handler)
        .with_state(state)
}

async fn fallback_handler() -> Response {
    let body = ErrorResponse {
        success: false,
        error: "Not found".to_string(),
        code: "NOT_FOUND".to_string(),
    };
    (StatusCode::NOT_FOUND, Json(body)).into_response()
}
