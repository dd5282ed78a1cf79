use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::stream::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::BroadcastStream;

use crate::response::{AppError, SuccessResponse};
use crate::services::gateway::ExportFormat;
use crate::services::orchestrator::FlashcardError;
use crate::services::settings::SettingsPatch;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/flashcards", get(snapshot))
        .route("/languages", get(languages))
        .route("/voices", get(voices))
        .route("/settings", get(settings).patch(update_settings))
        .route("/words", post(add_words).delete(clear_words))
        .route("/export", post(export))
        .route("/notifications/stream", get(notification_stream))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddWordsRequest {
    words: Option<Vec<String>>,
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AddWordsResponse {
    word_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClearWordsResponse {
    removed: usize,
}

#[derive(Debug, Deserialize)]
struct ExportRequest {
    format: ExportFormat,
}

#[derive(Debug, Serialize)]
struct ExportResponse {
    url: String,
}

async fn snapshot(State(state): State<AppState>) -> impl IntoResponse {
    SuccessResponse::new(state.orchestrator().snapshot())
}

async fn languages(State(state): State<AppState>) -> impl IntoResponse {
    SuccessResponse::new(state.orchestrator().available_languages())
}

async fn voices(State(state): State<AppState>) -> impl IntoResponse {
    SuccessResponse::new(state.orchestrator().available_voices())
}

async fn settings(State(state): State<AppState>) -> impl IntoResponse {
    SuccessResponse::new(state.orchestrator().settings())
}

async fn update_settings(
    State(state): State<AppState>,
    Json(patch): Json<SettingsPatch>,
) -> impl IntoResponse {
    SuccessResponse::new(state.orchestrator().update_settings(patch).await)
}

/// Accepts a batch and processes it in the background; progress is observed
/// through the snapshot endpoint.
async fn add_words(
    State(state): State<AppState>,
    Json(req): Json<AddWordsRequest>,
) -> Result<impl IntoResponse, AppError> {
    let orchestrator = Arc::clone(state.orchestrator());

    let batch = match (req.words, req.text) {
        (Some(words), _) => orchestrator
            .enqueue_words(
                words
                    .into_iter()
                    .map(|w| w.trim().to_string())
                    .filter(|w| !w.is_empty()),
            )
            .ok_or(FlashcardError::EmptyInput)?,
        (None, Some(text)) => orchestrator.enqueue_text(&text)?,
        (None, None) => return Err(FlashcardError::EmptyInput.into()),
    };

    let word_ids = batch.word_ids().to_vec();
    tokio::spawn(async move {
        orchestrator.run_batch(batch).await;
    });

    Ok((StatusCode::ACCEPTED, SuccessResponse::new(AddWordsResponse { word_ids })))
}

async fn clear_words(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let removed = state.orchestrator().clear_words()?;
    Ok(SuccessResponse::new(ClearWordsResponse { removed }))
}

async fn export(
    State(state): State<AppState>,
    Json(req): Json<ExportRequest>,
) -> Result<impl IntoResponse, AppError> {
    let url = state.orchestrator().export(req.format).await?;
    Ok(SuccessResponse::new(ExportResponse { url }))
}

async fn notification_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = state.orchestrator().notifications().subscribe();

    let stream = BroadcastStream::new(receiver).filter_map(|item| async move {
        let notification = item.ok()?;
        let data = serde_json::to_string(&notification).ok()?;
        Some(Ok::<Event, Infallible>(
            Event::default()
                .id(notification.id.clone())
                .event("notification")
                .data(data),
        ))
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
