use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::services::orchestrator::FlashcardError;

#[derive(Debug, Serialize)]
pub struct SuccessResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> SuccessResponse<T> {
    pub fn new(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub code: String,
}

#[derive(Debug, Clone)]
pub struct AppError {
    status: StatusCode,
    code: String,
    message: String,
    is_operational: bool,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::CONFLICT, "CONFLICT", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "INTERNAL_ERROR".to_string(),
            message: message.into(),
            is_operational: false,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    fn operational(
        status: StatusCode,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
            is_operational: true,
        }
    }
}

impl From<FlashcardError> for AppError {
    fn from(err: FlashcardError) -> Self {
        let message = err.to_string();
        match err {
            FlashcardError::Busy => Self::operational(StatusCode::CONFLICT, "BUSY", message),
            FlashcardError::NothingToExport => {
                Self::operational(StatusCode::UNPROCESSABLE_ENTITY, "NOTHING_TO_EXPORT", message)
            }
            FlashcardError::NothingReady => {
                Self::operational(StatusCode::UNPROCESSABLE_ENTITY, "NOTHING_READY", message)
            }
            FlashcardError::ExportFailed(_) => {
                Self::operational(StatusCode::BAD_GATEWAY, "EXPORT_FAILED", message)
            }
            FlashcardError::EmptyInput => Self::bad_request(message),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = if self.is_operational {
            self.message
        } else {
            tracing::error!(code = %self.code, "{}", self.message);
            "Internal server error".to_string()
        };

        let body = ErrorResponse {
            success: false,
            error: message,
            code: self.code,
        };

        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flashcard_error_mapping() {
        let busy = AppError::from(FlashcardError::Busy);
        assert_eq!(busy.status(), StatusCode::CONFLICT);
        assert_eq!(busy.code(), "BUSY");

        let ready = AppError::from(FlashcardError::NothingReady);
        assert_eq!(ready.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let failed = AppError::from(FlashcardError::ExportFailed("down".to_string()));
        assert_eq!(failed.status(), StatusCode::BAD_GATEWAY);

        assert_eq!(AppError::from(FlashcardError::EmptyInput).status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_internal_errors_hide_message() {
        let response = AppError::internal("db exploded").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
