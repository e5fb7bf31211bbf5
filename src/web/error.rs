use std::backtrace::Backtrace as StackTrace;

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use thiserror::Error;

/// Body of every 500 response.
pub const GENERIC_FAILURE: &str = "An error occurred. Please check the server logs for more details.";

/// Failures a request handler can end with.
#[derive(Error, Debug)]
pub enum AppError {
    /// The requested column is not in the dataset.
    #[error("Invalid column")]
    InvalidColumn,

    /// Anything else: I/O, parsing, rendering. Logged with the stack where
    /// it entered the handler, never shown.
    #[error("{error:#}")]
    Internal { error: anyhow::Error, trace: StackTrace },
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        AppError::Internal {
            error,
            trace: StackTrace::force_capture(),
        }
    }
}

impl AppError {
    /// Build the response; with `verbose` the error chain is appended to 500
    /// bodies.
    pub fn respond(self, verbose: bool) -> Response {
        match self {
            AppError::InvalidColumn => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Invalid column" })),
            )
                .into_response(),
            AppError::Internal { error, trace } => {
                log::error!("Error occurred: {error:?}\nStack trace:\n{trace}");
                let body = if verbose {
                    format!("{GENERIC_FAILURE}\n\n{error:?}")
                } else {
                    GENERIC_FAILURE.to_string()
                };
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                    body,
                )
                    .into_response()
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.respond(false)
    }
}
