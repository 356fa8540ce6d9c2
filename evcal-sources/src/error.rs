//! Error types for evcal-sources
//!
//! Only failures that end a request live here. Validation problems and the
//! expected fetch failures are carried on `Source::errors` instead.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Main error type for evcal-sources
#[derive(Error, Debug)]
pub enum Error {
    /// Database connection or query errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Configuration or startup errors from evcal-common
    #[error(transparent)]
    Common(#[from] evcal_common::Error),

    /// Record lookup by id failed; the message matches what users see
    #[error("Couldn't find {kind} with ID={id}")]
    NotFound { kind: &'static str, id: String },

    /// Feed fetch failed in a way the import workflow does not translate
    #[error("Import failed: {0}")]
    Fetch(#[source] crate::fetcher::FetchError),

    /// Invalid request
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl Error {
    pub fn source_not_found(id: impl Into<String>) -> Self {
        Error::NotFound {
            kind: "Source",
            id: id.into(),
        }
    }

    pub fn event_not_found(id: impl Into<String>) -> Self {
        Error::NotFound {
            kind: "Event",
            id: id.into(),
        }
    }
}

/// Convenience Result type using evcal-sources Error
pub type Result<T> = std::result::Result<T, Error>;

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::BadRequest(_) => StatusCode::BAD_REQUEST,
            Error::Database(_) | Error::Common(_) | Error::Fetch(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }

        let body = Json(json!({
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}
