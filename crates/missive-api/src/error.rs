use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use missive_db::MessageError;
use missive_types::models::ContentError;

/// Every failure a handler can return, already classified by who is at
/// fault.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or unrecognised input.
    #[error("{0}")]
    Validation(String),

    /// No credentials were presented.
    #[error("forbidden")]
    Forbidden,

    /// Credentials were presented but do not match a live session.
    #[error("unauthorized")]
    Unauthorized,

    #[error("{0}")]
    Conflict(String),

    /// Store or internal failure.
    #[error("internal error: {0}")]
    Store(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ContentError> for ApiError {
    fn from(e: ContentError) -> Self {
        Self::Validation(e.to_string())
    }
}

impl From<MessageError> for ApiError {
    fn from(e: MessageError) -> Self {
        match e {
            MessageError::TransactionFailed(source) => Self::Store(source),
            client => Self::Validation(client.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::Validation(msg) | Self::Conflict(msg) => msg.clone(),
            Self::Store(e) => {
                // Details stay in the log.
                error!("Request failed: {:#}", e);
                status.canonical_reason().unwrap_or_default().to_string()
            }
            Self::Forbidden | Self::Unauthorized => {
                status.canonical_reason().unwrap_or_default().to_string()
            }
        };
        (status, body).into_response()
    }
}
