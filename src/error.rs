use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use tracing::error;

use crate::broker::BrokerError;

/// Errors surfaced by HTTP handlers.
///
/// Bodies stay generic: details go to the log, never to the client.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("failed to enqueue job")]
    Enqueue(#[source] BrokerError),

    #[error("broker error")]
    Broker(#[source] BrokerError),

    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl From<BrokerError> for ApiError {
    fn from(err: BrokerError) -> Self {
        match err {
            BrokerError::NotFound { queue, id } => {
                ApiError::NotFound(format!("job {id} not found in queue {queue}"))
            }
            err @ (BrokerError::InvalidState { .. }
            | BrokerError::UnsupportedStatus(_)
            | BrokerError::DelayOutOfRange(_)) => {
                ApiError::BadRequest(err.to_string())
            }
            other => ApiError::Broker(other),
        }
    }
}

impl ApiError {
    /// Enqueue failures stay a generic 500 unless the job options were bad.
    pub fn enqueue(err: BrokerError) -> Self {
        match err {
            err @ BrokerError::DelayOutOfRange(_) => ApiError::BadRequest(err.to_string()),
            other => ApiError::Enqueue(other),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Enqueue(_) | ApiError::Broker(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            ApiError::Unauthorized => "Unauthorized".to_string(),
            ApiError::NotFound(msg) | ApiError::BadRequest(msg) => msg.clone(),
            ApiError::Enqueue(err) => {
                error!(error = %err, "failed to enqueue job");
                "Failed to enqueue job".to_string()
            }
            ApiError::Broker(err) => {
                error!(error = %err, "broker request failed");
                "Internal server error".to_string()
            }
            ApiError::Internal(err) => {
                error!(error = ?err, "request failed");
                "Internal server error".to_string()
            }
        };
        HttpResponse::build(self.status_code()).json(json!({ "error": message }))
    }
}
