use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Engine-level error taxonomy.
///
/// `Validation` and `InvalidTransition` are recoverable: the session service
/// turns them into a re-prompt and they never surface as HTTP failures.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0}")]
    Validation(String),

    #[error("that doesn't fit the current step; please {expected}")]
    InvalidTransition { expected: &'static str },

    #[error("nutrition lookup is unavailable right now")]
    ExternalLookupUnavailable,

    #[error("this session has expired; send a new photo to start over")]
    ExpiredSession,

    #[error("saving the meal failed; nothing was recorded, please try again")]
    CommitFailure(#[source] sqlx::Error),

    #[error("not found")]
    NotFound,

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Recoverable errors re-prompt inside the session instead of failing the
    /// request.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::InvalidTransition { .. } | Self::ExternalLookupUnavailable
        )
    }
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let status = match &self {
            EngineError::Validation(_) | EngineError::InvalidTransition { .. } => {
                StatusCode::BAD_REQUEST
            }
            EngineError::ExpiredSession => StatusCode::GONE,
            EngineError::ExternalLookupUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            EngineError::NotFound => StatusCode::NOT_FOUND,
            EngineError::CommitFailure(_)
            | EngineError::Database(_)
            | EngineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, self.to_string()).into_response()
    }
}
