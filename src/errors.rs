use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

pub type AccessResult<T> = Result<T, AccessError>;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("role binding store unavailable: {0}")]
    BindingStoreUnavailable(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("token error: {0}")]
    Token(String),
}

impl AccessError {
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::Unauthenticated(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn binding_store_unavailable(message: impl Into<String>) -> Self {
        Self::BindingStoreUnavailable(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn token(err: impl Into<String>) -> Self {
        Self::Token(err.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AccessError::Unauthenticated(_) => "unauthenticated",
            AccessError::Forbidden(_) => "forbidden",
            AccessError::BindingStoreUnavailable(_) => "binding_store_unavailable",
            AccessError::Configuration(_) => "configuration",
            AccessError::Token(_) => "token",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AccessError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AccessError::Token(_) => StatusCode::UNAUTHORIZED,
            AccessError::Forbidden(_) => StatusCode::FORBIDDEN,
            // Operators see the detail in logs; the caller only learns access was denied.
            AccessError::Configuration(_) => StatusCode::FORBIDDEN,
            AccessError::BindingStoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for AccessError {
    fn into_response(self) -> Response {
        let status = self.status();

        let (error, message) = match &self {
            AccessError::Configuration(detail) => {
                tracing::error!(detail = %detail, "access denied due to configuration error");
                ("forbidden", "forbidden: access denied".to_string())
            }
            other => (other.kind(), other.to_string()),
        };

        let payload = ErrorResponse {
            error: error.to_string(),
            message,
        };

        (status, Json(payload)).into_response()
    }
}
