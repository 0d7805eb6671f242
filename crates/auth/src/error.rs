use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Auth errors for the bramble_auth crate.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The identity provider rejected a request.
    #[error("identity provider returned {status}: {message}")]
    Provider { status: u16, message: String },

    /// HTTP client error while talking to the identity provider.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The provider answered with something we could not parse.
    #[error("malformed provider response: {0}")]
    MalformedResponse(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AuthError::Provider { status, .. } => {
                // Provider-side 4xx means our credentials or request
                // were bad, not the caller's.
                tracing::error!("Identity provider error: {}", self);
                let status = if *status >= 500 {
                    StatusCode::BAD_GATEWAY
                } else {
                    StatusCode::INTERNAL_SERVER_ERROR
                };
                (status, "Identity provider error".to_string())
            }
            AuthError::Http(_) | AuthError::MalformedResponse(_) => {
                tracing::error!("HTTP error during auth: {}", self);
                (
                    StatusCode::BAD_GATEWAY,
                    "Identity provider error".to_string(),
                )
            }
            AuthError::Config(_) => {
                tracing::error!("Config error: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Server configuration error".to_string(),
                )
            }
        };

        (status, message).into_response()
    }
}
