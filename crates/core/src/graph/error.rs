use thiserror::Error;

/// Errors surfaced while talking to the upstream graph API.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// The upstream rejected the query for rate limiting. Propagated
    /// to callers as a 429 with this exact message.
    #[error("Too Many Requests")]
    RateLimited,

    /// The query endpoint answers with a 307 pointing at the backend
    /// actually holding the graph. Anything else is a protocol error.
    #[error("Expected an immediate redirect (307), got: {0}")]
    MissingRedirect(u16),

    #[error("{message}")]
    Upstream { status: u16, message: String },

    #[error("graph request failed: {0}")]
    Request(String),

    #[error("unexpected upstream payload: {0}")]
    Payload(String),
}

impl GraphError {
    /// Status code to answer with when a graph call fails.
    pub fn status_code(&self) -> u16 {
        match self {
            GraphError::RateLimited => 429,
            GraphError::Upstream { status, .. } => *status,
            _ => 500,
        }
    }
}
