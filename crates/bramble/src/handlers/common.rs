//! Conventions shared across route handlers: the platform's custom
//! headers and the mappings from client errors to HTTP responses.

use axum::http::{header, HeaderMap, StatusCode};

use bramble_auth::AuthError;
use bramble_core::graph::GraphError;
use bramble_core::storage::{repository_error_to_status_code, RepositoryError};

use crate::stripe::StripeError;

pub use bramble_auth::DEV_HEADER;

/// Names the extension an end user call is about.
pub const EXTENSION_HEADER: &str = "x-bramble-extension";
/// Older spelling of [`EXTENSION_HEADER`], still sent by extensions
/// published before the rename.
pub const SERVICE_HEADER: &str = "x-bramble-service";
/// Carries the end user's token on calls proxied by a developer's
/// backend, whose own token occupies `Authorization`.
pub const TOKEN_HEADER: &str = "x-bramble-token";

/// A header's value as text, or empty when absent.
pub fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
}

/// The raw `Authorization` value, or empty when absent.
pub fn authorization(headers: &HeaderMap) -> &str {
    header_value(headers, header::AUTHORIZATION.as_str())
}

/// Whether the caller asked for the development environment.
pub fn is_dev(headers: &HeaderMap) -> bool {
    headers.contains_key(DEV_HEADER)
}

/// The extension a proxied call is about, taken from the current
/// header or its older spelling.
pub fn extension_header(headers: &HeaderMap) -> &str {
    let current = header_value(headers, EXTENSION_HEADER);
    if current.is_empty() {
        header_value(headers, SERVICE_HEADER)
    } else {
        current
    }
}

/// Directory failures answer with the provider's status where one
/// exists, and a 500 otherwise.
pub fn auth_failure(error: AuthError) -> (StatusCode, String) {
    match error {
        AuthError::Provider { status, message } => (
            StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            message,
        ),
        other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
    }
}

/// Billing failures always answer 500 with Stripe's own message.
pub fn stripe_failure(error: StripeError) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
}

/// Storage failures answer with the status the repository error maps
/// to.
pub fn storage_failure(error: RepositoryError) -> (StatusCode, String) {
    let status = StatusCode::from_u16(repository_error_to_status_code(&error))
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, error.to_string())
}

/// Graph API failures carry upstream's status through.
pub fn graph_failure(error: GraphError) -> (StatusCode, String) {
    let status = StatusCode::from_u16(error.status_code())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, error.to_string())
}
