//! Google OAuth relay.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;

use crate::relay::RelayRequest;
use crate::state::AppState;

/// Exchange a Google OAuth code upstream (POST /google-auth).
///
/// The Google client credentials never ship inside extensions; this
/// route injects them and forwards the exchange to the companion
/// platform, which owns the actual token handshake. Upstream's body
/// comes back as given, with failures flattened to a 500.
pub async fn relay_google_auth(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Response {
    let mut request = RelayRequest::post("extensions/google/auth", payload);
    request.headers.push((
        "x-google-client-id".to_string(),
        state.config.google_client_id.clone(),
    ));
    request.headers.push((
        "x-google-client-secret".to_string(),
        state.config.google_client_secret.clone(),
    ));
    request.headers.push((
        "x-google-redirect-uri".to_string(),
        state.config.google_redirect_uri.clone(),
    ));

    let response = state.relay.forward(request).await;
    let status = if response.is_success() {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(response.body)).into_response()
}
