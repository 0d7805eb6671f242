//! Account token endpoints.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use bramble_core::auth::{extension_field, mint_token, seal_token};

use crate::handlers::common::{auth_failure, authorization};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CheckQuery {
    #[serde(rename = "extensionId", default)]
    pub extension_id: String,
    /// Any non-empty value selects the development environment.
    #[serde(default)]
    pub dev: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTokenRequest {
    #[serde(default)]
    pub email: String,
}

/// Report whether the caller's token unlocks an extension (GET /check).
///
/// Both token formats are accepted: the lookup runs against the
/// extension's own metadata entry and the account token in parallel,
/// and either match counts. The unlock flag itself always reads the
/// camel cased field, which is where inits write it.
pub async fn check_token(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<CheckQuery>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let dev = query.dev.as_deref().is_some_and(|value| !value.is_empty());
    let token = authorization(&headers);
    let (v2, account) = tokio::join!(
        state
            .directory
            .find_by_extension_token(token, &query.extension_id, dev),
        state.directory.find_by_account_token(token, dev),
    );
    let user = v2.map_err(auth_failure)?.or(account.map_err(auth_failure)?);
    let Some(user) = user else {
        return Err((StatusCode::UNAUTHORIZED, "Invalid token".to_string()));
    };
    let field = extension_field(&query.extension_id);
    Ok(Json(json!({
        "success": user.public_metadata.contains_key(&field)
    })))
}

/// Mint an account token (POST /token).
///
/// The raw secret is returned exactly once; only its sealed form lands
/// in the user's private metadata. Minting always runs against the
/// live environment.
pub async fn create_token(
    State(state): State<AppState>,
    Json(payload): Json<CreateTokenRequest>,
) -> Result<Json<Value>, (StatusCode, String)> {
    if payload.email.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Missing email".to_string()));
    }
    let users = state
        .directory
        .users_by_email(&payload.email, false)
        .await
        .map_err(auth_failure)?;
    let Some(user) = users.into_iter().next() else {
        return Err((
            StatusCode::UNAUTHORIZED,
            format!("No Active User with email {}", payload.email),
        ));
    };
    if user.private_metadata.contains_key("token") {
        return Err((
            StatusCode::UNAUTHORIZED,
            format!("Token already exists for email {}", payload.email),
        ));
    }

    let token = mint_token();
    let sealed = seal_token(&token, &state.config.token_sealing_key);
    let mut metadata = user.private_metadata.clone();
    metadata.insert("token".to_string(), Value::String(sealed));
    state
        .directory
        .update_private_metadata(&user.id, &metadata, false)
        .await
        .map_err(auth_failure)?;
    tracing::info!("Minted account token for {}", user.id);
    Ok(Json(json!({ "token": token })))
}
