//! User directory endpoints for extension backends.
//!
//! Extension backends act on behalf of their end users but only ever
//! hold tokens, never directory credentials. These routes let a
//! developer's backend resolve the end user behind a token, init an
//! extension for them, and write back extension-scoped metadata.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use base64::prelude::{Engine, BASE64_STANDARD};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use bramble_auth::{ClerkUser, DeveloperUser, ExtensionUser};
use bramble_core::auth::extension_field;

use crate::handlers::common::{
    auth_failure, extension_header, header_value, storage_failure, SERVICE_HEADER, TOKEN_HEADER,
};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LookupQuery {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub dev: bool,
}

/// Report whether an account exists for an email (GET /users).
///
/// Extension login forms probe this before offering signup, so
/// directory failures read as absence instead of an error.
pub async fn lookup_users(
    State(state): State<AppState>,
    Query(query): Query<LookupQuery>,
) -> Json<Value> {
    let exists = match state.directory.users_by_email(&query.email, query.dev).await {
        Ok(users) => !users.is_empty(),
        Err(error) => {
            tracing::warn!("User lookup by email failed: {}", error);
            false
        }
    };
    Json(json!({ "exists": exists }))
}

/// Resolve the end user named by the `x-bramble-token` header. Tokens
/// come in two generations, one scoped to the extension's metadata
/// entry and one covering the whole account; either authenticates.
async fn end_user(
    state: &AppState,
    token: &str,
    field: &str,
    dev: bool,
) -> Result<Option<ClerkUser>, (StatusCode, String)> {
    let (scoped, account) = tokio::join!(
        state.directory.find_by_extension_token(token, field, dev),
        state.directory.find_by_account_token(token, dev),
    );
    Ok(scoped.map_err(auth_failure)?.or(account.map_err(auth_failure)?))
}

/// Hand an extension backend its end user's metadata (GET /user).
///
/// The stored token and authentication flag stay server side. The
/// `developer` service additionally sees its connected Stripe account,
/// which the extension marketplace needs for payouts.
pub async fn get_user(
    State(state): State<AppState>,
    caller: ExtensionUser,
    headers: HeaderMap,
) -> Result<Json<Value>, (StatusCode, String)> {
    let extension = extension_header(&headers);
    let field = extension_field(extension);
    let token = header_value(&headers, TOKEN_HEADER);
    let Some(user) = end_user(&state, token, &field, caller.dev).await? else {
        return Err((StatusCode::UNAUTHORIZED, "Invalid user token".to_string()));
    };
    let Some(data) = user.extension_data(&field) else {
        return Err((
            StatusCode::FORBIDDEN,
            "User not allowed to access this method".to_string(),
        ));
    };

    let mut body = data.clone();
    body.remove("token");
    body.remove("authenticated");
    if let Some(email) = user.primary_email() {
        body.insert("email".to_string(), Value::String(email.to_string()));
    }
    if field == "developer" {
        if let Some(account) = user.stripe_account() {
            body.insert(
                "stripeAccountId".to_string(),
                Value::String(account.to_string()),
            );
        }
    }
    Ok(Json(Value::Object(body)))
}

/// Init an extension for an end user (POST /user).
///
/// Writes an empty metadata entry under the extension's field, which
/// is what [`check_token`](crate::handlers::tokens::check_token)
/// reports as unlocked. Premium extensions init through the
/// subscription flow instead.
pub async fn init_user(
    State(state): State<AppState>,
    caller: ExtensionUser,
    headers: HeaderMap,
) -> Result<Json<Value>, (StatusCode, String)> {
    let extension = extension_header(&headers);
    let field = extension_field(extension);
    let token = header_value(&headers, TOKEN_HEADER);
    let Some(user) = end_user(&state, token, &field, caller.dev).await? else {
        return Err((StatusCode::UNAUTHORIZED, "Invalid token".to_string()));
    };
    if user.public_metadata.contains_key(&field) {
        return Err((
            StatusCode::CONFLICT,
            "User has already inited this extension".to_string(),
        ));
    }
    let record = state
        .extensions
        .get_extension(extension)
        .await
        .map_err(storage_failure)?;
    if record.as_ref().and_then(|r| r.price_id(caller.dev)).is_some() {
        return Err((
            StatusCode::CONFLICT,
            "Extension requires a subscription".to_string(),
        ));
    }

    let mut metadata = user.public_metadata.clone();
    metadata.insert(field, Value::Object(Map::new()));
    state
        .directory
        .update_public_metadata(&user.id, &metadata, caller.dev)
        .await
        .map_err(auth_failure)?;
    Ok(Json(json!({ "success": true })))
}

/// Write extension metadata for an end user (PUT /user).
///
/// The caller proves it may touch the user by presenting a token that
/// matches the one stored under its own service field. Body keys merge
/// over the stored entry; the token itself can never be overwritten.
pub async fn update_user(
    State(state): State<AppState>,
    developer: DeveloperUser,
    headers: HeaderMap,
    Json(payload): Json<Map<String, Value>>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let service = header_value(&headers, SERVICE_HEADER);
    let token = header_value(&headers, TOKEN_HEADER);
    let user_id = BASE64_STANDARD
        .decode(token)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .and_then(|decoded| decoded.split(':').next().map(str::to_string))
        .unwrap_or_default();
    let user = match state
        .directory
        .user_by_id(&format!("user_{user_id}"), developer.dev)
        .await
    {
        Ok(Some(user)) => user,
        _ => {
            return Err((
                StatusCode::UNAUTHORIZED,
                "Could not find user from the given token".to_string(),
            ))
        }
    };

    let service_data = user.extension_data(service).cloned().unwrap_or_default();
    let stored = service_data
        .get("token")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    if stored.is_empty() || token != stored {
        return Err((
            StatusCode::UNAUTHORIZED,
            "User is unauthorized to access your service".to_string(),
        ));
    }

    let mut merged = service_data;
    for (key, value) in payload {
        merged.insert(key, value);
    }
    merged.insert("token".to_string(), Value::String(stored));
    let mut metadata = user.public_metadata.clone();
    metadata.insert(service.to_string(), Value::Object(merged));
    state
        .directory
        .update_public_metadata(&user.id, &metadata, developer.dev)
        .await
        .map_err(auth_failure)?;
    Ok(Json(json!({ "success": true })))
}
