//! Per-user file storage for extensions.
//!
//! Extensions persist user data (workflow exports, settings blobs)
//! under `{extension}/files/{path}` in the data bucket. Objects are
//! stamped with the uploading user's id and only that user may read
//! or replace them.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use bramble_core::storage::file_key;

use crate::handlers::common::{auth_failure, authorization, storage_failure};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    #[serde(default)]
    pub extension: String,
    #[serde(default)]
    pub path: String,
    /// Only the literal "true" selects the development environment.
    #[serde(default)]
    pub dev: String,
}

#[derive(Debug, Deserialize)]
pub struct UploadRequest {
    #[serde(default)]
    pub extension: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub dev: bool,
}

/// Serve a user's stored file (GET /file).
pub async fn download_file(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<DownloadQuery>,
) -> Result<String, (StatusCode, String)> {
    let dev = query.dev == "true";
    let user = state
        .directory
        .find_by_account_token(authorization(&headers), dev)
        .await
        .map_err(auth_failure)?;
    let Some(user) = user else {
        return Err((StatusCode::UNAUTHORIZED, "Invalid token".to_string()));
    };

    let key = file_key(&query.extension, &query.path);
    let head = match state.files.head_file(&key).await {
        Ok(head) => head,
        Err(error) => {
            let message = error.to_string();
            state.mail.alert("User failed to download error", &message).await;
            return Err((StatusCode::INTERNAL_SERVER_ERROR, message));
        }
    };
    let Some(head) = head else {
        return Err((
            StatusCode::NOT_FOUND,
            format!("File {} doesn't exist.", query.path),
        ));
    };
    if head.owner.as_deref() != Some(user.id.as_str()) {
        return Err((
            StatusCode::FORBIDDEN,
            format!("User not allowed to access file {}", query.path),
        ));
    }

    match state.files.read_file(&key).await {
        Ok(body) => Ok(body),
        Err(error) => {
            let message = error.to_string();
            state.mail.alert("User failed to download error", &message).await;
            Err((StatusCode::INTERNAL_SERVER_ERROR, message))
        }
    }
}

/// Store a user's file (PUT /file).
///
/// A missing object is created with the caller as owner; an existing
/// one is only replaced by its owner.
pub async fn upload_file(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<UploadRequest>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let user = state
        .directory
        .find_by_account_token(authorization(&headers), payload.dev)
        .await
        .map_err(auth_failure)?;
    let Some(user) = user else {
        return Err((StatusCode::UNAUTHORIZED, "Invalid token".to_string()));
    };

    let key = file_key(&payload.extension, &payload.path);
    let head = state.files.head_file(&key).await.map_err(storage_failure)?;
    if let Some(head) = head {
        if head.owner.as_deref() != Some(user.id.as_str()) {
            return Err((
                StatusCode::FORBIDDEN,
                format!("User not allowed to access file {}", payload.path),
            ));
        }
    }

    let etag = state
        .files
        .write_file(&key, &payload.body, &user.id)
        .await
        .map_err(storage_failure)?;
    Ok(Json(json!({ "success": true, "etag": etag })))
}
