//! Credential handoff endpoints.
//!
//! OAuth flows that finish in a popup park their credentials here
//! under a `{service}_{otp}` id. The extension that opened the popup
//! polls until the record appears, redeems it exactly once, and the
//! frontend polls the other way to learn the popup can close.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use bramble_core::handoff::{handoff_id, is_expired, HandoffRecord};

use crate::handlers::common::storage_failure;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StoreHandoffRequest {
    #[serde(default)]
    pub service: String,
    #[serde(default)]
    pub otp: String,
    #[serde(default)]
    pub auth: String,
}

#[derive(Debug, Deserialize)]
pub struct RedeemHandoffRequest {
    #[serde(default)]
    pub service: String,
    #[serde(default)]
    pub otp: String,
}

/// Query parameters for the polling endpoints. `state` is the full
/// `{service}_{otp}` id, named after the OAuth state parameter it
/// rides in on.
#[derive(Debug, Deserialize)]
pub struct PollQuery {
    #[serde(default)]
    pub state: String,
}

/// Park credentials for pickup (PUT /auth).
pub async fn store_handoff(
    State(state): State<AppState>,
    Json(payload): Json<StoreHandoffRequest>,
) -> Result<StatusCode, (StatusCode, String)> {
    let record = HandoffRecord {
        id: handoff_id(&payload.service, &payload.otp),
        auth: payload.auth,
        date: Utc::now(),
    };
    state
        .handoffs
        .put_handoff(&record)
        .await
        .map_err(storage_failure)?;
    tracing::debug!("Stored handoff {}", record.id);
    Ok(StatusCode::NO_CONTENT)
}

/// Redeem parked credentials (POST /auth).
///
/// The record is deleted before its age is checked, so a handoff can
/// be redeemed at most once whether or not it was still fresh.
pub async fn redeem_handoff(
    State(state): State<AppState>,
    Json(payload): Json<RedeemHandoffRequest>,
) -> Result<Response, (StatusCode, String)> {
    let id = handoff_id(&payload.service, &payload.otp);
    let record = state.handoffs.get_handoff(&id).await.map_err(storage_failure)?;
    let Some(record) = record else {
        return Ok(StatusCode::NO_CONTENT.into_response());
    };
    state
        .handoffs
        .delete_handoff(&id)
        .await
        .map_err(storage_failure)?;
    if is_expired(&record, Utc::now()) {
        return Err((StatusCode::UNAUTHORIZED, "otp expired".to_string()));
    }
    Ok(Json(json!({ "auth": record.auth })).into_response())
}

/// Report whether a handoff is gone (GET /auth).
///
/// `success: true` means the record was redeemed or never existed.
/// Expired leftovers are swept here so an abandoned flow does not poll
/// forever.
pub async fn poll_handoff(
    State(state): State<AppState>,
    Query(query): Query<PollQuery>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let record = state
        .handoffs
        .get_handoff(&query.state)
        .await
        .map_err(storage_failure)?;
    let Some(record) = record else {
        return Ok(Json(json!({ "success": true })));
    };
    if is_expired(&record, Utc::now()) {
        state
            .handoffs
            .delete_handoff(&query.state)
            .await
            .map_err(storage_failure)?;
        return Ok(Json(json!({ "success": true })));
    }
    Ok(Json(json!({ "success": false })))
}

/// Report whether a handoff exists (GET /oauth).
///
/// Like [`poll_handoff`] but read only; stale records are left for the
/// other poller to sweep.
pub async fn poll_oauth(
    State(state): State<AppState>,
    Query(query): Query<PollQuery>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let record = state
        .handoffs
        .get_handoff(&query.state)
        .await
        .map_err(storage_failure)?;
    Ok(Json(json!({ "success": record.is_none() })))
}
