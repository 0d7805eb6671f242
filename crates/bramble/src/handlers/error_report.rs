//! Crash reports from extensions.

use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ErrorReport {
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub stack: String,
}

/// Mail an extension's crash report to support (POST /error).
pub async fn report_error(
    State(state): State<AppState>,
    Json(report): Json<ErrorReport>,
) -> Json<Value> {
    state
        .mail
        .alert(
            &report.subject,
            &format!("{}\n\n{}", report.message, report.stack),
        )
        .await;
    Json(json!({ "success": true }))
}
