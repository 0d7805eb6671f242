//! Install counting.

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use bramble_core::storage::graph_key;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CountRequest {
    #[serde(default)]
    pub extension: String,
    #[serde(default)]
    pub graph: String,
}

/// Record that a graph loaded an extension (POST /graphs).
///
/// Extensions ping this on startup. The marker objects written under
/// `{extension}/graphs/` are what install counts are computed from,
/// so the graph name only ever appears as a key, never as content.
pub async fn count_graph(
    State(state): State<AppState>,
    Json(payload): Json<CountRequest>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let key = graph_key(&payload.extension, &payload.graph);
    if let Err(error) = state.files.touch_marker(&key).await {
        let message = error.to_string();
        state.mail.alert("Failed to count graph", &message).await;
        return Err((StatusCode::INTERNAL_SERVER_ERROR, message));
    }
    Ok(Json(json!({ "success": true })))
}
