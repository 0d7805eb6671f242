//! Datalog query proxy.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::handlers::common::{authorization, graph_failure};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub graph: String,
    #[serde(default)]
    pub query: String,
}

/// Run a datalog query against a user's graph (POST /query).
///
/// The caller's own graph authorization is passed through untouched;
/// this service holds no credentials for user graphs. Upstream's
/// status is preserved, including partial-success codes.
pub async fn run_query(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<QueryRequest>,
) -> Result<Response, (StatusCode, String)> {
    if payload.graph.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "`graph` is required".to_string()));
    }
    if payload.query.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "`query` is required".to_string()));
    }
    let (status, result) = state
        .graph
        .query(&payload.graph, &payload.query, authorization(&headers))
        .await
        .map_err(graph_failure)?;
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::OK);
    Ok((status, Json(json!({ "result": result }))).into_response())
}
