//! Price quotes for extension marketplace pages.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::handlers::common::{is_dev, stripe_failure};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PriceQuery {
    #[serde(default)]
    pub id: String,
}

/// Quote a Stripe price (GET /price).
pub async fn get_price(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<PriceQuery>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let price = state
        .stripe
        .price(&query.id, is_dev(&headers))
        .await
        .map_err(stripe_failure)?;
    Ok(Json(json!({
        "id": price.id,
        "price": price.unit_amount,
        "isMonthly": price.is_recurring(),
    })))
}
