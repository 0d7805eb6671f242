//! Express account onboarding for extension developers.
//!
//! Developers who sell premium extensions get paid through a Stripe
//! Express account. The site walks them through creating one, polls
//! until Stripe reports the details submitted, and can reissue the
//! onboarding link when the first one expires.

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::handlers::common::stripe_failure;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AccountRequest {
    #[serde(default)]
    pub operation: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub dev: bool,
}

/// Drive Express account onboarding (POST /stripe-account).
pub async fn manage_stripe_account(
    State(state): State<AppState>,
    Json(payload): Json<AccountRequest>,
) -> Result<Json<Value>, (StatusCode, String)> {
    if payload.email.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "`email` is a required parameter.".to_string(),
        ));
    }

    let dev = payload.dev;
    let users = state
        .directory
        .users_by_email(&payload.email, dev)
        .await
        .map_err(|error| (StatusCode::INTERNAL_SERVER_ERROR, error.to_string()))?;
    if users.is_empty() {
        return Err((
            StatusCode::UNAUTHORIZED,
            format!("Cannot find Bramble account with email {}.", payload.email),
        ));
    }

    let close_url = format!("{}/oauth?close=true", state.config.site_url);
    match payload.operation.as_str() {
        "CREATE" => {
            let user = users.iter().find(|user| user.stripe_account().is_none());
            let Some(user) = user else {
                return Err((
                    StatusCode::CONFLICT,
                    "No user account available without stripe account.".to_string(),
                ));
            };

            let account = state
                .stripe
                .create_express_account(dev)
                .await
                .map_err(stripe_failure)?;
            let link = state
                .stripe
                .create_account_link(&account.id, &close_url, &close_url, dev)
                .await
                .map_err(stripe_failure)?;

            let mut metadata = user.private_metadata.clone();
            metadata.insert("stripeAccount".to_string(), json!(account.id));
            state
                .directory
                .update_private_metadata(&user.id, &metadata, dev)
                .await
                .map_err(|error| (StatusCode::INTERNAL_SERVER_ERROR, error.to_string()))?;
            Ok(Json(json!({ "url": link.url })))
        }
        "FINISH" => {
            let account = users.iter().find_map(|user| user.stripe_account());
            let Some(account) = account else {
                return Err((
                    StatusCode::CONFLICT,
                    "No Stripe Account in progress".to_string(),
                ));
            };

            match state.stripe.account(account, dev).await {
                Ok(account) => Ok(Json(json!({ "done": account.details_submitted }))),
                Err(error) => {
                    tracing::warn!("Could not check express account {account}: {error}");
                    Ok(Json(json!({ "done": false })))
                }
            }
        }
        "RETRY" => {
            let account = users.iter().find_map(|user| user.stripe_account());
            let Some(account) = account else {
                return Err((
                    StatusCode::BAD_REQUEST,
                    "No Stripe Account in progress".to_string(),
                ));
            };

            let link = state
                .stripe
                .create_account_link(
                    account,
                    &format!("{close_url}&refresh=true"),
                    &format!("{close_url}&return=true"),
                    dev,
                )
                .await
                .map_err(stripe_failure)?;
            Ok(Json(json!({ "url": link.url })))
        }
        operation => Err((
            StatusCode::BAD_REQUEST,
            format!("Invalid Operation {operation}"),
        )),
    }
}
