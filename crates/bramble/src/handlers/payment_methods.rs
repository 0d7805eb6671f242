//! Saved card management for user accounts.
//!
//! Cards live on the user's Stripe customer. The account dashboard
//! lists them, adds new ones through a setup-mode checkout session,
//! picks the default used for subscription invoices, and detaches
//! cards the user no longer wants on file.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use bramble_auth::ClerkUser;

use crate::handlers::common::{auth_failure, authorization, stripe_failure};
use crate::state::AppState;
use crate::stripe::{Expandable, PaymentMethod};

#[derive(Debug, Deserialize)]
pub struct SetDefaultRequest {
    #[serde(default)]
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    #[serde(default)]
    pub payment_method_id: String,
}

async fn account_user(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<ClerkUser, (StatusCode, String)> {
    let user = state
        .directory
        .find_by_account_token(authorization(headers), false)
        .await
        .map_err(auth_failure)?;
    user.ok_or((StatusCode::UNAUTHORIZED, "Invalid token".to_string()))
}

fn card_summary(method: &PaymentMethod) -> Value {
    json!({
        "id": method.id,
        "brand": method.card.as_ref().map(|card| card.brand.as_str()),
        "last4": method.card.as_ref().map(|card| card.last4.as_str()),
    })
}

/// List the cards on file (GET /payment-methods).
pub async fn list_payment_methods(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, (StatusCode, String)> {
    let user = account_user(&state, &headers).await?;
    let Some(customer) = user.stripe_customer() else {
        return Err((
            StatusCode::CONFLICT,
            format!(
                "There is no payment record attached to your account. Reach out to {} for assistance.",
                state.config.support_email
            ),
        ));
    };

    let (customer, methods) = tokio::join!(
        state.stripe.customer(customer, false),
        state.stripe.payment_methods(customer, false),
    );
    let customer = customer.map_err(stripe_failure)?;
    let methods = methods.map_err(stripe_failure)?;

    let default = customer
        .default_payment_method()
        .and_then(Expandable::as_object)
        .map(card_summary);
    Ok(Json(json!({
        "paymentMethods": methods.iter().map(card_summary).collect::<Vec<_>>(),
        "defaultPaymentMethod": default,
    })))
}

/// Start a setup-mode checkout that saves a new card (POST /payment-methods).
pub async fn create_payment_method(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, (StatusCode, String)> {
    let user = account_user(&state, &headers).await?;
    let account_url = format!("{}/user", state.config.site_url);
    let session = state
        .stripe
        .setup_checkout(
            user.stripe_customer().unwrap_or_default(),
            &account_url,
            &account_url,
            false,
        )
        .await
        .map_err(stripe_failure)?;
    Ok(Json(json!({ "id": session.id, "active": false })))
}

/// Pick the default card for invoices (PUT /payment-methods).
pub async fn set_default_payment_method(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<SetDefaultRequest>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let user = account_user(&state, &headers).await?;
    if payload.id.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "id is required".to_string()));
    }

    let method = state
        .stripe
        .payment_method(&payload.id, false)
        .await
        .map_err(stripe_failure)?;
    let Some(customer) = method.customer.as_deref() else {
        return Err((
            StatusCode::BAD_REQUEST,
            "No customer attached to payment method".to_string(),
        ));
    };
    if Some(customer) != user.stripe_customer() {
        return Err((
            StatusCode::BAD_REQUEST,
            "Payment method not attached to the current user".to_string(),
        ));
    }

    state
        .stripe
        .set_default_payment_method(customer, &method.id, false)
        .await
        .map_err(stripe_failure)?;
    Ok(Json(json!({ "success": true })))
}

/// Detach a card from the account (DELETE /payment-methods).
pub async fn delete_payment_method(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<DeleteQuery>,
) -> Result<StatusCode, (StatusCode, String)> {
    let user = account_user(&state, &headers).await?;
    if query.payment_method_id.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "payment_method_id is required".to_string(),
        ));
    }

    let method = state
        .stripe
        .payment_method(&query.payment_method_id, false)
        .await
        .map_err(stripe_failure)?;
    if method.customer.as_deref() != user.stripe_customer() {
        return Err((
            StatusCode::BAD_REQUEST,
            "User does not have access to the provided payment method".to_string(),
        ));
    }

    state
        .stripe
        .detach_payment_method(&query.payment_method_id, false)
        .await
        .map_err(stripe_failure)?;
    Ok(StatusCode::NO_CONTENT)
}
