//! Paid extension subscriptions.
//!
//! Paid extensions all bill through one platform subscription per
//! Stripe customer, tagged with [`PROJECT_TAG`]. Subscribing adds the
//! extension's price onto that subscription when it exists, charges
//! the default card directly when one is on file, and otherwise sends
//! the user through a checkout session whose completion webhook lands
//! back here to apply the unlock.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use bramble_auth::{ClerkUser, DeveloperUser};
use bramble_core::auth::extension_field;

use crate::handlers::common::{
    auth_failure, authorization, extension_header, header_value, storage_failure, stripe_failure,
};
use crate::state::AppState;
use crate::stripe::{verify_signature, Event, SubscriptionCheckout, PROJECT_TAG};

#[derive(Debug, Deserialize)]
pub struct SubscriptionRequest {
    #[serde(default, rename = "extensionId")]
    pub extension_id: String,
    #[serde(default)]
    pub dev: bool,
}

#[derive(Debug, Deserialize)]
pub struct MeterRequest {
    #[serde(default)]
    pub quantity: i64,
    pub email: Option<String>,
    pub id: Option<String>,
}

/// Write the extension's field onto the user's public metadata, which
/// is what the editor checks before loading premium features.
async fn unlock(
    state: &AppState,
    user: &ClerkUser,
    field: &str,
    dev: bool,
) -> Result<Json<Value>, String> {
    let mut metadata = user.public_metadata.clone();
    metadata.insert(field.to_string(), json!({}));
    state
        .directory
        .update_public_metadata(&user.id, &metadata, dev)
        .await
        .map_err(|error| error.to_string())?;
    Ok(Json(json!({ "success": true })))
}

/// Subscribe the caller to a paid extension (POST /subscribe).
pub async fn create_subscription(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<SubscriptionRequest>,
) -> Result<Json<Value>, (StatusCode, String)> {
    match subscribe(&state, &headers, &payload).await {
        Ok(Some(body)) => Ok(body),
        Ok(None) => Err((StatusCode::UNAUTHORIZED, "Invalid token".to_string())),
        Err(message) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            format!(
                "Failed to subscribe to Bramble extension: {message}. Contact {} for help!",
                state.config.support_email
            ),
        )),
    }
}

/// The subscribe flow proper. `Ok(None)` means the token matched no
/// user; any error is wrapped into the support-facing message.
async fn subscribe(
    state: &AppState,
    headers: &HeaderMap,
    payload: &SubscriptionRequest,
) -> Result<Option<Json<Value>>, String> {
    let dev = payload.dev;
    let user = state
        .directory
        .find_by_account_token(authorization(headers), dev)
        .await
        .map_err(|error| error.to_string())?;
    let Some(user) = user else {
        return Ok(None);
    };

    let customer = user.stripe_customer().unwrap_or_default().to_string();
    let record = state
        .extensions
        .get_extension(&payload.extension_id)
        .await
        .map_err(|error| error.to_string())?;
    let price = record
        .as_ref()
        .and_then(|record| record.price_id(dev))
        .unwrap_or_default()
        .to_string();
    let quantity = state
        .stripe
        .price(&price, dev)
        .await
        .map_err(|error| error.to_string())
        .map(|price| if price.is_metered() { None } else { Some(1) })?;
    let field = extension_field(&payload.extension_id);

    let platform_subscription = state
        .stripe
        .subscriptions(&customer, dev)
        .await
        .map_err(|error| error.to_string())?
        .into_iter()
        .find(|subscription| {
            subscription.metadata.get("project").map(String::as_str) == Some(PROJECT_TAG)
        });
    if let Some(subscription) = platform_subscription {
        state
            .stripe
            .add_subscription_item(&subscription.id, &price, quantity, dev)
            .await
            .map_err(|error| error.to_string())?;
        return unlock(state, &user, &field, dev).await.map(Some);
    }

    let has_card = state
        .stripe
        .customer(&customer, dev)
        .await
        .map_err(|error| error.to_string())?
        .default_payment_method()
        .is_some();
    if has_card {
        state
            .stripe
            .create_subscription(&customer, &price, quantity, dev)
            .await
            .map_err(|error| error.to_string())?;
        return unlock(state, &user, &field, dev).await.map(Some);
    }

    let extension_page = state.config.extension_page(&payload.extension_id);
    let success_url = format!("{extension_page}?success=true");
    let cancel_url = format!("{extension_page}?cancel=true");
    let callback_url = format!("{}/finish-subscription", state.config.api_url);
    let session = state
        .stripe
        .subscription_checkout(
            SubscriptionCheckout {
                customer: &customer,
                price: &price,
                quantity,
                success_url: &success_url,
                cancel_url: &cancel_url,
                extension_field: &field,
                user_id: &user.id,
                callback_url: &callback_url,
            },
            dev,
        )
        .await
        .map_err(|error| error.to_string())?;
    Ok(Some(Json(json!({ "url": session.url }))))
}

/// Cancel a paid extension subscription (POST /unsubscribe).
pub async fn cancel_subscription(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<SubscriptionRequest>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let token = authorization(&headers);
    let dev = payload.dev;
    let (scoped, account) = tokio::join!(
        state
            .directory
            .find_by_extension_token(token, &payload.extension_id, dev),
        state.directory.find_by_account_token(token, dev),
    );
    let user = scoped.map_err(auth_failure)?.or(account.map_err(auth_failure)?);
    let Some(user) = user else {
        return Err((StatusCode::UNAUTHORIZED, "Invalid token".to_string()));
    };

    let customer = user.stripe_customer().unwrap_or_default();
    let record = state
        .extensions
        .get_extension(&payload.extension_id)
        .await
        .map_err(storage_failure)?;
    let price = record
        .as_ref()
        .and_then(|record| record.price_id(dev))
        .unwrap_or_default();
    let subscription = state
        .stripe
        .subscriptions(customer, dev)
        .await
        .map_err(stripe_failure)?
        .into_iter()
        .find(|subscription| subscription.items.data.iter().any(|item| item.price.id == price))
        .map(|subscription| subscription.id);
    let Some(subscription) = subscription else {
        return Err((
            StatusCode::CONFLICT,
            format!("Current user is not subscribed to {}", payload.extension_id),
        ));
    };

    if let Err(error) = state.stripe.cancel_subscription(&subscription, dev).await {
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to cancel Bramble subscription: {error}"),
        ));
    }

    let field = extension_field(&payload.extension_id);
    let mut metadata = user.public_metadata.clone();
    if metadata.remove(&field).is_some() {
        state
            .directory
            .update_public_metadata(&user.id, &metadata, dev)
            .await
            .map_err(auth_failure)?;
    } else {
        tracing::warn!("No metadata value to clear for field {field}");
    }
    Ok(Json(json!({ "success": true })))
}

/// Checkout completion webhook (POST /finish-subscription).
///
/// Direct subscriptions unlock inline; checkouts land back here once
/// the user has paid.
pub async fn finish_subscription(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Response {
    match finish(&state, &headers, &body).await {
        Ok(response) => response,
        Err(message) => {
            tracing::error!("Failed to finish subscription: {message}");
            state
                .mail
                .alert("Failed to finish subscription", &message)
                .await;
            (StatusCode::BAD_REQUEST, format!("Webhook Error: {message}")).into_response()
        }
    }
}

async fn finish(state: &AppState, headers: &HeaderMap, body: &str) -> Result<Response, String> {
    let event: Event = serde_json::from_str(body).map_err(|error| error.to_string())?;
    let dev = !event.livemode;
    let secret = if dev {
        &state.config.dev_checkout_secret
    } else {
        &state.config.checkout_secret
    };
    verify_signature(body, header_value(headers, "stripe-signature"), secret)
        .map_err(|error| error.to_string())?;

    let session = &event.data.object;
    let user_id = session.metadata.get("userId").cloned().unwrap_or_default();
    let extension = session.metadata.get("extension").cloned().unwrap_or_default();
    if user_id.is_empty() {
        return Ok((StatusCode::BAD_REQUEST, "UserId is required").into_response());
    }

    let user = state
        .directory
        .user_by_id(&user_id, dev)
        .await
        .map_err(|error| error.to_string())?
        .ok_or_else(|| format!("Could not find user {user_id}"))?;
    if user.public_metadata.contains_key(&extension) {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let mut metadata = user.public_metadata.clone();
    metadata.insert(extension, json!({}));
    state
        .directory
        .update_public_metadata(&user.id, &metadata, dev)
        .await
        .map_err(|error| error.to_string())?;
    Ok(Json(json!({ "success": true })).into_response())
}

/// Record usage against a metered price (POST /meter).
///
/// Called by extension backends, not end users, so the caller
/// identifies the user to meter by id or email.
pub async fn meter_usage(
    State(state): State<AppState>,
    developer: DeveloperUser,
    headers: HeaderMap,
    Json(payload): Json<MeterRequest>,
) -> Result<Json<Value>, (StatusCode, String)> {
    if payload.quantity <= 0 {
        return Err((
            StatusCode::BAD_REQUEST,
            "`quantity` is required and must be greater than 0".to_string(),
        ));
    }
    let id = payload.id.as_deref().unwrap_or_default();
    let email = payload.email.as_deref().unwrap_or_default();
    if id.is_empty() && email.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "`id` or `email` is required to meter user".to_string(),
        ));
    }

    let dev = developer.dev;
    let extension = extension_header(&headers).to_string();
    let field = extension_field(&extension);
    let user = if !id.is_empty() {
        state.directory.user_by_id(id, dev).await.ok().flatten()
    } else {
        state
            .directory
            .users_by_email(email, dev)
            .await
            .map_err(auth_failure)?
            .into_iter()
            .find(|user| user.public_metadata.contains_key(&field))
    };
    let Some(user) = user else {
        return Err((
            StatusCode::CONFLICT,
            format!("There are no customers with email {email} or id {id} subscribed to {extension}"),
        ));
    };

    let customer = user.stripe_customer().unwrap_or_default();
    let record = state
        .extensions
        .get_extension(&extension)
        .await
        .map_err(storage_failure)?;
    let price = record
        .as_ref()
        .and_then(|record| record.price_id(dev))
        .unwrap_or_default();
    let item = state
        .stripe
        .subscriptions(customer, dev)
        .await
        .map_err(stripe_failure)?
        .into_iter()
        .flat_map(|subscription| subscription.items.data)
        .find(|item| item.price.id == price)
        .map(|item| item.id);
    let Some(item) = item else {
        return Err((
            StatusCode::CONFLICT,
            format!("There is no subscription attached to extension {extension}"),
        ));
    };

    let usage = state
        .stripe
        .create_usage_record(&item, payload.quantity as u64, chrono::Utc::now().timestamp(), dev)
        .await
        .map_err(stripe_failure)?;
    Ok(Json(json!({ "id": usage.id })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hmac::{Hmac, Mac};
    use httpmock::prelude::*;
    use serde_json::json;
    use sha2::Sha256;

    use bramble_auth::UserDirectory;
    use bramble_core::auth::seal_token;
    use bramble_core::extension::ExtensionRecord;

    use crate::config::Config;
    use crate::handlers::common::test_support::{bearer, clerk_user, response_json, response_text};
    use crate::handlers::common::EXTENSION_HEADER;
    use crate::state::test_support::TestApp;

    async fn subscriber_app(server: &MockServer) -> TestApp {
        let app = TestApp::with_config(Config {
            stripe_api_url: server.base_url(),
            token_sealing_key: "test-key".to_string(),
            ..Config::default()
        });
        app.directory
            .insert_user(clerk_user(
                "user_abc",
                "a@example.com",
                json!({}),
                json!({ "token": seal_token("s3cret", "test-key"), "stripeId": "cus_123" }),
            ))
            .await;
        app.repository
            .insert_extension(ExtensionRecord {
                id: "github-sync".to_string(),
                premium: Some("price_live".to_string()),
                ..Default::default()
            })
            .await;
        app
    }

    fn licensed_price() -> Value {
        json!({
            "id": "price_live",
            "unit_amount": 500,
            "type": "recurring",
            "recurring": { "usage_type": "licensed" }
        })
    }

    fn subscribe_request() -> SubscriptionRequest {
        SubscriptionRequest {
            extension_id: "github-sync".to_string(),
            dev: false,
        }
    }

    #[tokio::test]
    async fn subscribing_adds_onto_an_existing_platform_subscription() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/prices/price_live");
                then.status(200).json_body(licensed_price());
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/subscriptions");
                then.status(200).json_body(json!({
                    "data": [{
                        "id": "sub_1",
                        "metadata": { "project": "Bramble" },
                        "items": { "data": [], "has_more": false }
                    }],
                    "has_more": false
                }));
            })
            .await;
        let item = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/subscription_items")
                    .body_contains("subscription=sub_1")
                    .body_contains("price=price_live")
                    .body_contains("quantity=1");
                then.status(200)
                    .json_body(json!({ "id": "si_new", "price": licensed_price() }));
            })
            .await;
        let app = subscriber_app(&server).await;

        let body = create_subscription(
            State(app.state.clone()),
            bearer("a@example.com:s3cret"),
            Json(subscribe_request()),
        )
        .await
        .unwrap();
        item.assert_async().await;
        assert_eq!(body.0, json!({ "success": true }));

        let user = app
            .directory
            .user_by_id("user_abc", false)
            .await
            .unwrap()
            .unwrap();
        assert!(user.public_metadata.contains_key("githubSync"));
    }

    #[tokio::test]
    async fn subscribing_charges_a_default_card_directly() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/prices/price_live");
                then.status(200).json_body(licensed_price());
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/subscriptions");
                then.status(200).json_body(json!({ "data": [], "has_more": false }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/customers/cus_123");
                then.status(200).json_body(json!({
                    "id": "cus_123",
                    "invoice_settings": {
                        "default_payment_method": {
                            "id": "pm_1",
                            "card": { "brand": "visa", "last4": "4242" }
                        }
                    }
                }));
            })
            .await;
        let created = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/subscriptions")
                    .body_contains("customer=cus_123")
                    .body_contains("price%5D=price_live");
                then.status(200).json_body(json!({
                    "id": "sub_new",
                    "metadata": { "project": "Bramble" },
                    "items": { "data": [], "has_more": false }
                }));
            })
            .await;
        let app = subscriber_app(&server).await;

        let body = create_subscription(
            State(app.state.clone()),
            bearer("a@example.com:s3cret"),
            Json(subscribe_request()),
        )
        .await
        .unwrap();
        created.assert_async().await;
        assert_eq!(body.0, json!({ "success": true }));
    }

    #[tokio::test]
    async fn subscribing_without_a_card_opens_a_checkout() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/prices/price_live");
                then.status(200).json_body(json!({
                    "id": "price_live",
                    "unit_amount": 100,
                    "type": "recurring",
                    "recurring": { "usage_type": "metered" }
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/subscriptions");
                then.status(200).json_body(json!({ "data": [], "has_more": false }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/customers/cus_123");
                then.status(200).json_body(json!({ "id": "cus_123" }));
            })
            .await;
        let checkout = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/checkout/sessions")
                    .body_contains("mode=subscription")
                    .body_contains("customer=cus_123");
                then.status(200)
                    .json_body(json!({ "id": "cs_1", "url": "https://checkout.test/pay" }));
            })
            .await;
        let app = subscriber_app(&server).await;

        let body = create_subscription(
            State(app.state.clone()),
            bearer("a@example.com:s3cret"),
            Json(subscribe_request()),
        )
        .await
        .unwrap();
        checkout.assert_async().await;
        assert_eq!(body.0, json!({ "url": "https://checkout.test/pay" }));
    }

    #[tokio::test]
    async fn subscribe_requires_a_valid_token() {
        let server = MockServer::start_async().await;
        let app = subscriber_app(&server).await;

        let error = create_subscription(
            State(app.state.clone()),
            bearer("a@example.com:wrong"),
            Json(subscribe_request()),
        )
        .await
        .unwrap_err();
        assert_eq!(error, (StatusCode::UNAUTHORIZED, "Invalid token".to_string()));
    }

    #[tokio::test]
    async fn subscribe_failures_point_at_support() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/prices/price_live");
                then.status(404).json_body(json!({
                    "error": { "message": "No such price: 'price_live'" }
                }));
            })
            .await;
        let app = subscriber_app(&server).await;

        let error = create_subscription(
            State(app.state.clone()),
            bearer("a@example.com:s3cret"),
            Json(subscribe_request()),
        )
        .await
        .unwrap_err();
        assert_eq!(
            error,
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to subscribe to Bramble extension: No such price: 'price_live'. \
                 Contact support@bramble.garden for help!"
                    .to_string()
            )
        );
    }

    fn subscription_list_with_item() -> Value {
        json!({
            "data": [{
                "id": "sub_1",
                "metadata": { "project": "Bramble" },
                "items": {
                    "data": [{ "id": "si_1", "price": licensed_price() }],
                    "has_more": false
                }
            }],
            "has_more": false
        })
    }

    #[tokio::test]
    async fn unsubscribing_cancels_and_clears_the_unlock() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/subscriptions");
                then.status(200).json_body(subscription_list_with_item());
            })
            .await;
        let cancel = server
            .mock_async(|when, then| {
                when.method(DELETE).path("/subscriptions/sub_1");
                then.status(200).json_body(json!({ "id": "sub_1" }));
            })
            .await;
        let app = subscriber_app(&server).await;
        app.directory
            .insert_user(clerk_user(
                "user_abc",
                "a@example.com",
                json!({ "githubSync": {} }),
                json!({ "token": seal_token("s3cret", "test-key"), "stripeId": "cus_123" }),
            ))
            .await;

        let body = cancel_subscription(
            State(app.state.clone()),
            bearer("a@example.com:s3cret"),
            Json(subscribe_request()),
        )
        .await
        .unwrap();
        cancel.assert_async().await;
        assert_eq!(body.0, json!({ "success": true }));

        let user = app
            .directory
            .user_by_id("user_abc", false)
            .await
            .unwrap()
            .unwrap();
        assert!(!user.public_metadata.contains_key("githubSync"));
    }

    #[tokio::test]
    async fn unsubscribing_without_a_subscription_conflicts() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/subscriptions");
                then.status(200).json_body(json!({ "data": [], "has_more": false }));
            })
            .await;
        let app = subscriber_app(&server).await;

        let error = cancel_subscription(
            State(app.state.clone()),
            bearer("a@example.com:s3cret"),
            Json(subscribe_request()),
        )
        .await
        .unwrap_err();
        assert_eq!(
            error,
            (
                StatusCode::CONFLICT,
                "Current user is not subscribed to github-sync".to_string()
            )
        );
    }

    #[tokio::test]
    async fn failed_cancellations_surface_the_reason() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/subscriptions");
                then.status(200).json_body(subscription_list_with_item());
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(DELETE).path("/subscriptions/sub_1");
                then.status(402).json_body(json!({
                    "error": { "message": "subscription is locked" }
                }));
            })
            .await;
        let app = subscriber_app(&server).await;

        let error = cancel_subscription(
            State(app.state.clone()),
            bearer("a@example.com:s3cret"),
            Json(subscribe_request()),
        )
        .await
        .unwrap_err();
        assert_eq!(
            error,
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to cancel Bramble subscription: subscription is locked".to_string()
            )
        );
    }

    #[tokio::test]
    async fn unsubscribing_tolerates_a_missing_unlock() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/subscriptions");
                then.status(200).json_body(subscription_list_with_item());
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(DELETE).path("/subscriptions/sub_1");
                then.status(200).json_body(json!({ "id": "sub_1" }));
            })
            .await;
        let app = subscriber_app(&server).await;

        let body = cancel_subscription(
            State(app.state.clone()),
            bearer("a@example.com:s3cret"),
            Json(subscribe_request()),
        )
        .await
        .unwrap();
        assert_eq!(body.0, json!({ "success": true }));
    }

    fn signed_headers(payload: &str, secret: &str) -> HeaderMap {
        let timestamp = chrono::Utc::now().timestamp();
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{timestamp}.{payload}").as_bytes());
        let signature = format!(
            "t={},v1={}",
            timestamp,
            hex::encode(mac.finalize().into_bytes())
        );
        let mut headers = HeaderMap::new();
        headers.insert("stripe-signature", signature.parse().unwrap());
        headers
    }

    fn webhook_app() -> TestApp {
        TestApp::with_config(Config {
            dev_checkout_secret: "whsec_test".to_string(),
            token_sealing_key: "test-key".to_string(),
            ..Config::default()
        })
    }

    fn completed_session(user_id: &str) -> String {
        json!({
            "id": "evt_1",
            "type": "checkout.session.completed",
            "livemode": false,
            "data": {
                "object": {
                    "metadata": { "userId": user_id, "extension": "githubSync" }
                }
            }
        })
        .to_string()
    }

    #[tokio::test]
    async fn finishing_unlocks_the_extension() {
        let app = webhook_app();
        app.directory
            .insert_user(clerk_user("user_abc", "a@example.com", json!({}), json!({})))
            .await;

        let payload = completed_session("user_abc");
        let response = finish_subscription(
            State(app.state.clone()),
            signed_headers(&payload, "whsec_test"),
            payload,
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response_json(response).await, json!({ "success": true }));

        let user = app
            .directory
            .user_by_id("user_abc", true)
            .await
            .unwrap()
            .unwrap();
        assert!(user.public_metadata.contains_key("githubSync"));
    }

    #[tokio::test]
    async fn finishing_an_unlocked_extension_is_a_no_op() {
        let app = webhook_app();
        app.directory
            .insert_user(clerk_user(
                "user_abc",
                "a@example.com",
                json!({ "githubSync": {} }),
                json!({}),
            ))
            .await;

        let payload = completed_session("user_abc");
        let response = finish_subscription(
            State(app.state.clone()),
            signed_headers(&payload, "whsec_test"),
            payload,
        )
        .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn bad_webhook_signatures_alert_support() {
        let app = webhook_app();
        let payload = completed_session("user_abc");
        let mut headers = HeaderMap::new();
        headers.insert("stripe-signature", "t=1,v1=00".parse().unwrap());

        let response = finish_subscription(State(app.state.clone()), headers, payload).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = response_text(response).await;
        assert!(body.starts_with("Webhook Error: "));

        let sent = app.outbox.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Bramble Error: Failed to finish subscription");
    }

    #[tokio::test]
    async fn finishing_requires_a_user_id() {
        let app = webhook_app();
        let payload = json!({
            "id": "evt_1",
            "type": "checkout.session.completed",
            "livemode": false,
            "data": { "object": { "metadata": { "extension": "githubSync" } } }
        })
        .to_string();

        let response = finish_subscription(
            State(app.state.clone()),
            signed_headers(&payload, "whsec_test"),
            payload,
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response_text(response).await, "UserId is required");
        assert!(app.outbox.sent().await.is_empty());
    }

    fn meter_developer() -> DeveloperUser {
        DeveloperUser {
            user: clerk_user("user_dev", "d@example.com", json!({}), json!({})),
            dev: false,
        }
    }

    fn meter_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(EXTENSION_HEADER, "github-sync".parse().unwrap());
        headers
    }

    #[tokio::test]
    async fn meters_a_user_by_id() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/subscriptions");
                then.status(200).json_body(subscription_list_with_item());
            })
            .await;
        let usage = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/subscription_items/si_1/usage_records")
                    .body_contains("quantity=5")
                    .body_contains("action=increment");
                then.status(200).json_body(json!({ "id": "mbur_1" }));
            })
            .await;
        let app = subscriber_app(&server).await;
        app.directory
            .insert_user(clerk_user(
                "user_abc",
                "a@example.com",
                json!({ "githubSync": {} }),
                json!({ "token": seal_token("s3cret", "test-key"), "stripeId": "cus_123" }),
            ))
            .await;

        let body = meter_usage(
            State(app.state.clone()),
            meter_developer(),
            meter_headers(),
            Json(MeterRequest {
                quantity: 5,
                email: None,
                id: Some("user_abc".to_string()),
            }),
        )
        .await
        .unwrap();
        usage.assert_async().await;
        assert_eq!(body.0, json!({ "id": "mbur_1" }));
    }

    #[tokio::test]
    async fn meters_a_user_by_email() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/subscriptions");
                then.status(200).json_body(subscription_list_with_item());
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/subscription_items/si_1/usage_records");
                then.status(200).json_body(json!({ "id": "mbur_2" }));
            })
            .await;
        let app = subscriber_app(&server).await;
        app.directory
            .insert_user(clerk_user(
                "user_other",
                "b@example.com",
                json!({}),
                json!({}),
            ))
            .await;
        app.directory
            .insert_user(clerk_user(
                "user_sub",
                "b@example.com",
                json!({ "githubSync": {} }),
                json!({ "stripeId": "cus_123" }),
            ))
            .await;

        let body = meter_usage(
            State(app.state.clone()),
            meter_developer(),
            meter_headers(),
            Json(MeterRequest {
                quantity: 2,
                email: Some("b@example.com".to_string()),
                id: None,
            }),
        )
        .await
        .unwrap();
        assert_eq!(body.0, json!({ "id": "mbur_2" }));
    }

    #[tokio::test]
    async fn metering_requires_a_positive_quantity() {
        let server = MockServer::start_async().await;
        let app = subscriber_app(&server).await;

        let error = meter_usage(
            State(app.state.clone()),
            meter_developer(),
            meter_headers(),
            Json(MeterRequest {
                quantity: 0,
                email: None,
                id: Some("user_abc".to_string()),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(
            error,
            (
                StatusCode::BAD_REQUEST,
                "`quantity` is required and must be greater than 0".to_string()
            )
        );
    }

    #[tokio::test]
    async fn metering_requires_a_target_user() {
        let server = MockServer::start_async().await;
        let app = subscriber_app(&server).await;

        let error = meter_usage(
            State(app.state.clone()),
            meter_developer(),
            meter_headers(),
            Json(MeterRequest {
                quantity: 3,
                email: None,
                id: None,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(
            error,
            (
                StatusCode::BAD_REQUEST,
                "`id` or `email` is required to meter user".to_string()
            )
        );
    }

    #[tokio::test]
    async fn metering_an_unknown_subscriber_conflicts() {
        let server = MockServer::start_async().await;
        let app = subscriber_app(&server).await;
        app.directory
            .insert_user(clerk_user("user_free", "b@example.com", json!({}), json!({})))
            .await;

        let error = meter_usage(
            State(app.state.clone()),
            meter_developer(),
            meter_headers(),
            Json(MeterRequest {
                quantity: 3,
                email: Some("b@example.com".to_string()),
                id: None,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(
            error,
            (
                StatusCode::CONFLICT,
                "There are no customers with email b@example.com or id  subscribed to github-sync"
                    .to_string()
            )
        );
    }

    #[tokio::test]
    async fn metering_without_a_subscription_conflicts() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/subscriptions");
                then.status(200).json_body(json!({ "data": [], "has_more": false }));
            })
            .await;
        let app = subscriber_app(&server).await;
        app.directory
            .insert_user(clerk_user(
                "user_abc",
                "a@example.com",
                json!({ "githubSync": {} }),
                json!({ "stripeId": "cus_123" }),
            ))
            .await;

        let error = meter_usage(
            State(app.state.clone()),
            meter_developer(),
            meter_headers(),
            Json(MeterRequest {
                quantity: 3,
                email: None,
                id: Some("user_abc".to_string()),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(
            error,
            (
                StatusCode::CONFLICT,
                "There is no subscription attached to extension github-sync".to_string()
            )
        );
    }
}
