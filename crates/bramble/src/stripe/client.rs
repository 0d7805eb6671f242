use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

use super::types::{
    Account, AccountLink, CheckoutSession, Customer, List, PaymentMethod, Price, Subscription,
    SubscriptionItem, UsageRecord,
};

/// Metadata tag marking subscriptions this platform created. Paid
/// extensions all bill through one subscription per customer, found
/// again later by this tag.
pub const PROJECT_TAG: &str = "Bramble";

#[derive(Debug, Error)]
pub enum StripeError {
    /// Stripe rejected the request. Displays as the bare message since
    /// handlers quote it in response bodies.
    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("malformed Stripe response: {0}")]
    MalformedResponse(String),

    /// A webhook payload failed signature verification.
    #[error("{0}")]
    Signature(String),
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// Parameters for a subscription checkout session. The metadata lands
/// on the session so the finish webhook can unlock the extension.
pub struct SubscriptionCheckout<'a> {
    pub customer: &'a str,
    pub price: &'a str,
    /// `None` for metered prices, which must not carry a quantity.
    pub quantity: Option<u64>,
    pub success_url: &'a str,
    pub cancel_url: &'a str,
    pub extension_field: &'a str,
    pub user_id: &'a str,
    pub callback_url: &'a str,
}

/// Client for the Stripe API. One client serves both live and test
/// mode; every call picks its key by the caller's dev flag.
pub struct StripeClient {
    http: reqwest::Client,
    base_url: String,
    live_key: String,
    dev_key: String,
}

impl StripeClient {
    pub fn new(
        base_url: impl Into<String>,
        live_key: impl Into<String>,
        dev_key: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            live_key: live_key.into(),
            dev_key: dev_key.into(),
        }
    }

    fn key(&self, dev: bool) -> &str {
        if dev {
            &self.dev_key
        } else {
            &self.live_key
        }
    }

    pub async fn price(&self, id: &str, dev: bool) -> Result<Price, StripeError> {
        self.get_json(&format!("/prices/{id}"), &[], dev).await
    }

    /// Fetch a customer with its default payment method expanded.
    pub async fn customer(&self, id: &str, dev: bool) -> Result<Customer, StripeError> {
        self.get_json(
            &format!("/customers/{id}"),
            &[("expand[]", "invoice_settings.default_payment_method")],
            dev,
        )
        .await
    }

    pub async fn set_default_payment_method(
        &self,
        customer: &str,
        payment_method: &str,
        dev: bool,
    ) -> Result<Customer, StripeError> {
        let form = [(
            "invoice_settings[default_payment_method]",
            payment_method.to_string(),
        )];
        self.post_form(&format!("/customers/{customer}"), &form, dev)
            .await
    }

    /// Every card on file for a customer.
    pub async fn payment_methods(
        &self,
        customer: &str,
        dev: bool,
    ) -> Result<Vec<PaymentMethod>, StripeError> {
        self.get_json::<List<PaymentMethod>>(
            "/payment_methods",
            &[("customer", customer), ("type", "card")],
            dev,
        )
        .await
        .map(|list| list.data)
    }

    pub async fn payment_method(&self, id: &str, dev: bool) -> Result<PaymentMethod, StripeError> {
        self.get_json(&format!("/payment_methods/{id}"), &[], dev)
            .await
    }

    pub async fn detach_payment_method(
        &self,
        id: &str,
        dev: bool,
    ) -> Result<PaymentMethod, StripeError> {
        self.post_form(&format!("/payment_methods/{id}/detach"), &[], dev)
            .await
    }

    /// First page of a customer's subscriptions.
    pub async fn subscriptions(
        &self,
        customer: &str,
        dev: bool,
    ) -> Result<Vec<Subscription>, StripeError> {
        self.get_json::<List<Subscription>>("/subscriptions", &[("customer", customer)], dev)
            .await
            .map(|list| list.data)
    }

    pub async fn create_subscription(
        &self,
        customer: &str,
        price: &str,
        quantity: Option<u64>,
        dev: bool,
    ) -> Result<Subscription, StripeError> {
        let mut form = vec![
            ("customer", customer.to_string()),
            ("items[0][price]", price.to_string()),
            ("metadata[project]", PROJECT_TAG.to_string()),
        ];
        if let Some(quantity) = quantity {
            form.push(("items[0][quantity]", quantity.to_string()));
        }
        self.post_form("/subscriptions", &form, dev).await
    }

    pub async fn cancel_subscription(&self, id: &str, dev: bool) -> Result<(), StripeError> {
        let response = self
            .http
            .delete(format!("{}/subscriptions/{}", self.base_url, id))
            .bearer_auth(self.key(dev))
            .send()
            .await
            .map_err(|e| StripeError::Http(e.to_string()))?;
        Self::check_status(response).await.map(|_| ())
    }

    /// Add a price onto an existing subscription.
    pub async fn add_subscription_item(
        &self,
        subscription: &str,
        price: &str,
        quantity: Option<u64>,
        dev: bool,
    ) -> Result<SubscriptionItem, StripeError> {
        let mut form = vec![
            ("subscription", subscription.to_string()),
            ("price", price.to_string()),
        ];
        if let Some(quantity) = quantity {
            form.push(("quantity", quantity.to_string()));
        }
        self.post_form("/subscription_items", &form, dev).await
    }

    pub async fn create_usage_record(
        &self,
        subscription_item: &str,
        quantity: u64,
        timestamp: i64,
        dev: bool,
    ) -> Result<UsageRecord, StripeError> {
        let form = [
            ("quantity", quantity.to_string()),
            ("action", "increment".to_string()),
            ("timestamp", timestamp.to_string()),
        ];
        self.post_form(
            &format!("/subscription_items/{subscription_item}/usage_records"),
            &form,
            dev,
        )
        .await
    }

    pub async fn subscription_checkout(
        &self,
        params: SubscriptionCheckout<'_>,
        dev: bool,
    ) -> Result<CheckoutSession, StripeError> {
        let mut form = vec![
            ("customer", params.customer.to_string()),
            ("payment_method_types[0]", "card".to_string()),
            ("mode", "subscription".to_string()),
            ("line_items[0][price]", params.price.to_string()),
            ("success_url", params.success_url.to_string()),
            ("cancel_url", params.cancel_url.to_string()),
            ("subscription_data[metadata][project]", PROJECT_TAG.to_string()),
            ("metadata[extension]", params.extension_field.to_string()),
            ("metadata[userId]", params.user_id.to_string()),
            ("metadata[callback]", params.callback_url.to_string()),
        ];
        if let Some(quantity) = params.quantity {
            form.push(("line_items[0][quantity]", quantity.to_string()));
        }
        self.post_form("/checkout/sessions", &form, dev).await
    }

    /// Checkout session that saves a card without charging it.
    pub async fn setup_checkout(
        &self,
        customer: &str,
        success_url: &str,
        cancel_url: &str,
        dev: bool,
    ) -> Result<CheckoutSession, StripeError> {
        let form = [
            ("customer", customer.to_string()),
            ("payment_method_types[0]", "card".to_string()),
            ("mode", "setup".to_string()),
            ("success_url", success_url.to_string()),
            ("cancel_url", cancel_url.to_string()),
        ];
        self.post_form("/checkout/sessions", &form, dev).await
    }

    pub async fn create_express_account(&self, dev: bool) -> Result<Account, StripeError> {
        let form = [("type", "express".to_string())];
        self.post_form("/accounts", &form, dev).await
    }

    pub async fn account(&self, id: &str, dev: bool) -> Result<Account, StripeError> {
        self.get_json(&format!("/accounts/{id}"), &[], dev).await
    }

    pub async fn create_account_link(
        &self,
        account: &str,
        refresh_url: &str,
        return_url: &str,
        dev: bool,
    ) -> Result<AccountLink, StripeError> {
        let form = [
            ("account", account.to_string()),
            ("refresh_url", refresh_url.to_string()),
            ("return_url", return_url.to_string()),
            ("type", "account_onboarding".to_string()),
        ];
        self.post_form("/account_links", &form, dev).await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        dev: bool,
    ) -> Result<T, StripeError> {
        let response = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .query(query)
            .bearer_auth(self.key(dev))
            .send()
            .await
            .map_err(|e| StripeError::Http(e.to_string()))?;
        let response = Self::check_status(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| StripeError::MalformedResponse(e.to_string()))
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        form: &[(&str, String)],
        dev: bool,
    ) -> Result<T, StripeError> {
        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(self.key(dev))
            .form(form)
            .send()
            .await
            .map_err(|e| StripeError::Http(e.to_string()))?;
        let response = Self::check_status(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| StripeError::MalformedResponse(e.to_string()))
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, StripeError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let status = status.as_u16();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorEnvelope>(&body)
            .map(|envelope| envelope.error.message)
            .unwrap_or(body);
        Err(StripeError::Api { status, message })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client(server: &MockServer) -> StripeClient {
        StripeClient::new(server.base_url(), "sk_live", "sk_test")
    }

    #[tokio::test]
    async fn dev_calls_use_the_test_mode_key() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/prices/price_1")
                    .header("authorization", "Bearer sk_test");
                then.status(200).json_body(json!({
                    "id": "price_1",
                    "unit_amount": 500,
                    "type": "recurring",
                    "recurring": { "usage_type": "licensed" }
                }));
            })
            .await;

        let price = client(&server).price("price_1", true).await.unwrap();
        mock.assert_async().await;
        assert_eq!(price.unit_amount, Some(500));
        assert!(price.is_recurring());
    }

    #[tokio::test]
    async fn api_errors_surface_the_stripe_message() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/prices/missing");
                then.status(404).json_body(json!({
                    "error": { "message": "No such price: 'missing'", "type": "invalid_request_error" }
                }));
            })
            .await;

        let error = client(&server).price("missing", false).await.unwrap_err();
        assert_eq!(error.to_string(), "No such price: 'missing'");
        assert!(matches!(error, StripeError::Api { status: 404, .. }));
    }

    #[tokio::test]
    async fn create_subscription_tags_the_project() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/subscriptions")
                    .header("authorization", "Bearer sk_live")
                    .x_www_form_urlencoded_tuple("customer", "cus_1")
                    .x_www_form_urlencoded_tuple("items[0][price]", "price_1")
                    .x_www_form_urlencoded_tuple("items[0][quantity]", "1")
                    .x_www_form_urlencoded_tuple("metadata[project]", "Bramble");
                then.status(200).json_body(json!({
                    "id": "sub_1",
                    "metadata": { "project": "Bramble" },
                    "items": { "data": [
                        { "id": "si_1", "price": { "id": "price_1", "type": "recurring" } }
                    ] }
                }));
            })
            .await;

        let subscription = client(&server)
            .create_subscription("cus_1", "price_1", Some(1), false)
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(subscription.id, "sub_1");
        assert_eq!(subscription.items.data[0].id, "si_1");
    }

    #[tokio::test]
    async fn metered_lines_omit_the_quantity() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/subscription_items")
                    .body("subscription=sub_1&price=price_1");
                then.status(200).json_body(json!({
                    "id": "si_2",
                    "price": { "id": "price_1", "type": "recurring",
                               "recurring": { "usage_type": "metered" } }
                }));
            })
            .await;

        let item = client(&server)
            .add_subscription_item("sub_1", "price_1", None, false)
            .await
            .unwrap();
        mock.assert_async().await;
        assert!(item.price.is_metered());
    }

    #[tokio::test]
    async fn checkout_sessions_carry_the_finish_metadata() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/checkout/sessions")
                    .x_www_form_urlencoded_tuple("mode", "subscription")
                    .x_www_form_urlencoded_tuple("metadata[extension]", "googleCalendar")
                    .x_www_form_urlencoded_tuple("metadata[userId]", "user_1")
                    .x_www_form_urlencoded_tuple(
                        "metadata[callback]",
                        "https://api.bramble.garden/finish-subscription",
                    )
                    .x_www_form_urlencoded_tuple("subscription_data[metadata][project]", "Bramble");
                then.status(200).json_body(json!({
                    "id": "cs_1",
                    "url": "https://checkout.stripe.com/pay/cs_1"
                }));
            })
            .await;

        let session = client(&server)
            .subscription_checkout(
                SubscriptionCheckout {
                    customer: "cus_1",
                    price: "price_1",
                    quantity: Some(1),
                    success_url: "https://bramble.garden/extensions/google-calendar?success=true",
                    cancel_url: "https://bramble.garden/extensions/google-calendar?cancel=true",
                    extension_field: "googleCalendar",
                    user_id: "user_1",
                    callback_url: "https://api.bramble.garden/finish-subscription",
                },
                false,
            )
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(session.url.as_deref(), Some("https://checkout.stripe.com/pay/cs_1"));
    }
}
