//! Thin client for the Clerk backend API.

use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::error::AuthError;

/// One email address attached to a Clerk user.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EmailAddress {
    pub id: String,
    pub email_address: String,
}

/// A Clerk user, trimmed to the fields bramble reads.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ClerkUser {
    pub id: String,
    #[serde(default)]
    pub email_addresses: Vec<EmailAddress>,
    #[serde(default)]
    pub primary_email_address_id: Option<String>,
    /// Per-extension data visible to the editor, keyed by the
    /// camelCase extension field.
    #[serde(default)]
    pub public_metadata: Map<String, Value>,
    /// Server-only data: the sealed account token and the Stripe
    /// customer id live here.
    #[serde(default)]
    pub private_metadata: Map<String, Value>,
}

impl ClerkUser {
    pub fn primary_email(&self) -> Option<&str> {
        let id = self.primary_email_address_id.as_deref()?;
        self.email_addresses
            .iter()
            .find(|email| email.id == id)
            .map(|email| email.email_address.as_str())
    }

    /// Public metadata stored under an extension field, if any.
    pub fn extension_data(&self, field: &str) -> Option<&Map<String, Value>> {
        self.public_metadata.get(field).and_then(Value::as_object)
    }

    /// The extension token stored for a service.
    pub fn extension_token(&self, field: &str) -> Option<&str> {
        self.extension_data(field)?.get("token")?.as_str()
    }

    /// Whether the service has seen this user authenticate before.
    pub fn is_authenticated_for(&self, field: &str) -> bool {
        self.extension_data(field)
            .and_then(|data| data.get("authenticated"))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// The sealed account token, when one has been issued.
    pub fn sealed_account_token(&self) -> Option<&str> {
        self.private_metadata.get("token")?.as_str()
    }

    /// The Stripe customer backing this user, when one exists.
    pub fn stripe_customer(&self) -> Option<&str> {
        self.private_metadata.get("stripeId")?.as_str()
    }

    /// The connected Stripe Express account, for extension developers
    /// taking payouts.
    pub fn stripe_account(&self) -> Option<&str> {
        self.private_metadata.get("stripeAccount")?.as_str()
    }
}

/// Client for one Clerk instance. Live and dev instances get separate
/// clients since they use separate secret keys.
pub struct ClerkClient {
    http: reqwest::Client,
    base_url: String,
    secret_key: String,
}

impl ClerkClient {
    pub fn new(base_url: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            secret_key: secret_key.into(),
        }
    }

    /// Fetch a user by id. Unknown ids are `Ok(None)`.
    pub async fn get_user(&self, user_id: &str) -> Result<Option<ClerkUser>, AuthError> {
        let response = self
            .http
            .get(format!("{}/users/{}", self.base_url, user_id))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| AuthError::Http(e.to_string()))?;
        if response.status().as_u16() == 404 {
            return Ok(None);
        }
        let response = Self::check_status(response).await?;
        response
            .json::<ClerkUser>()
            .await
            .map(Some)
            .map_err(|e| AuthError::MalformedResponse(e.to_string()))
    }

    /// One page of the full user list.
    pub async fn list_users(&self, limit: usize, offset: usize) -> Result<Vec<ClerkUser>, AuthError> {
        let response = self
            .http
            .get(format!("{}/users", self.base_url))
            .query(&[("limit", limit.to_string()), ("offset", offset.to_string())])
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| AuthError::Http(e.to_string()))?;
        let response = Self::check_status(response).await?;
        response
            .json::<Vec<ClerkUser>>()
            .await
            .map_err(|e| AuthError::MalformedResponse(e.to_string()))
    }

    /// Users holding the given email address.
    pub async fn users_by_email(&self, email: &str) -> Result<Vec<ClerkUser>, AuthError> {
        let response = self
            .http
            .get(format!("{}/users", self.base_url))
            .query(&[("email_address", email)])
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| AuthError::Http(e.to_string()))?;
        let response = Self::check_status(response).await?;
        response
            .json::<Vec<ClerkUser>>()
            .await
            .map_err(|e| AuthError::MalformedResponse(e.to_string()))
    }

    /// Replace a user's public metadata.
    pub async fn update_public_metadata(
        &self,
        user_id: &str,
        metadata: &Map<String, Value>,
    ) -> Result<(), AuthError> {
        self.patch_user(user_id, json!({ "public_metadata": metadata }))
            .await
    }

    /// Replace a user's private metadata.
    pub async fn update_private_metadata(
        &self,
        user_id: &str,
        metadata: &Map<String, Value>,
    ) -> Result<(), AuthError> {
        self.patch_user(user_id, json!({ "private_metadata": metadata }))
            .await
    }

    async fn patch_user(&self, user_id: &str, body: Value) -> Result<(), AuthError> {
        let response = self
            .http
            .patch(format!("{}/users/{}", self.base_url, user_id))
            .bearer_auth(&self.secret_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AuthError::Http(e.to_string()))?;
        Self::check_status(response).await.map(|_| ())
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, AuthError> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(AuthError::Provider {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            })
        }
    }
}
