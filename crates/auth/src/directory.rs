//! Token authentication against the user directory.
//!
//! Two token families are honored. Extension tokens live in public
//! metadata under the service's field and come in a current form
//! (base64 of `{id}:{secret}`, looked up directly) and a legacy form
//! (matched by scanning the directory page by page). Account tokens
//! are minted by the token endpoint and stored sealed in private
//! metadata; they arrive bare or as `{email}:{secret}`.

use async_trait::async_trait;
use serde_json::{Map, Value};

use bramble_core::auth::{parse_token, verify_sealed, ParsedToken};

use crate::clerk::{ClerkClient, ClerkUser};
use crate::error::AuthError;

/// Page size for legacy directory scans.
const SCAN_PAGE_SIZE: usize = 100;
/// Legacy scans give up past this many users.
const SCAN_LIMIT: usize = 10_000;

/// Hook for telling support when an identity lookup fails in a way
/// that is not the caller's fault.
#[async_trait]
pub trait FailureAlerts: Send + Sync {
    async fn notify(&self, subject: &str, detail: &str);
}

/// User lookups and updates, switched between the live and dev
/// identity instances by the caller's dev flag.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Authenticate an extension token for a service. `None` means the
    /// token did not match any user.
    async fn find_by_extension_token(
        &self,
        authorization: &str,
        service: &str,
        dev: bool,
    ) -> Result<Option<ClerkUser>, AuthError>;

    /// Authenticate an account token. `None` means no match.
    async fn find_by_account_token(
        &self,
        authorization: &str,
        dev: bool,
    ) -> Result<Option<ClerkUser>, AuthError>;

    /// Record that a service has seen this user authenticate.
    async fn mark_authenticated(
        &self,
        user: &ClerkUser,
        service: &str,
        dev: bool,
    ) -> Result<(), AuthError>;

    async fn user_by_id(&self, user_id: &str, dev: bool)
        -> Result<Option<ClerkUser>, AuthError>;

    async fn users_by_email(&self, email: &str, dev: bool)
        -> Result<Vec<ClerkUser>, AuthError>;

    /// Replace a user's public metadata.
    async fn update_public_metadata(
        &self,
        user_id: &str,
        metadata: &Map<String, Value>,
        dev: bool,
    ) -> Result<(), AuthError>;

    /// Replace a user's private metadata.
    async fn update_private_metadata(
        &self,
        user_id: &str,
        metadata: &Map<String, Value>,
        dev: bool,
    ) -> Result<(), AuthError>;
}

/// Directory backed by two Clerk instances, one live and one dev.
pub struct ClerkDirectory {
    live: ClerkClient,
    dev: ClerkClient,
    sealing_key: String,
    alerts: Option<Box<dyn FailureAlerts>>,
}

impl ClerkDirectory {
    pub fn new(live: ClerkClient, dev: ClerkClient, sealing_key: impl Into<String>) -> Self {
        Self {
            live,
            dev,
            sealing_key: sealing_key.into(),
            alerts: None,
        }
    }

    /// Send unexpected lookup failures to support.
    pub fn with_alerts(mut self, alerts: Box<dyn FailureAlerts>) -> Self {
        self.alerts = Some(alerts);
        self
    }

    fn client(&self, dev: bool) -> &ClerkClient {
        if dev {
            &self.dev
        } else {
            &self.live
        }
    }

    async fn alert(&self, subject: &str, detail: &str) {
        if let Some(alerts) = &self.alerts {
            alerts.notify(subject, detail).await;
        }
    }

    /// Page through every user until the predicate matches. Stops at
    /// the first short page or [`SCAN_LIMIT`] users.
    async fn scan_users<F>(&self, dev: bool, predicate: F) -> Result<Option<ClerkUser>, AuthError>
    where
        F: Fn(&ClerkUser) -> bool,
    {
        let mut offset = 0;
        while offset < SCAN_LIMIT {
            let page = self.client(dev).list_users(SCAN_PAGE_SIZE, offset).await?;
            if let Some(user) = page.iter().find(|user| predicate(user)) {
                return Ok(Some(user.clone()));
            }
            if page.len() < SCAN_PAGE_SIZE {
                return Ok(None);
            }
            offset += page.len();
        }
        Ok(None)
    }
}

#[async_trait]
impl UserDirectory for ClerkDirectory {
    async fn find_by_extension_token(
        &self,
        authorization: &str,
        service: &str,
        dev: bool,
    ) -> Result<Option<ClerkUser>, AuthError> {
        match parse_token(authorization) {
            ParsedToken::V2 { user_id, raw } => {
                // Token payloads carry the id without its `user_` prefix.
                let clerk_id = format!("user_{user_id}");
                match self.client(dev).get_user(&clerk_id).await {
                    Ok(Some(user)) => {
                        Ok((user.extension_token(service) == Some(raw.as_str())).then_some(user))
                    }
                    Ok(None) => Ok(None),
                    Err(error) => {
                        self.alert("Getting User From Clerk", &error.to_string()).await;
                        Ok(None)
                    }
                }
            }
            ParsedToken::Legacy { secret } => {
                self.scan_users(dev, |user| {
                    user.extension_token(service) == Some(secret.as_str())
                })
                .await
            }
        }
    }

    async fn find_by_account_token(
        &self,
        authorization: &str,
        dev: bool,
    ) -> Result<Option<ClerkUser>, AuthError> {
        let token = authorization
            .strip_prefix("Bearer ")
            .unwrap_or(authorization);
        if token.is_empty() {
            return Ok(None);
        }
        match token.split_once(':') {
            Some((email, secret)) => {
                let users = self.client(dev).users_by_email(email).await?;
                Ok(users.into_iter().next().filter(|user| {
                    user.sealed_account_token()
                        .is_some_and(|sealed| verify_sealed(secret, sealed, &self.sealing_key))
                }))
            }
            None => {
                self.scan_users(dev, |user| {
                    user.sealed_account_token()
                        .is_some_and(|sealed| verify_sealed(token, sealed, &self.sealing_key))
                })
                .await
            }
        }
    }

    async fn mark_authenticated(
        &self,
        user: &ClerkUser,
        service: &str,
        dev: bool,
    ) -> Result<(), AuthError> {
        let mut metadata = user.public_metadata.clone();
        let mut data = user.extension_data(service).cloned().unwrap_or_default();
        data.insert("authenticated".to_string(), Value::Bool(true));
        metadata.insert(service.to_string(), Value::Object(data));
        self.client(dev)
            .update_public_metadata(&user.id, &metadata)
            .await
    }

    async fn user_by_id(
        &self,
        user_id: &str,
        dev: bool,
    ) -> Result<Option<ClerkUser>, AuthError> {
        self.client(dev).get_user(user_id).await
    }

    async fn users_by_email(
        &self,
        email: &str,
        dev: bool,
    ) -> Result<Vec<ClerkUser>, AuthError> {
        self.client(dev).users_by_email(email).await
    }

    async fn update_public_metadata(
        &self,
        user_id: &str,
        metadata: &Map<String, Value>,
        dev: bool,
    ) -> Result<(), AuthError> {
        self.client(dev).update_public_metadata(user_id, metadata).await
    }

    async fn update_private_metadata(
        &self,
        user_id: &str,
        metadata: &Map<String, Value>,
        dev: bool,
    ) -> Result<(), AuthError> {
        self.client(dev).update_private_metadata(user_id, metadata).await
    }
}
