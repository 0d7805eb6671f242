//! In-memory user directory for development and testing.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use bramble_core::auth::{parse_token, verify_sealed, ParsedToken};

use crate::clerk::ClerkUser;
use crate::directory::UserDirectory;
use crate::error::AuthError;

/// Directory over a HashMap of users. The dev flag is accepted and
/// ignored since the mock holds a single set of users.
#[derive(Clone, Default)]
pub struct MockDirectory {
    users: Arc<RwLock<HashMap<String, ClerkUser>>>,
    sealing_key: String,
}

impl MockDirectory {
    pub fn new(sealing_key: impl Into<String>) -> Self {
        Self {
            users: Arc::new(RwLock::new(HashMap::new())),
            sealing_key: sealing_key.into(),
        }
    }

    pub async fn insert_user(&self, user: ClerkUser) {
        self.users.write().await.insert(user.id.clone(), user);
    }

    async fn find<F>(&self, predicate: F) -> Option<ClerkUser>
    where
        F: Fn(&ClerkUser) -> bool,
    {
        self.users
            .read()
            .await
            .values()
            .find(|user| predicate(user))
            .cloned()
    }

    fn missing(user_id: &str) -> AuthError {
        AuthError::Provider {
            status: 404,
            message: format!("User {user_id} not found"),
        }
    }
}

#[async_trait]
impl UserDirectory for MockDirectory {
    async fn find_by_extension_token(
        &self,
        authorization: &str,
        service: &str,
        _dev: bool,
    ) -> Result<Option<ClerkUser>, AuthError> {
        match parse_token(authorization) {
            ParsedToken::V2 { user_id, raw } => {
                let users = self.users.read().await;
                Ok(users
                    .get(&format!("user_{user_id}"))
                    .filter(|user| user.extension_token(service) == Some(raw.as_str()))
                    .cloned())
            }
            ParsedToken::Legacy { secret } => Ok(self
                .find(|user| user.extension_token(service) == Some(secret.as_str()))
                .await),
        }
    }

    async fn find_by_account_token(
        &self,
        authorization: &str,
        _dev: bool,
    ) -> Result<Option<ClerkUser>, AuthError> {
        let token = authorization
            .strip_prefix("Bearer ")
            .unwrap_or(authorization);
        if token.is_empty() {
            return Ok(None);
        }
        match token.split_once(':') {
            Some((email, secret)) => Ok(self
                .find(|user| user.primary_email() == Some(email))
                .await
                .filter(|user| {
                    user.sealed_account_token()
                        .is_some_and(|sealed| verify_sealed(secret, sealed, &self.sealing_key))
                })),
            None => Ok(self
                .find(|user| {
                    user.sealed_account_token()
                        .is_some_and(|sealed| verify_sealed(token, sealed, &self.sealing_key))
                })
                .await),
        }
    }

    async fn mark_authenticated(
        &self,
        user: &ClerkUser,
        service: &str,
        _dev: bool,
    ) -> Result<(), AuthError> {
        let mut users = self.users.write().await;
        let stored = users.get_mut(&user.id).ok_or_else(|| Self::missing(&user.id))?;
        let mut data = stored.extension_data(service).cloned().unwrap_or_default();
        data.insert("authenticated".to_string(), Value::Bool(true));
        stored
            .public_metadata
            .insert(service.to_string(), Value::Object(data));
        Ok(())
    }

    async fn user_by_id(
        &self,
        user_id: &str,
        _dev: bool,
    ) -> Result<Option<ClerkUser>, AuthError> {
        Ok(self.users.read().await.get(user_id).cloned())
    }

    async fn users_by_email(
        &self,
        email: &str,
        _dev: bool,
    ) -> Result<Vec<ClerkUser>, AuthError> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .filter(|user| user.primary_email() == Some(email))
            .cloned()
            .collect())
    }

    async fn update_public_metadata(
        &self,
        user_id: &str,
        metadata: &Map<String, Value>,
        _dev: bool,
    ) -> Result<(), AuthError> {
        let mut users = self.users.write().await;
        let stored = users.get_mut(user_id).ok_or_else(|| Self::missing(user_id))?;
        stored.public_metadata = metadata.clone();
        Ok(())
    }

    async fn update_private_metadata(
        &self,
        user_id: &str,
        metadata: &Map<String, Value>,
        _dev: bool,
    ) -> Result<(), AuthError> {
        let mut users = self.users.write().await;
        let stored = users.get_mut(user_id).ok_or_else(|| Self::missing(user_id))?;
        stored.private_metadata = metadata.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::prelude::{Engine, BASE64_STANDARD};
    use bramble_core::auth::seal_token;
    use serde_json::json;

    fn user(id: &str, email: &str, public: Value, private: Value) -> ClerkUser {
        serde_json::from_value(json!({
            "id": id,
            "email_addresses": [
                { "id": "idn_1", "email_address": email }
            ],
            "primary_email_address_id": "idn_1",
            "public_metadata": public,
            "private_metadata": private,
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn extension_tokens_resolve_against_stored_metadata() {
        let directory = MockDirectory::new("key");
        let raw = BASE64_STANDARD.encode("abc:secret");
        directory
            .insert_user(user(
                "user_abc",
                "a@example.com",
                json!({ "staticSite": { "token": raw } }),
                json!({}),
            ))
            .await;

        let found = directory
            .find_by_extension_token(&raw, "staticSite", false)
            .await
            .unwrap();
        assert_eq!(found.map(|u| u.id), Some("user_abc".to_string()));

        let wrong_service = directory
            .find_by_extension_token(&raw, "otherService", false)
            .await
            .unwrap();
        assert!(wrong_service.is_none());
    }

    #[tokio::test]
    async fn account_tokens_verify_against_the_sealed_value() {
        let directory = MockDirectory::new("key");
        let sealed = seal_token("secret", "key");
        directory
            .insert_user(user(
                "user_abc",
                "a@example.com",
                json!({}),
                json!({ "token": sealed }),
            ))
            .await;

        let by_email = directory
            .find_by_account_token("Bearer a@example.com:secret", false)
            .await
            .unwrap();
        assert!(by_email.is_some());

        let bare = directory.find_by_account_token("secret", false).await.unwrap();
        assert!(bare.is_some());

        let wrong = directory
            .find_by_account_token("a@example.com:other", false)
            .await
            .unwrap();
        assert!(wrong.is_none());
    }

    #[tokio::test]
    async fn mark_authenticated_updates_the_stored_user() {
        let directory = MockDirectory::new("key");
        let stored = user(
            "user_abc",
            "a@example.com",
            json!({ "staticSite": { "token": "t" } }),
            json!({}),
        );
        directory.insert_user(stored.clone()).await;

        directory
            .mark_authenticated(&stored, "staticSite", false)
            .await
            .unwrap();

        let updated = directory.user_by_id("user_abc", false).await.unwrap().unwrap();
        assert!(updated.is_authenticated_for("staticSite"));
        assert_eq!(updated.extension_token("staticSite"), Some("t"));
    }
}
