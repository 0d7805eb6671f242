//! Application state shared across request handlers.
//!
//! This module defines the shared application state that is passed to all
//! request handlers. It uses store trait objects for storage abstraction
//! and supports different backends via feature flags.

use std::sync::Arc;

use bramble_auth::{AuthState, ClerkClient, ClerkDirectory, UserDirectory};
use bramble_core::storage::{ExtensionStore, FileStore, HandoffStore};

use crate::config::Config;
use crate::graph::GraphClient;
use crate::mail::SupportMailer;
use crate::relay::RelayClient;
use crate::stripe::StripeClient;

/// Shared application state.
///
/// This is cloned for each request handler and contains shared resources
/// including store trait objects for the active storage backend.
#[derive(Clone)]
pub struct AppState {
    /// Runtime configuration.
    pub config: Arc<Config>,
    /// Parked credential handoffs.
    pub handoffs: Arc<dyn HandoffStore>,
    /// Extension registry.
    pub extensions: Arc<dyn ExtensionStore>,
    /// Extension file storage.
    pub files: Arc<dyn FileStore>,
    /// User directory backing the auth extractors.
    pub directory: Arc<dyn UserDirectory>,
    /// Extractor state for the auth layer.
    pub auth: AuthState,
    /// Support mailbox for failure alerts and extension error reports.
    pub mail: SupportMailer,
    /// Stripe billing client.
    pub stripe: Arc<StripeClient>,
    /// Graph query API client.
    pub graph: Arc<GraphClient>,
    /// Relay for endpoints proxied to the upstream backend.
    pub relay: Arc<RelayClient>,
}

/// Lets the auth extractors pull their state out of ours.
impl AsRef<AuthState> for AppState {
    fn as_ref(&self) -> &AuthState {
        &self.auth
    }
}

impl AppState {
    /// Creates a new AppState with the given stores and configuration.
    fn build(
        config: Config,
        handoffs: Arc<dyn HandoffStore>,
        extensions: Arc<dyn ExtensionStore>,
        files: Arc<dyn FileStore>,
        directory: Arc<dyn UserDirectory>,
        mail: SupportMailer,
    ) -> Result<Self, anyhow::Error> {
        let stripe = Arc::new(StripeClient::new(
            &config.stripe_api_url,
            &config.stripe_secret_key,
            &config.stripe_dev_secret_key,
        ));
        let graph = Arc::new(GraphClient::new(
            &config.graph_api_url,
            &config.home_graph,
            &config.graph_token,
        )?);
        let relay = Arc::new(RelayClient::new(&config.relay_url));
        let auth = AuthState::new(directory.clone());

        Ok(Self {
            config: Arc::new(config),
            handoffs,
            extensions,
            files,
            directory,
            auth,
            mail,
            stripe,
            graph,
            relay,
        })
    }

    /// Clerk directory with failure alerts wired to the support mailbox.
    fn clerk_directory(config: &Config, mail: &SupportMailer) -> Arc<dyn UserDirectory> {
        Arc::new(
            ClerkDirectory::new(
                ClerkClient::new(&config.clerk_api_url, &config.clerk_secret_key),
                ClerkClient::new(&config.clerk_api_url, &config.clerk_dev_secret_key),
                &config.token_sealing_key,
            )
            .with_alerts(Box::new(mail.clone())),
        )
    }
}

// ============================================================================
// Factory functions for the storage backends
// ============================================================================

#[cfg(feature = "inmemory")]
mod inmemory {
    use super::*;
    use crate::mail::MemoryMailer;
    use crate::storage::{MemoryFileStore, MemoryRepository};

    impl AppState {
        /// Creates AppState with in-memory storage and a recording mailer.
        /// Useful for local development without any AWS dependencies.
        pub async fn new(config: &Config) -> Result<Self, anyhow::Error> {
            let repository = Arc::new(MemoryRepository::new());
            let files = Arc::new(MemoryFileStore::new());
            let mail = SupportMailer::new(Arc::new(MemoryMailer::new()), &config.support_email);
            let directory = Self::clerk_directory(config, &mail);

            Self::build(
                config.clone(),
                repository.clone(),
                repository,
                files,
                directory,
                mail,
            )
        }
    }
}

#[cfg(feature = "aws")]
mod aws {
    use super::*;
    use crate::mail::SesMailer;
    use crate::storage::{DynamoRepository, S3FileStore};

    impl AppState {
        /// Creates AppState backed by DynamoDB, S3 and SES.
        pub async fn new(config: &Config) -> Result<Self, anyhow::Error> {
            let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
            let repository = Arc::new(DynamoRepository::new(
                aws_sdk_dynamodb::Client::new(&aws_config),
                &config.handoff_table,
                &config.extensions_table,
            ));
            let files = Arc::new(S3FileStore::new(
                aws_sdk_s3::Client::new(&aws_config),
                &config.data_bucket,
            ));
            let mailer = SesMailer::new(
                aws_sdk_sesv2::Client::new(&aws_config),
                &config.support_email,
            );
            let mail = SupportMailer::new(Arc::new(mailer), &config.support_email);
            let directory = Self::clerk_directory(config, &mail);

            Self::build(
                config.clone(),
                repository.clone(),
                repository,
                files,
                directory,
                mail,
            )
        }
    }
}

// ============================================================================
// Test support
// ============================================================================
