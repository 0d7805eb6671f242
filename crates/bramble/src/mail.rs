//! Outbound email.
//!
//! Everything the API mails out goes through [`Mailer`]: support
//! alerts raised by failing handlers, error reports sent in by
//! extensions, and the identity failure hook the auth layer calls.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use bramble_auth::FailureAlerts;

/// Sends HTML email on behalf of the platform.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()>;
}

/// A mailer bound to the support inbox. Alert sends never fail the
/// request that raised them; delivery problems are only logged.
#[derive(Clone)]
pub struct SupportMailer {
    mailer: Arc<dyn Mailer>,
    support_email: String,
}

impl SupportMailer {
    pub fn new(mailer: Arc<dyn Mailer>, support_email: impl Into<String>) -> Self {
        Self {
            mailer,
            support_email: support_email.into(),
        }
    }

    /// Tell support something went wrong server side.
    pub async fn alert(&self, subject: &str, detail: &str) {
        let subject = format!("Bramble Error: {subject}");
        let body = format!("An error was thrown in the bramble API:\n\n{detail}");
        if let Err(error) = self.mailer.send(&self.support_email, &subject, &body).await {
            tracing::error!("Failed to send support alert: {}", error);
        }
    }
}

#[async_trait]
impl FailureAlerts for SupportMailer {
    async fn notify(&self, subject: &str, detail: &str) {
        self.alert(subject, detail).await;
    }
}

/// One delivered message, kept for assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// In-memory mailer for local runs and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryMailer {
    sent: Arc<RwLock<Vec<SentMail>>>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything sent so far, oldest first.
    pub async fn sent(&self) -> Vec<SentMail> {
        self.sent.read().await.clone()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        tracing::info!("Recording mail to {} with subject {}", to, subject);
        self.sent.write().await.push(SentMail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

#[cfg(feature = "aws")]
pub use ses::SesMailer;

#[cfg(feature = "aws")]
mod ses {
    use super::*;
    use aws_sdk_sesv2::types::{Body, Content, Destination, EmailContent, Message};

    /// Mailer backed by Amazon SES.
    pub struct SesMailer {
        client: aws_sdk_sesv2::Client,
        /// Verified identity messages are sent from, also the reply-to.
        from: String,
    }

    impl SesMailer {
        pub fn new(client: aws_sdk_sesv2::Client, from: impl Into<String>) -> Self {
            Self {
                client,
                from: from.into(),
            }
        }
    }

    #[async_trait]
    impl Mailer for SesMailer {
        async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
            let destination = Destination::builder().to_addresses(to).build();
            let subject = Content::builder().data(subject).charset("UTF-8").build()?;
            let html = Content::builder().data(body).charset("UTF-8").build()?;
            let message = Message::builder()
                .subject(subject)
                .body(Body::builder().html(html).build())
                .build();
            self.client
                .send_email()
                .from_email_address(&self.from)
                .reply_to_addresses(&self.from)
                .destination(destination)
                .content(EmailContent::builder().simple(message).build())
                .send()
                .await?;
            Ok(())
        }
    }
}
