//! Extension registry metadata.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a published extension.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExtensionState {
    Live,
    #[default]
    Private,
    Development,
    Legacy,
    #[serde(rename = "UNDER REVIEW")]
    UnderReview,
}

impl ExtensionState {
    /// The form stored in the registry table.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Live => "LIVE",
            Self::Private => "PRIVATE",
            Self::Development => "DEVELOPMENT",
            Self::Legacy => "LEGACY",
            Self::UnderReview => "UNDER REVIEW",
        }
    }

    /// Parse a stored state. Unknown values fall back to `Private`,
    /// the safe default for anything unpublished.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "LIVE" => Self::Live,
            "DEVELOPMENT" => Self::Development,
            "LEGACY" => Self::Legacy,
            "UNDER REVIEW" => Self::UnderReview,
            _ => Self::Private,
        }
    }
}

impl std::fmt::Display for ExtensionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One row of the extension registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtensionRecord {
    pub id: String,
    pub description: String,
    pub state: ExtensionState,
    /// Module entry point served to the editor, when published.
    pub entry: Option<String>,
    /// Zip download for self-hosted installs.
    pub download: Option<String>,
    /// Sort weight on the marketplace listing. Zero means unfeatured.
    pub featured: i64,
    /// Stripe price backing the paid tier, when the extension has one.
    pub premium: Option<String>,
    /// Test mode price used for dev mode subscriptions.
    pub dev_premium: Option<String>,
}

impl ExtensionRecord {
    /// Price to charge for this extension. Dev mode only ever sees the
    /// test mode price; a missing price means the extension is free.
    pub fn price_id(&self, dev: bool) -> Option<&str> {
        if dev {
            self.dev_premium.as_deref()
        } else {
            self.premium.as_deref()
        }
    }
}
