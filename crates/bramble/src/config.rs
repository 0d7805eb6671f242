use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// DynamoDB table holding credential handoffs (default: "bramble-auth")
    pub handoff_table: String,
    /// DynamoDB table holding the extension registry (default: "bramble-extensions")
    pub extensions_table: String,
    /// S3 bucket for extension files and install markers (default: "bramble-data")
    pub data_bucket: String,
    /// Base URL of the Clerk API (default: "https://api.clerk.com/v1")
    pub clerk_api_url: String,
    /// Secret key for the live Clerk instance
    pub clerk_secret_key: String,
    /// Secret key for the dev Clerk instance
    pub clerk_dev_secret_key: String,
    /// Key used to seal account tokens before they are stored
    pub token_sealing_key: String,
    /// Base URL of the Stripe API (default: "https://api.stripe.com/v1")
    pub stripe_api_url: String,
    /// Secret key for live mode Stripe
    pub stripe_secret_key: String,
    /// Secret key for test mode Stripe
    pub stripe_dev_secret_key: String,
    /// Signing secret for live mode checkout webhooks
    pub checkout_secret: String,
    /// Signing secret for test mode checkout webhooks
    pub dev_checkout_secret: String,
    /// Base URL of the graph query API (default: "https://api.thicket.app")
    pub graph_api_url: String,
    /// Graph holding the documentation pages (default: "bramble")
    pub home_graph: String,
    /// API token for querying the documentation graph
    pub graph_token: String,
    /// Base URL of the OAuth relay (default: "https://api.undergrowth.dev")
    pub relay_url: String,
    /// Google OAuth client id forwarded to the relay
    pub google_client_id: String,
    /// Google OAuth client secret forwarded to the relay
    pub google_client_secret: String,
    /// Redirect URI for the Google OAuth flow
    /// (default: "https://bramble.garden/oauth?auth=true")
    pub google_redirect_uri: String,
    /// Base URL of the marketplace site (default: "https://bramble.garden")
    pub site_url: String,
    /// Public base URL of this API (default: "https://api.bramble.garden")
    pub api_url: String,
    /// Origin allowed by CORS, the editor extensions run in
    /// (default: "https://thicket.app")
    pub cors_origin: String,
    /// Address support alerts are sent to and from
    /// (default: "support@bramble.garden")
    pub support_email: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `BRAMBLE_AUTH_TABLE` - Handoff table name (default: "bramble-auth")
    /// - `BRAMBLE_EXTENSIONS_TABLE` - Registry table name (default: "bramble-extensions")
    /// - `BRAMBLE_DATA_BUCKET` - File bucket name (default: "bramble-data")
    /// - `CLERK_API_URL` - Clerk API base (default: "https://api.clerk.com/v1")
    /// - `CLERK_SECRET_KEY` - Live Clerk secret key
    /// - `CLERK_DEV_SECRET_KEY` - Dev Clerk secret key
    /// - `TOKEN_SEALING_KEY` - Account token sealing key
    /// - `STRIPE_API_URL` - Stripe API base (default: "https://api.stripe.com/v1")
    /// - `STRIPE_SECRET_KEY` - Live mode Stripe secret key
    /// - `STRIPE_DEV_SECRET_KEY` - Test mode Stripe secret key
    /// - `STRIPE_CHECKOUT_SECRET` - Live mode webhook signing secret
    /// - `STRIPE_DEV_CHECKOUT_SECRET` - Test mode webhook signing secret
    /// - `GRAPH_API_URL` - Graph API base (default: "https://api.thicket.app")
    /// - `HOME_GRAPH` - Documentation graph name (default: "bramble")
    /// - `GRAPH_API_TOKEN` - Documentation graph API token
    /// - `RELAY_URL` - OAuth relay base (default: "https://api.undergrowth.dev")
    /// - `GOOGLE_CLIENT_ID` - Google OAuth client id
    /// - `GOOGLE_CLIENT_SECRET` - Google OAuth client secret
    /// - `GOOGLE_REDIRECT_URI` - Google OAuth redirect URI
    /// - `SITE_URL` - Marketplace site base (default: "https://bramble.garden")
    /// - `API_URL` - This API's public base (default: "https://api.bramble.garden")
    /// - `CORS_ORIGIN` - Allowed CORS origin (default: "https://thicket.app")
    /// - `SUPPORT_EMAIL` - Support address (default: "support@bramble.garden")
    pub fn from_env() -> Self {
        Self {
            handoff_table: env::var("BRAMBLE_AUTH_TABLE")
                .unwrap_or_else(|_| "bramble-auth".to_string()),
            extensions_table: env::var("BRAMBLE_EXTENSIONS_TABLE")
                .unwrap_or_else(|_| "bramble-extensions".to_string()),
            data_bucket: env::var("BRAMBLE_DATA_BUCKET")
                .unwrap_or_else(|_| "bramble-data".to_string()),
            clerk_api_url: env::var("CLERK_API_URL")
                .unwrap_or_else(|_| "https://api.clerk.com/v1".to_string()),
            clerk_secret_key: env::var("CLERK_SECRET_KEY").unwrap_or_default(),
            clerk_dev_secret_key: env::var("CLERK_DEV_SECRET_KEY").unwrap_or_default(),
            token_sealing_key: env::var("TOKEN_SEALING_KEY").unwrap_or_default(),
            stripe_api_url: env::var("STRIPE_API_URL")
                .unwrap_or_else(|_| "https://api.stripe.com/v1".to_string()),
            stripe_secret_key: env::var("STRIPE_SECRET_KEY").unwrap_or_default(),
            stripe_dev_secret_key: env::var("STRIPE_DEV_SECRET_KEY").unwrap_or_default(),
            checkout_secret: env::var("STRIPE_CHECKOUT_SECRET").unwrap_or_default(),
            dev_checkout_secret: env::var("STRIPE_DEV_CHECKOUT_SECRET").unwrap_or_default(),
            graph_api_url: env::var("GRAPH_API_URL")
                .unwrap_or_else(|_| "https://api.thicket.app".to_string()),
            home_graph: env::var("HOME_GRAPH").unwrap_or_else(|_| "bramble".to_string()),
            graph_token: env::var("GRAPH_API_TOKEN").unwrap_or_default(),
            relay_url: env::var("RELAY_URL")
                .unwrap_or_else(|_| "https://api.undergrowth.dev".to_string()),
            google_client_id: env::var("GOOGLE_CLIENT_ID").unwrap_or_default(),
            google_client_secret: env::var("GOOGLE_CLIENT_SECRET").unwrap_or_default(),
            google_redirect_uri: env::var("GOOGLE_REDIRECT_URI")
                .unwrap_or_else(|_| "https://bramble.garden/oauth?auth=true".to_string()),
            site_url: env::var("SITE_URL").unwrap_or_else(|_| "https://bramble.garden".to_string()),
            api_url: env::var("API_URL")
                .unwrap_or_else(|_| "https://api.bramble.garden".to_string()),
            cors_origin: env::var("CORS_ORIGIN")
                .unwrap_or_else(|_| "https://thicket.app".to_string()),
            support_email: env::var("SUPPORT_EMAIL")
                .unwrap_or_else(|_| "support@bramble.garden".to_string()),
        }
    }

    /// Marketplace page for an extension, used for checkout redirects.
    pub fn extension_page(&self, id: &str) -> String {
        format!("{}/extensions/{}", self.site_url, id)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
