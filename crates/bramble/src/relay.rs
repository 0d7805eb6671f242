//! Relay to the companion platform API.
//!
//! Some OAuth flows terminate on the companion platform rather than
//! here. The relay forwards the caller's request mostly untouched,
//! letting routes inject the headers the upstream endpoint expects,
//! and hands back whatever upstream answered.

use serde_json::{json, Value};

/// A request to forward upstream.
pub struct RelayRequest<'a> {
    pub path: &'a str,
    /// Extra headers the route injects, sent as given.
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

impl<'a> RelayRequest<'a> {
    pub fn post(path: &'a str, body: Value) -> Self {
        Self {
            path,
            headers: Vec::new(),
            body,
        }
    }
}

/// Upstream's answer, already flattened for responding.
#[derive(Debug, Clone)]
pub struct RelayResponse {
    pub status: u16,
    pub body: Value,
}

impl RelayResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub struct RelayClient {
    http: reqwest::Client,
    base_url: String,
}

impl RelayClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Forward a request. Transport failures map to a 500 with a
    /// `{message}` body, so the caller always has something to return.
    pub async fn forward(&self, request: RelayRequest<'_>) -> RelayResponse {
        let url = format!("{}/{}", self.base_url, request.path);
        let mut builder = self.http.post(&url).json(&request.body);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(error) => {
                tracing::error!("Relay request failed: {}", error);
                return RelayResponse {
                    status: 500,
                    body: json!({ "message": error.to_string() }),
                };
            }
        };
        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
        RelayResponse { status, body }
    }
}
