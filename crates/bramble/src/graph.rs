//! Client for the upstream graph query API.
//!
//! The query endpoint never answers directly: it 307s to whichever
//! backend holds the graph, and the redirected request must carry the
//! same authorization. reqwest drops auth headers on cross-host
//! redirects, so the client follows the one expected hop by hand.

use async_trait::async_trait;
use axum::http::header;
use serde_json::{json, Value};

use bramble_core::graph::{normalize_keys, BlockSource, GraphError, PullBlock};

/// Attributes pulled for a full page tree.
const PULL_SPEC: &str = ":block/string :node/title :block/uid :block/order :block/heading \
                         :block/open :children/view-type :block/text-align :edit/time \
                         {:block/children ...}";

/// Quote a value for inclusion in a datalog string literal.
fn escape(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('"', "\\\"")
}

pub struct GraphClient {
    http: reqwest::Client,
    base_url: String,
    home_graph: String,
    token: String,
}

impl GraphClient {
    pub fn new(
        base_url: impl Into<String>,
        home_graph: impl Into<String>,
        token: impl Into<String>,
    ) -> Result<Self, anyhow::Error> {
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            home_graph: home_graph.into(),
            token: token.into(),
        })
    }

    /// Run one datalog query against a graph on the caller's
    /// authorization. Returns upstream's status along with the result,
    /// its map keys normalized back to keywords.
    pub async fn query(
        &self,
        graph: &str,
        query: &str,
        authorization: &str,
    ) -> Result<(u16, Value), GraphError> {
        let url = format!("{}/api/graph/{}/q", self.base_url, graph);
        let body = json!({ "query": query });
        let first = self
            .http
            .post(&url)
            .header(header::AUTHORIZATION, authorization)
            .header(header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| GraphError::Request(e.to_string()))?;
        let status = first.status().as_u16();
        if status != 307 {
            return Err(GraphError::MissingRedirect(status));
        }
        let location = first
            .headers()
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| GraphError::Request("redirect did not include a location".to_string()))?
            .to_string();

        let response = self
            .http
            .post(&location)
            .header(header::AUTHORIZATION, authorization)
            .header(header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| GraphError::Request(e.to_string()))?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| GraphError::Request(e.to_string()))?;
        if !(200..400).contains(&status) {
            if status == 429 || text.trim() == "Too Many Requests" {
                return Err(GraphError::RateLimited);
            }
            return Err(GraphError::Upstream {
                status,
                message: text,
            });
        }
        let parsed: Value =
            serde_json::from_str(&text).map_err(|e| GraphError::Payload(e.to_string()))?;
        let result = parsed.get("result").cloned().unwrap_or(Value::Null);
        Ok((status, normalize_keys(result)))
    }

    /// Query the documentation graph with the configured token.
    pub async fn home_query(&self, query: &str) -> Result<Value, GraphError> {
        self.query(&self.home_graph, query, &self.token)
            .await
            .map(|(_, result)| result)
    }

    async fn pull_tree(&self, clause: &str) -> Result<Option<PullBlock>, GraphError> {
        let query = format!("[:find (pull ?b [{PULL_SPEC}]) :where [?b {clause}]]");
        let result = self.home_query(&query).await?;
        let Some(block) = result.get(0).and_then(|row| row.get(0)) else {
            return Ok(None);
        };
        if block.is_null() {
            return Ok(None);
        }
        serde_json::from_value(block.clone())
            .map(Some)
            .map_err(|e| GraphError::Payload(e.to_string()))
    }
}

#[async_trait]
impl BlockSource for GraphClient {
    async fn page_title_of(&self, uid: &str) -> Result<String, GraphError> {
        let query = format!(
            "[:find (pull ?p [:node/title]) :where [?e :block/uid \"{}\"] [?e :block/page ?p]]",
            escape(uid)
        );
        let result = self.home_query(&query).await?;
        Ok(result
            .get(0)
            .and_then(|row| row.get(0))
            .and_then(|block| block.get(":node/title"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }

    async fn text_of(&self, uid: &str) -> Result<String, GraphError> {
        let query = format!(
            "[:find (pull ?e [:block/string]) :where [?e :block/uid \"{}\"]]",
            escape(uid)
        );
        let result = self.home_query(&query).await?;
        Ok(result
            .get(0)
            .and_then(|row| row.get(0))
            .and_then(|block| block.get(":block/string"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }

    async fn pull_page(&self, title: &str) -> Result<Option<PullBlock>, GraphError> {
        self.pull_tree(&format!(":node/title \"{}\"", escape(title)))
            .await
    }

    async fn pull_block(&self, uid: &str) -> Result<Option<PullBlock>, GraphError> {
        self.pull_tree(&format!(":block/uid \"{}\"", escape(uid)))
            .await
    }
}
