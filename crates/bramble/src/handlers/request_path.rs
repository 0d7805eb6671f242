//! Documentation pages for the extension marketplace.
//!
//! Extension docs live as pages in the platform's own graph. One
//! endpoint serves three shapes: the rendered docs for a single
//! extension, the list of documented subpages, and the registry
//! listing behind the marketplace index.

use std::sync::LazyLock;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};

use bramble_core::graph::{render_page, ContentResolver};

use crate::handlers::common::{graph_failure, storage_failure};
use crate::state::AppState;

static DOC_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*Documentation\s*$").unwrap());
static GITHUB_REPO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https://github\.com/\w+/[\w-]+$").unwrap());

/// Pages that both sit under a documented extension's namespace and
/// carry its title as a prefix.
const SUBPAGE_QUERY: &str = "[:find (pull ?b [:node/title]) (pull ?sub [:node/title]) \
 :where [?d :block/string \"Documentation\"] [?b :block/children ?d] [?b :node/title ?t] \
 [not [[clojure.string/starts-with? ?t \"legacy\"]]] \
 [?sub :node/title ?sub-title] [[clojure.string/starts-with? ?sub-title ?t]]]";

#[derive(Debug, Deserialize)]
pub struct RequestPathQuery {
    pub id: Option<String>,
    pub sub: Option<String>,
}

/// Serve marketplace documentation (GET /request-path).
pub async fn get_request_path(
    State(state): State<AppState>,
    Query(query): Query<RequestPathQuery>,
) -> Result<Json<Value>, (StatusCode, String)> {
    if let Some(id) = query.id.filter(|id| !id.is_empty()) {
        return extension_documentation(&state, &id).await;
    }
    if query.sub.as_deref() == Some("true") {
        return documented_subpages(&state).await;
    }
    registry_listing(&state).await
}

/// Extensions hosting docs in their repository point at it with a
/// single block holding the GitHub URL.
async fn fetch_readme(repo: &str) -> Result<String, reqwest::Error> {
    let url = format!(
        "{}/main/README.md",
        repo.replace("github.com", "raw.githubusercontent.com")
    );
    reqwest::get(&url).await?.text().await
}

async fn extension_documentation(
    state: &AppState,
    id: &str,
) -> Result<Json<Value>, (StatusCode, String)> {
    let path_id = id.split('/').next().unwrap_or(id);
    let record = state
        .extensions
        .get_extension(path_id)
        .await
        .map_err(storage_failure)?;
    let Some(record) = record else {
        return Err((
            StatusCode::NOT_FOUND,
            format!("No extension {path_id} found"),
        ));
    };

    let resolver = ContentResolver::new(&*state.graph, id);
    let page = resolver.content_tree(id).await.map_err(graph_failure)?;
    // The extension's own page keeps its docs under a "Documentation"
    // block; subpages are documentation wholesale.
    let docs = if id == page.path {
        page.blocks
            .iter()
            .find(|block| DOC_HEADING.is_match(&block.text))
            .map(|block| block.children.clone())
            .unwrap_or_default()
    } else {
        page.blocks
    };

    let content = if docs.len() == 1 && GITHUB_REPO.is_match(&docs[0].text) {
        fetch_readme(&docs[0].text)
            .await
            .map_err(|error| (StatusCode::INTERNAL_SERVER_ERROR, error.to_string()))?
    } else {
        render_page(&docs, page.view_type, &page.path)
    };

    Ok(Json(json!({
        "content": content,
        "state": record.state.as_str(),
        "description": record.description,
        "entry": record.entry.unwrap_or_default(),
        "downloadUrl": record.download.unwrap_or_default(),
    })))
}

async fn documented_subpages(state: &AppState) -> Result<Json<Value>, (StatusCode, String)> {
    let rows = state
        .graph
        .home_query(SUBPAGE_QUERY)
        .await
        .map_err(graph_failure)?;
    let paths: Vec<Value> = rows
        .as_array()
        .map(|rows| {
            rows.iter()
                .filter_map(|row| {
                    let id = row.get(0)?.get(":node/title")?.as_str()?;
                    let sub = row.get(1)?.get(":node/title")?.as_str()?;
                    if !sub.starts_with(&format!("{id}/")) {
                        return None;
                    }
                    let subpage: Vec<&str> = sub.split('/').skip(1).collect();
                    Some(json!({ "id": id, "subpage": subpage }))
                })
                .collect()
        })
        .unwrap_or_default();
    Ok(Json(json!({ "paths": paths })))
}

async fn registry_listing(state: &AppState) -> Result<Json<Value>, (StatusCode, String)> {
    let records = state
        .extensions
        .list_extensions()
        .await
        .map_err(storage_failure)?;
    let paths: Vec<Value> = records
        .into_iter()
        .map(|record| {
            json!({
                "id": record.id,
                "description": record.description,
                "state": record.state.as_str(),
                "featured": record.featured,
                "entry": record.entry.unwrap_or_default(),
            })
        })
        .collect();
    Ok(Json(json!({ "paths": paths })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    use bramble_core::extension::{ExtensionRecord, ExtensionState};

    use crate::config::Config;
    use crate::state::test_support::TestApp;

    fn app_for(server: &MockServer) -> TestApp {
        TestApp::with_config(Config {
            graph_api_url: server.base_url(),
            ..Config::default()
        })
    }

    async fn mock_home_graph(server: &MockServer, result: Value) {
        let peer = server.url("/peer/q");
        server
            .mock_async(move |when, then| {
                when.method(POST).path("/api/graph/bramble/q");
                then.status(307).header("location", &peer);
            })
            .await;
        server
            .mock_async(move |when, then| {
                when.method(POST).path("/peer/q");
                then.status(200).json_body(json!({ "result": result }));
            })
            .await;
    }

    fn query(id: Option<&str>, sub: Option<&str>) -> Query<RequestPathQuery> {
        Query(RequestPathQuery {
            id: id.map(str::to_string),
            sub: sub.map(str::to_string),
        })
    }

    #[tokio::test]
    async fn renders_an_extensions_documentation() {
        let server = MockServer::start_async().await;
        mock_home_graph(
            &server,
            json!([[{
                "node/title": "github-sync",
                "block/children": [{
                    "block/string": "Documentation",
                    "block/order": 0,
                    "block/uid": "docsparent",
                    "block/children": [{
                        "block/string": "Use it well",
                        "block/order": 0,
                        "block/uid": "abcdefghi"
                    }]
                }]
            }]]),
        )
        .await;
        let app = app_for(&server);
        app.repository
            .insert_extension(ExtensionRecord {
                id: "github-sync".to_string(),
                description: "Sync your graph with GitHub".to_string(),
                state: ExtensionState::Live,
                entry: Some("https://bramble.garden/github-sync/main.js".to_string()),
                ..Default::default()
            })
            .await;

        let body = get_request_path(State(app.state.clone()), query(Some("github-sync"), None))
            .await
            .unwrap();
        assert_eq!(
            body.0,
            json!({
                "content": "- <Block id={\"abcdefghi\"}>Use it well</Block>\n\n",
                "state": "LIVE",
                "description": "Sync your graph with GitHub",
                "entry": "https://bramble.garden/github-sync/main.js",
                "downloadUrl": ""
            })
        );
    }

    #[tokio::test]
    async fn subpages_render_their_blocks_directly() {
        let server = MockServer::start_async().await;
        mock_home_graph(
            &server,
            json!([[{
                "node/title": "github-sync/usage",
                "block/children": [{
                    "block/string": "Advanced usage",
                    "block/order": 0,
                    "block/uid": "advuse1234"
                }]
            }]]),
        )
        .await;
        let app = app_for(&server);
        app.repository
            .insert_extension(ExtensionRecord {
                id: "github-sync".to_string(),
                ..Default::default()
            })
            .await;

        let body = get_request_path(
            State(app.state.clone()),
            query(Some("github-sync/usage"), None),
        )
        .await
        .unwrap();
        assert_eq!(
            body.0["content"],
            json!("- <Block id={\"advuse1234\"}>Advanced usage</Block>\n\n")
        );
        assert_eq!(body.0["state"], json!("PRIVATE"));
    }

    #[tokio::test]
    async fn unknown_extensions_are_not_found() {
        let server = MockServer::start_async().await;
        let app = app_for(&server);

        let error = get_request_path(State(app.state.clone()), query(Some("ghost"), None))
            .await
            .unwrap_err();
        assert_eq!(
            error,
            (StatusCode::NOT_FOUND, "No extension ghost found".to_string())
        );
    }

    #[tokio::test]
    async fn lists_documented_subpages() {
        let server = MockServer::start_async().await;
        mock_home_graph(
            &server,
            json!([
                [{ "node/title": "github-sync" }, { "node/title": "github-sync/usage" }],
                [{ "node/title": "github-sync" }, { "node/title": "github-sync-pro" }],
                [{ "node/title": "smart-blocks" }, { "node/title": "smart-blocks/commands/logic" }]
            ]),
        )
        .await;
        let app = app_for(&server);

        let body = get_request_path(State(app.state.clone()), query(None, Some("true")))
            .await
            .unwrap();
        assert_eq!(
            body.0,
            json!({
                "paths": [
                    { "id": "github-sync", "subpage": ["usage"] },
                    { "id": "smart-blocks", "subpage": ["commands", "logic"] }
                ]
            })
        );
    }

    #[tokio::test]
    async fn lists_the_registry_by_default() {
        let server = MockServer::start_async().await;
        let app = app_for(&server);
        app.repository
            .insert_extension(ExtensionRecord {
                id: "beta-ext".to_string(),
                description: "Still cooking".to_string(),
                ..Default::default()
            })
            .await;
        app.repository
            .insert_extension(ExtensionRecord {
                id: "alpha-ext".to_string(),
                description: "Ready to go".to_string(),
                state: ExtensionState::Live,
                entry: Some("https://bramble.garden/alpha-ext/main.js".to_string()),
                featured: 2,
                ..Default::default()
            })
            .await;

        let body = get_request_path(State(app.state.clone()), query(None, None))
            .await
            .unwrap();
        assert_eq!(
            body.0,
            json!({
                "paths": [
                    {
                        "id": "alpha-ext",
                        "description": "Ready to go",
                        "state": "LIVE",
                        "featured": 2,
                        "entry": "https://bramble.garden/alpha-ext/main.js"
                    },
                    {
                        "id": "beta-ext",
                        "description": "Still cooking",
                        "state": "PRIVATE",
                        "featured": 0,
                        "entry": ""
                    }
                ]
            })
        );
    }

    #[tokio::test]
    async fn an_empty_id_falls_back_to_the_listing() {
        let server = MockServer::start_async().await;
        let app = app_for(&server);

        let body = get_request_path(State(app.state.clone()), query(Some(""), None))
            .await
            .unwrap();
        assert_eq!(body.0, json!({ "paths": [] }));
    }
}
