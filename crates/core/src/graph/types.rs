use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How a block renders its children.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewType {
    #[default]
    Bullet,
    Document,
    Numbered,
}

impl ViewType {
    /// Marker written before a block's own text when rendering.
    pub fn prefix(&self) -> &'static str {
        match self {
            ViewType::Bullet => "- ",
            ViewType::Document => "",
            ViewType::Numbered => "1. ",
        }
    }

    /// Parse an upstream value, which arrives as a keyword like
    /// `:document`. Unknown values fall back to `Bullet`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim_start_matches(':') {
            "document" => ViewType::Document,
            "numbered" => ViewType::Numbered,
            _ => ViewType::Bullet,
        }
    }
}

/// Horizontal alignment of a block's text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
    Justify,
}

impl TextAlign {
    pub fn parse(raw: &str) -> Self {
        match raw.trim_start_matches(':') {
            "center" => TextAlign::Center,
            "right" => TextAlign::Right,
            "justify" => TextAlign::Justify,
            _ => TextAlign::Left,
        }
    }
}

/// One entity from an upstream pull, keyed the way the graph API keys
/// things. Only the attributes the renderer cares about are kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PullBlock {
    #[serde(rename = ":block/string", skip_serializing_if = "Option::is_none")]
    pub string: Option<String>,
    #[serde(rename = ":node/title", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = ":block/uid", skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(rename = ":block/order", skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
    #[serde(rename = ":block/heading", skip_serializing_if = "Option::is_none")]
    pub heading: Option<i64>,
    #[serde(rename = ":block/open", skip_serializing_if = "Option::is_none")]
    pub open: Option<bool>,
    #[serde(rename = ":children/view-type", skip_serializing_if = "Option::is_none")]
    pub view_type: Option<String>,
    #[serde(rename = ":block/text-align", skip_serializing_if = "Option::is_none")]
    pub text_align: Option<String>,
    #[serde(rename = ":edit/time", skip_serializing_if = "Option::is_none")]
    pub edit_time: Option<i64>,
    #[serde(rename = ":block/children", skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<PullBlock>>,
}

/// A block with its references resolved, ready for rendering.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TreeNode {
    pub text: String,
    pub uid: String,
    pub order: i64,
    pub heading: u8,
    pub open: bool,
    pub view_type: ViewType,
    pub text_align: TextAlign,
    /// Milliseconds since the epoch of the last edit.
    pub edit_time: i64,
    pub children: Vec<TreeNode>,
}

/// Reattach the leading `:` that JSON transport strips from keyword
/// map keys, recursively. Keys already carrying one are left alone.
pub fn normalize_keys(value: Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.into_iter().map(normalize_keys).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, inner)| {
                    let key = if key.starts_with(':') {
                        key
                    } else {
                        format!(":{key}")
                    };
                    (key, normalize_keys(inner))
                })
                .collect(),
        ),
        other => other,
    }
}
