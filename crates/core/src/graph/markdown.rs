//! Block tree to Markdown rendering for the documentation site.
//!
//! The output is MDX-flavored: each block is wrapped in a `<Block>`
//! element carrying its uid so the site can deep link to it, and a
//! handful of inline widgets (`{{video: ...}}`, `^^highlight^^`) are
//! rewritten into components.

use std::sync::LazyLock;

use regex::Regex;

use super::{TextAlign, TreeNode, ViewType};

static LOOM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{(?:\[\[)?video(?:\]\])?:(?:\s)*https://www\.loom\.com/share/([0-9a-f]*)\}\}")
        .unwrap()
});
static YOUTUBE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\{\{(?:\[\[)?(?:youtube|video)(?:\]\])?:(?:\s)*https://(?:youtu\.be/([\w-]*)|(?:www\.)youtube\.com/watch\?v=([\w-]+)[^}]+)\}\}",
    )
    .unwrap()
});
static DEMO_VIDEO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{(?:\[\[)?video(?:\]\])?:(?:\s)*(\S+)(?:\s)*\}\}").unwrap());
static HIGHLIGHT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\^\^(.*?)\^\^").unwrap());

/// Wiki link rewrites are scoped to one extension's namespace, so the
/// two link patterns carry the page path baked in.
struct PagePatterns {
    subpage_link: Regex,
    page_link: Regex,
    path: String,
}

impl PagePatterns {
    fn new(path: &str) -> Self {
        let escaped = regex::escape(path);
        Self {
            subpage_link: Regex::new(&format!(r"\[(.*?)\]\(\[\[{escaped}/(.*?)\]\]\)")).unwrap(),
            page_link: Regex::new(&format!(r"\[(.*?)\]\(\[\[{escaped}\]\]\)")).unwrap(),
            path: path.to_string(),
        }
    }
}

fn substitute_components(text: &str, prefix: &str, patterns: &PagePatterns) -> String {
    let text = LOOM.replace_all(text, |caps: &regex::Captures| {
        format!("<Loom id={{\"{}\"}} />", &caps[1])
    });
    let text = YOUTUBE.replace_all(&text, |caps: &regex::Captures| {
        let id = caps
            .get(1)
            .or(caps.get(2))
            .map(|m| m.as_str())
            .unwrap_or_default();
        format!("<YouTube id={{\"{id}\"}} />")
    });
    let text = DEMO_VIDEO.replace_all(&text, |caps: &regex::Captures| {
        format!("<DemoVideo src={{\"{}\"}} />", &caps[1])
    });
    let text = patterns
        .subpage_link
        .replace_all(&text, |caps: &regex::Captures| {
            format!(
                "[{}](/extensions/{}/{})",
                &caps[1],
                patterns.path,
                caps[2].replace(' ', "_").to_lowercase()
            )
        });
    let text = patterns
        .page_link
        .replace_all(&text, |caps: &regex::Captures| {
            format!("[{}](/extensions/{})", &caps[1], patterns.path)
        });
    let text = HIGHLIGHT.replace_all(&text, "<Highlight>${1}</Highlight>");
    let text = text.replace("__", "_").replace('\u{a0}', " ");
    // A block ending in a code fence needs the fence on its own line.
    let text = match text.strip_suffix("```") {
        Some(head) => format!("{head}\n```"),
        None => text,
    };
    text.replace('\n', &format!("\n{}", " ".repeat(prefix.len())))
}

fn render_block(
    block: &TreeNode,
    view_type: ViewType,
    depth: usize,
    patterns: &PagePatterns,
) -> String {
    let prefix = format!("{}{}", " ".repeat(depth * 4), view_type.prefix());
    let hang = " ".repeat(prefix.len());
    let multiline = block.text.contains('\n');

    let mut out = String::new();
    out.push_str(&prefix);
    out.push_str(&format!("<Block id={{\"{}\"}}>", block.uid));
    out.push_str(&"#".repeat(block.heading as usize));
    if block.heading > 0 {
        out.push(' ');
    }
    if block.text_align == TextAlign::Center {
        out.push_str("<Center>");
    }
    if multiline {
        out.push_str("\n\n");
        out.push_str(&hang);
    }
    out.push_str(&substitute_components(&block.text, &prefix, patterns));
    if multiline {
        out.push_str("\n\n");
        out.push_str(&hang);
    }
    if block.text_align == TextAlign::Center {
        out.push_str("</Center>");
    }
    out.push_str("</Block>\n\n");

    // Document children stay at the same indent level; other view
    // types indent one step per generation.
    let child_depth = if view_type == ViewType::Document {
        depth
    } else {
        depth + 1
    };
    for child in &block.children {
        out.push_str(&render_block(child, block.view_type, child_depth, patterns));
    }
    if view_type == ViewType::Document && !block.children.is_empty() {
        out.push('\n');
    }
    out
}

/// Render documentation blocks as Markdown. `path` is the extension id
/// hosting the page; wiki links into its namespace become
/// site-relative links.
pub fn render_page(blocks: &[TreeNode], view_type: ViewType, path: &str) -> String {
    let patterns = PagePatterns::new(path);
    blocks
        .iter()
        .map(|block| render_block(block, view_type, 0, &patterns))
        .collect()
}
