//! Block reference resolution.
//!
//! Documentation pages lean on three kinds of references that only
//! mean something inside the editor: embeds (`{{embed: ((uid))}}`),
//! aliases (`[label](((uid)))`), and bare refs (`((uid))`). Before
//! rendering, embeds are spliced in as real child blocks and the other
//! two become site-relative links, or plain text when they point
//! outside the page being rendered.

use std::future::Future;
use std::pin::Pin;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use super::{GraphError, PullBlock, TextAlign, TreeNode, ViewType};

static BLOCK_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(\(([\w-]{9,10})\)\)").unwrap());
static EMBED_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{(?:\[\[)?embed(?:\]\])?:\s*\(\(([\w-]{9,10})\)\)\s*\}\}").unwrap()
});
static ALIAS_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(.*?)\]\(\(\(([\w-]{9,10})\)\)\)").unwrap());

/// Read access to blocks in the documentation graph.
#[async_trait]
pub trait BlockSource: Send + Sync {
    /// Title of the page containing the given block, or empty when the
    /// block is unknown.
    async fn page_title_of(&self, uid: &str) -> Result<String, GraphError>;

    /// The block's own text, or empty when unknown.
    async fn text_of(&self, uid: &str) -> Result<String, GraphError>;

    /// Pull a page and its full block tree by title.
    async fn pull_page(&self, title: &str) -> Result<Option<PullBlock>, GraphError>;

    /// Pull a block and its full tree by uid.
    async fn pull_block(&self, uid: &str) -> Result<Option<PullBlock>, GraphError>;
}

/// A page's blocks after reference resolution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageContent {
    pub blocks: Vec<TreeNode>,
    pub view_type: ViewType,
    /// Leading segment of the requested id.
    pub path: String,
    /// The root block's own raw text.
    pub text: String,
}

struct Replacement {
    from: usize,
    to: usize,
    value: String,
}

type Resolved<'a, T> = Pin<Box<dyn Future<Output = Result<T, GraphError>> + Send + 'a>>;

/// Walks a page's tree, splicing embeds and rewriting block references
/// into site-relative links.
pub struct ContentResolver<'a> {
    source: &'a dyn BlockSource,
    /// Requested page id. References to pages outside this namespace
    /// degrade to plain text instead of links.
    scope: String,
}

impl<'a> ContentResolver<'a> {
    pub fn new(source: &'a dyn BlockSource, scope: &str) -> Self {
        Self {
            source,
            scope: scope.to_string(),
        }
    }

    fn is_external(&self, title: &str) -> bool {
        title != self.scope && !title.starts_with(&format!("{}/", self.scope))
    }

    /// Resolve a page by title into render-ready blocks.
    pub async fn content_tree(&self, id: &str) -> Result<PageContent, GraphError> {
        self.content_blocks(id, false).await
    }

    async fn content_blocks(&self, id: &str, by_uid: bool) -> Result<PageContent, GraphError> {
        let root = if by_uid {
            self.source.pull_block(id).await?
        } else {
            self.source.pull_page(id).await?
        };
        let path = id.split('/').next().unwrap_or(id).to_string();
        let Some(root) = root else {
            return Ok(PageContent {
                path,
                ..Default::default()
            });
        };
        let view_type = root
            .view_type
            .as_deref()
            .map(ViewType::parse)
            .unwrap_or_default();
        let mut raw_children = root.children.unwrap_or_default();
        raw_children.sort_by_key(|child| child.order.unwrap_or(0));
        let mut blocks = Vec::with_capacity(raw_children.len());
        for child in raw_children {
            blocks.push(self.format_node(child, view_type).await?);
        }
        let text = root.string.or(root.title).unwrap_or_default();
        Ok(PageContent {
            blocks,
            view_type,
            path,
            text,
        })
    }

    /// Turn one pulled block into a [`TreeNode`], resolving references
    /// in its text. The view type is inherited from the parent unless
    /// the block sets its own.
    fn format_node(&self, block: PullBlock, inherited: ViewType) -> Resolved<'_, TreeNode> {
        Box::pin(async move {
            let view_type = block
                .view_type
                .as_deref()
                .map(ViewType::parse)
                .unwrap_or(inherited);
            let mut raw_children = block.children.unwrap_or_default();
            raw_children.sort_by_key(|child| child.order.unwrap_or(0));
            let mut children = Vec::with_capacity(raw_children.len());
            for child in raw_children {
                children.push(self.format_node(child, view_type).await?);
            }
            let raw_text = block.string.or(block.title).unwrap_or_default();
            let text = self.resolve_text(&raw_text, &mut children).await?;
            Ok(TreeNode {
                text,
                uid: block.uid.unwrap_or_default(),
                order: block.order.unwrap_or(0),
                heading: block.heading.and_then(|h| u8::try_from(h).ok()).unwrap_or(0),
                open: block.open.unwrap_or(true),
                view_type,
                text_align: block
                    .text_align
                    .as_deref()
                    .map(TextAlign::parse)
                    .unwrap_or_default(),
                edit_time: block.edit_time.unwrap_or(0),
                children,
            })
        })
    }

    /// Resolve references in a block's text. Embedded blocks are
    /// appended to `children` so they render as part of this block.
    fn resolve_text<'s>(
        &'s self,
        text: &'s str,
        children: &'s mut Vec<TreeNode>,
    ) -> Resolved<'s, String> {
        Box::pin(async move {
            let mut replacements: Vec<Replacement> = Vec::new();
            for caps in EMBED_REF.captures_iter(text) {
                let Some(whole) = caps.get(0) else { continue };
                let embedded = self.content_blocks(&caps[1], true).await?;
                children.extend(embedded.blocks);
                let value = self.resolve_text(&embedded.text, &mut *children).await?;
                replacements.push(Replacement {
                    from: whole.start(),
                    to: whole.end(),
                    value,
                });
            }
            for caps in ALIAS_REF.captures_iter(text) {
                let Some(whole) = caps.get(0) else { continue };
                let (label, uid) = (&caps[1], &caps[2]);
                let page = self.source.page_title_of(uid).await?;
                let value = if self.is_external(&page) {
                    label.to_string()
                } else {
                    format!("[{label}](/extensions/{page}#{uid})")
                };
                replacements.push(Replacement {
                    from: whole.start(),
                    to: whole.end(),
                    value,
                });
            }
            for caps in BLOCK_REF.captures_iter(text) {
                let Some(whole) = caps.get(0) else { continue };
                // Refs already covered by an embed or alias match are
                // trailed by `}` or `)`; leave those alone.
                if matches!(text.as_bytes().get(whole.end()), Some(b'}') | Some(b')')) {
                    continue;
                }
                let uid = caps[1].to_string();
                let reference = self.source.text_of(&uid).await?;
                let title = self.source.page_title_of(&uid).await?;
                let page = title.replace(' ', "_").to_lowercase();
                let value = if self.is_external(&page) {
                    if reference.is_empty() {
                        whole.as_str().to_string()
                    } else {
                        reference
                    }
                } else {
                    format!("[{reference}](/extensions/{page}#{uid})")
                };
                replacements.push(Replacement {
                    from: whole.start(),
                    to: whole.end(),
                    value,
                });
            }

            replacements.sort_by(|a, b| b.from.cmp(&a.from));
            let mut resolved = text.to_string();
            for rep in &replacements {
                // Overlapping matches can leave a stale range behind.
                if !resolved.is_char_boundary(rep.from) || !resolved.is_char_boundary(rep.to) {
                    continue;
                }
                resolved.replace_range(rep.from..rep.to, &rep.value);
            }
            Ok(resolved)
        })
    }
}
