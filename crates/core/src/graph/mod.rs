mod error;
mod markdown;
mod resolve;
mod types;

pub use error::GraphError;
pub use markdown::render_page;
pub use resolve::{BlockSource, ContentResolver, PageContent};
pub use types::{normalize_keys, PullBlock, TextAlign, TreeNode, ViewType};
