mod error;
mod http_mapping;
mod keys;
mod traits;

pub use error::{RepositoryError, Result};
pub use http_mapping::repository_error_to_status_code;
pub use keys::{file_key, graph_key};
pub use traits::{ExtensionStore, FileHead, FileStore, HandoffStore};
