use async_trait::async_trait;

use crate::extension::ExtensionRecord;
use crate::handoff::HandoffRecord;

use super::Result;

/// Ownership metadata for a stored object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileHead {
    /// Id of the user the object belongs to, when one was recorded.
    pub owner: Option<String>,
}

/// Repository for parked credential handoffs.
#[async_trait]
pub trait HandoffStore: Send + Sync {
    /// Gets a handoff by its id.
    async fn get_handoff(&self, id: &str) -> Result<Option<HandoffRecord>>;

    /// Writes a handoff, replacing any existing record with the same id.
    async fn put_handoff(&self, record: &HandoffRecord) -> Result<()>;

    /// Deletes a handoff by its id.
    async fn delete_handoff(&self, id: &str) -> Result<()>;
}

/// Repository for the extension registry.
#[async_trait]
pub trait ExtensionStore: Send + Sync {
    /// Gets an extension by its id.
    async fn get_extension(&self, id: &str) -> Result<Option<ExtensionRecord>>;

    /// Lists every registered extension.
    async fn list_extensions(&self) -> Result<Vec<ExtensionRecord>>;
}

/// Object storage for extension files and install markers.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Looks up ownership metadata without fetching the body. `None`
    /// means no such object.
    async fn head_file(&self, key: &str) -> Result<Option<FileHead>>;

    /// Reads an object's body.
    async fn read_file(&self, key: &str) -> Result<String>;

    /// Writes an object owned by `owner` and returns its etag.
    async fn write_file(&self, key: &str, body: &str, owner: &str) -> Result<String>;

    /// Records an empty marker object.
    async fn touch_marker(&self, key: &str) -> Result<()>;
}
