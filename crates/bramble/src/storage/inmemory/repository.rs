//! In-memory store implementations.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

use bramble_core::extension::ExtensionRecord;
use bramble_core::handoff::HandoffRecord;
use bramble_core::storage::{
    ExtensionStore, FileHead, FileStore, HandoffStore, RepositoryError, Result,
};

/// In-memory repository implementation.
///
/// Uses HashMaps wrapped in `Arc<RwLock<_>>` for thread-safe access.
/// Data is not persisted between restarts, so this backend is only
/// suitable for development and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryRepository {
    handoffs: Arc<RwLock<HashMap<String, HandoffRecord>>>,
    extensions: Arc<RwLock<HashMap<String, ExtensionRecord>>>,
}

impl MemoryRepository {
    /// Creates a new empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an extension into the registry.
    pub async fn insert_extension(&self, record: ExtensionRecord) {
        let mut extensions = self.extensions.write().await;
        extensions.insert(record.id.clone(), record);
    }
}

#[async_trait]
impl HandoffStore for MemoryRepository {
    async fn get_handoff(&self, id: &str) -> Result<Option<HandoffRecord>> {
        let handoffs = self.handoffs.read().await;
        Ok(handoffs.get(id).cloned())
    }

    async fn put_handoff(&self, record: &HandoffRecord) -> Result<()> {
        let mut handoffs = self.handoffs.write().await;
        handoffs.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn delete_handoff(&self, id: &str) -> Result<()> {
        let mut handoffs = self.handoffs.write().await;
        handoffs.remove(id);
        Ok(())
    }
}

#[async_trait]
impl ExtensionStore for MemoryRepository {
    async fn get_extension(&self, id: &str) -> Result<Option<ExtensionRecord>> {
        let extensions = self.extensions.read().await;
        Ok(extensions.get(id).cloned())
    }

    async fn list_extensions(&self) -> Result<Vec<ExtensionRecord>> {
        let extensions = self.extensions.read().await;
        // HashMap order is random; keep listings stable.
        let mut records: Vec<ExtensionRecord> = extensions.values().cloned().collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(records)
    }
}

/// A stored object with its ownership metadata.
#[derive(Debug, Clone)]
struct StoredObject {
    body: String,
    owner: Option<String>,
}

/// In-memory object store.
///
/// Keys follow the same `{extension}/files/{path}` layout the S3 backend
/// uses, so handler tests exercise real key composition. Etags are a
/// content hash, quoted the way S3 returns them.
#[derive(Debug, Clone, Default)]
pub struct MemoryFileStore {
    objects: Arc<RwLock<HashMap<String, StoredObject>>>,
}

impl MemoryFileStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an object directly, optionally without an owner. Objects
    /// uploaded outside the API carry no ownership metadata.
    pub async fn insert_object(&self, key: &str, body: &str, owner: Option<&str>) {
        let mut objects = self.objects.write().await;
        objects.insert(
            key.to_string(),
            StoredObject {
                body: body.to_string(),
                owner: owner.map(|o| o.to_string()),
            },
        );
    }
}

fn etag_for(body: &str) -> String {
    let digest = Sha256::digest(body.as_bytes());
    format!("\"{}\"", hex::encode(&digest[..16]))
}

#[async_trait]
impl FileStore for MemoryFileStore {
    async fn head_file(&self, key: &str) -> Result<Option<FileHead>> {
        let objects = self.objects.read().await;
        Ok(objects.get(key).map(|object| FileHead {
            owner: object.owner.clone(),
        }))
    }

    async fn read_file(&self, key: &str) -> Result<String> {
        let objects = self.objects.read().await;
        objects
            .get(key)
            .map(|object| object.body.clone())
            .ok_or_else(|| RepositoryError::NotFound {
                entity_type: "File",
                id: key.to_string(),
            })
    }

    async fn write_file(&self, key: &str, body: &str, owner: &str) -> Result<String> {
        let mut objects = self.objects.write().await;
        objects.insert(
            key.to_string(),
            StoredObject {
                body: body.to_string(),
                owner: Some(owner.to_string()),
            },
        );
        Ok(etag_for(body))
    }

    async fn touch_marker(&self, key: &str) -> Result<()> {
        let mut objects = self.objects.write().await;
        // Markers hold a literal "null" body, matching what the bucket stores.
        objects.insert(
            key.to_string(),
            StoredObject {
                body: "null".to_string(),
                owner: None,
            },
        );
        Ok(())
    }
}
