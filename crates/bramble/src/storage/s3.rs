//! S3 object store implementation.
//!
//! Extension files live under `{extension}/files/{path}` in the data
//! bucket. Ownership is tracked through a `user` metadata entry on each
//! object so a file can only be replaced by the account that uploaded it.

use async_trait::async_trait;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::operation::head_object::HeadObjectError;
use aws_sdk_s3::Client;

use bramble_core::storage::{FileHead, FileStore, RepositoryError, Result};

/// Metadata key recording which user uploaded an object.
const OWNER_METADATA_KEY: &str = "user";

/// S3-backed file store.
pub struct S3FileStore {
    client: Client,
    bucket: String,
}

impl S3FileStore {
    /// Creates a new store over the given client and bucket.
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl FileStore for S3FileStore {
    async fn head_file(&self, key: &str) -> Result<Option<FileHead>> {
        let result = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        match result {
            Ok(output) => {
                let owner = output
                    .metadata
                    .as_ref()
                    .and_then(|metadata| metadata.get(OWNER_METADATA_KEY))
                    .cloned();
                Ok(Some(FileHead { owner }))
            }
            Err(err) => match err.into_service_error() {
                HeadObjectError::NotFound(_) => Ok(None),
                err => Err(RepositoryError::QueryFailed(format!(
                    "HeadObject failed: {:?}",
                    err
                ))),
            },
        }
    }

    async fn read_file(&self, key: &str) -> Result<String> {
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        let output = match result {
            Ok(output) => output,
            Err(err) => match err.into_service_error() {
                GetObjectError::NoSuchKey(_) => {
                    return Err(RepositoryError::NotFound {
                        entity_type: "File",
                        id: key.to_string(),
                    })
                }
                err => {
                    return Err(RepositoryError::QueryFailed(format!(
                        "GetObject failed: {:?}",
                        err
                    )))
                }
            },
        };

        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| RepositoryError::QueryFailed(format!("Reading object body failed: {}", e)))?
            .into_bytes();

        String::from_utf8(bytes.to_vec()).map_err(|e| {
            RepositoryError::InvalidData(format!("Object {} is not valid UTF-8: {}", key, e))
        })
    }

    async fn write_file(&self, key: &str, body: &str, owner: &str) -> Result<String> {
        let result = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(Vec::from(body).into())
            .metadata(OWNER_METADATA_KEY, owner)
            .send()
            .await
            .map_err(|e| {
                RepositoryError::QueryFailed(format!(
                    "PutObject failed: {:?}",
                    e.into_service_error()
                ))
            })?;

        Ok(result.e_tag.unwrap_or_default())
    }

    async fn touch_marker(&self, key: &str) -> Result<()> {
        // Markers hold a literal "null" body; only their existence matters.
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(Vec::from("null").into())
            .content_type("text/plain")
            .send()
            .await
            .map_err(|e| {
                RepositoryError::QueryFailed(format!(
                    "PutObject failed: {:?}",
                    e.into_service_error()
                ))
            })?;

        Ok(())
    }
}
