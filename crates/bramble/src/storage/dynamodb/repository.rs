//! DynamoDB store implementation.
//!
//! Implements the store traits from `bramble_core::storage` on top of the
//! handoff and extension registry tables.

use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;

use bramble_core::extension::ExtensionRecord;
use bramble_core::handoff::HandoffRecord;
use bramble_core::storage::{ExtensionStore, HandoffStore, Result};

use super::conversions::{handoff_to_item, item_to_extension, item_to_handoff};
use super::error::{
    map_delete_item_error, map_get_item_error, map_put_item_error, map_scan_error,
};

/// DynamoDB-backed repository.
///
/// Handoffs live in their own table keyed by id. The extension registry
/// is a second table, scanned in full for marketplace listings.
pub struct DynamoRepository {
    client: Client,
    auth_table: String,
    extensions_table: String,
}

impl DynamoRepository {
    /// Creates a new repository over the given client and table names.
    pub fn new(
        client: Client,
        auth_table: impl Into<String>,
        extensions_table: impl Into<String>,
    ) -> Self {
        Self {
            client,
            auth_table: auth_table.into(),
            extensions_table: extensions_table.into(),
        }
    }
}

#[async_trait]
impl HandoffStore for DynamoRepository {
    async fn get_handoff(&self, id: &str) -> Result<Option<HandoffRecord>> {
        let result = self
            .client
            .get_item()
            .table_name(&self.auth_table)
            .key("id", AttributeValue::S(id.to_string()))
            .send()
            .await
            .map_err(map_get_item_error)?;

        match result.item {
            Some(item) => Ok(Some(item_to_handoff(&item)?)),
            None => Ok(None),
        }
    }

    async fn put_handoff(&self, record: &HandoffRecord) -> Result<()> {
        self.client
            .put_item()
            .table_name(&self.auth_table)
            .set_item(Some(handoff_to_item(record)))
            .send()
            .await
            .map_err(map_put_item_error)?;

        Ok(())
    }

    async fn delete_handoff(&self, id: &str) -> Result<()> {
        self.client
            .delete_item()
            .table_name(&self.auth_table)
            .key("id", AttributeValue::S(id.to_string()))
            .send()
            .await
            .map_err(map_delete_item_error)?;

        Ok(())
    }
}

#[async_trait]
impl ExtensionStore for DynamoRepository {
    async fn get_extension(&self, id: &str) -> Result<Option<ExtensionRecord>> {
        let result = self
            .client
            .get_item()
            .table_name(&self.extensions_table)
            .key("id", AttributeValue::S(id.to_string()))
            .send()
            .await
            .map_err(map_get_item_error)?;

        match result.item {
            Some(item) => Ok(Some(item_to_extension(&item)?)),
            None => Ok(None),
        }
    }

    async fn list_extensions(&self) -> Result<Vec<ExtensionRecord>> {
        let mut records = Vec::new();
        let mut start_key = None;

        loop {
            let result = self
                .client
                .scan()
                .table_name(&self.extensions_table)
                .set_exclusive_start_key(start_key)
                .send()
                .await
                .map_err(map_scan_error)?;

            let items = result.items.unwrap_or_default();
            for item in &items {
                records.push(item_to_extension(item)?);
            }

            start_key = result.last_evaluated_key;
            if start_key.is_none() {
                break;
            }
        }

        Ok(records)
    }
}
