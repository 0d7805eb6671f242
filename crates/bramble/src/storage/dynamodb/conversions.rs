//! DynamoDB attribute conversion functions.
//!
//! Pure functions for converting between DynamoDB AttributeValue maps and
//! domain types. These are testable in isolation without DynamoDB access.

use std::collections::HashMap;

use aws_sdk_dynamodb::types::AttributeValue;
use bramble_core::extension::{ExtensionRecord, ExtensionState};
use bramble_core::handoff::HandoffRecord;
use bramble_core::storage::RepositoryError;
use chrono::{DateTime, Utc};

// ============================================================================
// Handoff conversions
// ============================================================================

/// Convert a HandoffRecord to a DynamoDB item.
pub fn handoff_to_item(record: &HandoffRecord) -> HashMap<String, AttributeValue> {
    let mut item = HashMap::new();

    item.insert("id".to_string(), AttributeValue::S(record.id.clone()));
    item.insert("auth".to_string(), AttributeValue::S(record.auth.clone()));
    item.insert(
        "date".to_string(),
        AttributeValue::S(record.date.to_rfc3339()),
    );

    item
}

/// Convert a DynamoDB item to a HandoffRecord.
pub fn item_to_handoff(
    item: &HashMap<String, AttributeValue>,
) -> Result<HandoffRecord, RepositoryError> {
    Ok(HandoffRecord {
        id: get_string(item, "id")?,
        auth: get_string(item, "auth")?,
        date: get_datetime(item, "date")?,
    })
}

// ============================================================================
// Extension conversions
// ============================================================================

/// Convert a DynamoDB item to an ExtensionRecord.
///
/// Registry rows are written by the publish pipeline and older rows miss
/// columns that were added later, so everything except the id is lenient.
pub fn item_to_extension(
    item: &HashMap<String, AttributeValue>,
) -> Result<ExtensionRecord, RepositoryError> {
    Ok(ExtensionRecord {
        id: get_string(item, "id")?,
        description: get_optional_string(item, "description").unwrap_or_default(),
        state: get_optional_string(item, "state")
            .map(|s| ExtensionState::parse(&s))
            .unwrap_or_default(),
        entry: get_optional_string(item, "entry"),
        download: get_optional_string(item, "download"),
        featured: get_number_or_zero(item, "featured"),
        premium: get_optional_string(item, "premium"),
        dev_premium: get_optional_string(item, "devPremium"),
    })
}

// ============================================================================
// Helper functions
// ============================================================================

/// Get a required string attribute.
fn get_string(
    item: &HashMap<String, AttributeValue>,
    key: &str,
) -> Result<String, RepositoryError> {
    item.get(key)
        .and_then(|v| v.as_s().ok())
        .map(|s| s.to_string())
        .ok_or_else(|| RepositoryError::InvalidData(format!("Missing or invalid field: {}", key)))
}

/// Get an optional string attribute.
fn get_optional_string(item: &HashMap<String, AttributeValue>, key: &str) -> Option<String> {
    item.get(key)
        .and_then(|v| v.as_s().ok())
        .map(|s| s.to_string())
}

/// Get a numeric attribute, treating a missing or malformed value as zero.
fn get_number_or_zero(item: &HashMap<String, AttributeValue>, key: &str) -> i64 {
    item.get(key)
        .and_then(|v| v.as_n().ok())
        .and_then(|s| s.parse().ok())
        .unwrap_or(0)
}

/// Get a required datetime attribute (RFC 3339 format).
fn get_datetime(
    item: &HashMap<String, AttributeValue>,
    key: &str,
) -> Result<DateTime<Utc>, RepositoryError> {
    let s = get_string(item, key)?;
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::InvalidData(format!("Invalid datetime {}: {}", key, e)))
}
