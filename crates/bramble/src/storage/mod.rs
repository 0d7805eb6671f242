//! Storage backend implementations.
//!
//! This module provides concrete implementations of the store traits
//! defined in `bramble_core::storage`. The implementations are selected
//! at compile time via feature flags.
//!
//! # Feature Flags
//!
//! - `inmemory` (default): HashMap-backed stores for development and tests
//! - `aws`: DynamoDB tables for handoffs and the extension registry plus
//!   an S3 bucket for extension files
//!
//! These features are mutually exclusive - only one storage backend can be
//! enabled at a time.
//!
//! # Examples
//!
//! Build with the in-memory backend (default):
//! ```bash
//! cargo build -p bramble
//! ```
//!
//! Build with AWS storage:
//! ```bash
//! cargo build -p bramble --no-default-features --features aws
//! ```

// Compile-time checks for mutual exclusivity
#[cfg(all(feature = "inmemory", feature = "aws"))]
compile_error!(
    "Features 'inmemory' and 'aws' are mutually exclusive. \
    Enable only one storage backend at a time."
);

#[cfg(not(any(feature = "inmemory", feature = "aws")))]
compile_error!(
    "No storage backend selected. Enable 'inmemory' or 'aws' feature. \
    Example: cargo build -p bramble --features inmemory"
);

#[cfg(feature = "inmemory")]
pub mod inmemory;

#[cfg(feature = "aws")]
pub mod dynamodb;

#[cfg(feature = "aws")]
pub mod s3;

#[cfg(feature = "inmemory")]
pub use inmemory::{MemoryFileStore, MemoryRepository};

#[cfg(feature = "aws")]
pub use dynamodb::DynamoRepository;

#[cfg(feature = "aws")]
pub use s3::S3FileStore;
