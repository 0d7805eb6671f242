//! In-memory storage backend for development and testing.
//!
//! This module provides an in-memory implementation of the store traits
//! that keeps all data in HashMaps wrapped in `Arc<RwLock<_>>`. This is
//! useful for testing and development scenarios where persistence is not
//! required.

mod repository;

pub use repository::{MemoryFileStore, MemoryRepository};
