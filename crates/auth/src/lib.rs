//! Identity for bramble.
//!
//! This crate provides:
//! - A thin client for the Clerk backend API
//! - Token authentication against user metadata, covering both
//!   current and legacy token formats
//! - Axum extractors for authenticated extension and developer calls

mod clerk;
mod directory;
mod error;
mod extractors;
mod state;

#[cfg(feature = "mock")]
mod mock;

pub use clerk::{ClerkClient, ClerkUser, EmailAddress};
pub use directory::{ClerkDirectory, FailureAlerts, UserDirectory};
pub use error::AuthError;
pub use extractors::{DeveloperUser, ExtensionUser, DEV_HEADER};
#[cfg(feature = "mock")]
pub use mock::MockDirectory;
pub use state::AuthState;
