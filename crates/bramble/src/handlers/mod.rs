//! Request handlers, one module per resource.

pub mod auth;
pub mod common;
pub mod error_report;
pub mod files;
pub mod google_auth;
pub mod graphs;
pub mod payment_methods;
pub mod price;
pub mod query;
pub mod request_path;
pub mod stripe_account;
pub mod subscriptions;
pub mod tokens;
pub mod users;
