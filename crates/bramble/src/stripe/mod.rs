//! Stripe integration for extension subscriptions.
//!
//! Stripe handles:
//! - Premium extension subscriptions via Checkout
//! - Usage metering for metered prices
//! - Card management for customer accounts
//! - Express accounts for extension developer payouts

mod client;
mod types;
mod webhook;

pub use client::{StripeClient, StripeError, SubscriptionCheckout, PROJECT_TAG};
pub use types::*;
pub use webhook::verify_signature;
