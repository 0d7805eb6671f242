//! Application state for auth.

use axum::extract::FromRef;
use std::sync::Arc;

use crate::directory::UserDirectory;

/// Shared state for the auth extractors.
#[derive(Clone)]
pub struct AuthState {
    pub directory: Arc<dyn UserDirectory>,
}

impl AuthState {
    pub fn new(directory: Arc<dyn UserDirectory>) -> Self {
        Self { directory }
    }
}

/// Allows AuthState to be extracted from a parent state.
impl<S> FromRef<S> for AuthState
where
    S: AsRef<AuthState>,
{
    fn from_ref(state: &S) -> Self {
        state.as_ref().clone()
    }
}
