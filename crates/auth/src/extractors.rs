//! Axum extractors for authentication.

use axum::{
    extract::{FromRef, FromRequestParts, Query},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
};
use std::collections::HashMap;

use crate::clerk::ClerkUser;
use crate::AuthState;

/// Header that routes a request at the dev identity instance.
pub const DEV_HEADER: &str = "x-bramble-dev";

/// Extractor for a user authenticated by extension token. The service
/// whose token field is checked comes from the `service` query
/// parameter. Returns 401 if the token does not match any user.
pub struct ExtensionUser {
    pub user: ClerkUser,
    pub service: String,
    pub dev: bool,
}

/// Extractor for a user authenticated against the `developer` service.
/// Returns 401 if the token does not match any user.
pub struct DeveloperUser {
    pub user: ClerkUser,
    pub dev: bool,
}

fn dev_header(parts: &Parts) -> bool {
    parts.headers.contains_key(DEV_HEADER)
}

fn authorization(parts: &Parts) -> Option<&str> {
    parts.headers.get(AUTHORIZATION)?.to_str().ok()
}

/// Tokens never get logged whole.
fn token_tail(token: &str) -> &str {
    &token[token.len().saturating_sub(5)..]
}

async fn extension_user<S>(
    parts: &mut Parts,
    state: &S,
    service: String,
) -> Result<ExtensionUser, (StatusCode, &'static str)>
where
    AuthState: FromRef<S>,
    S: Send + Sync,
{
    let auth_state = AuthState::from_ref(state);
    let dev = dev_header(parts);
    let Some(token) = authorization(parts).filter(|token| !token.is_empty()) else {
        return Err((StatusCode::UNAUTHORIZED, "Invalid token"));
    };

    let user = auth_state
        .directory
        .find_by_extension_token(token, &service, dev)
        .await
        .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "User lookup failed"))?;
    let Some(user) = user else {
        tracing::warn!(
            "Failed to authenticate user with token ending in {}",
            token_tail(token)
        );
        return Err((StatusCode::UNAUTHORIZED, "Invalid token"));
    };

    // Record first use of the token without delaying the request.
    if !user.is_authenticated_for(&service) {
        let directory = auth_state.directory.clone();
        let user = user.clone();
        let service = service.clone();
        tokio::spawn(async move {
            if let Err(error) = directory.mark_authenticated(&user, &service, dev).await {
                tracing::warn!("Failed to record authentication: {}", error);
            }
        });
    }

    Ok(ExtensionUser { user, service, dev })
}

impl<S> FromRequestParts<S> for ExtensionUser
where
    AuthState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let service = Query::<HashMap<String, String>>::try_from_uri(&parts.uri)
            .ok()
            .and_then(|Query(mut params)| params.remove("service"))
            .unwrap_or_default();
        extension_user(parts, state, service).await
    }
}

impl<S> FromRequestParts<S> for DeveloperUser
where
    AuthState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let ExtensionUser { user, dev, .. } =
            extension_user(parts, state, "developer".to_string()).await?;
        Ok(DeveloperUser { user, dev })
    }
}
