use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::warn;

use crate::{
    auth::{jwt::JwtKeys, repo::User},
    error::ApiError,
    state::AppState,
};

const INVALID_CREDENTIALS: &str = "Could not validate credentials";

fn unauthorized() -> ApiError {
    ApiError::Unauthorized(INVALID_CREDENTIALS.into())
}

/// Validates the bearer token and yields its subject (the username).
pub struct AuthUser(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        let auth = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(unauthorized)?;

        // Expect "Bearer <token>"
        let token = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            .ok_or_else(unauthorized)?;

        match keys.validate(token.trim()) {
            Ok(subject) => Ok(AuthUser(subject)),
            Err(e) => {
                warn!(error = %e, "bearer token rejected");
                Err(unauthorized())
            }
        }
    }
}

/// The stored user named by a valid bearer token.
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(username) = AuthUser::from_request_parts(parts, state).await?;
        match state.users.find_by_username(&username).await? {
            Some(user) => Ok(CurrentUser(user)),
            None => {
                warn!(%username, "token subject has no user record");
                Err(unauthorized())
            }
        }
    }
}
