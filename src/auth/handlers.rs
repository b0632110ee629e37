use axum::{
    extract::{FromRef, State},
    routing::{get, post},
    Form, Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{PublicUser, RegisterRequest, TokenRequest, TokenResponse},
        extractors::CurrentUser,
        jwt::JwtKeys,
        password::{hash_password, verify_password, verify_unknown_user},
    },
    error::{ApiError, ApiResult},
    state::AppState,
    store::StoreError,
};

pub const TAKEN: &str = "Username or email already taken";
pub const BAD_CREDENTIALS: &str = "Incorrect username or password";

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/token", post(login))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/users/me", get(get_me))
}

fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> ApiResult<Json<PublicUser>> {
    payload.username = payload.username.trim().to_string();
    payload.email = payload.email.trim().to_lowercase();

    if payload.username.is_empty() {
        return Err(ApiError::Validation("Username must not be empty".into()));
    }
    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::Validation("Invalid email".into()));
    }
    if payload.password.is_empty() {
        return Err(ApiError::Validation("Password must not be empty".into()));
    }

    // Friendlier error up front; the unique index still catches races.
    match state
        .users
        .find_by_username_or_email(&payload.username, &payload.email)
        .await
    {
        Ok(None) => {}
        Ok(Some(_)) => {
            warn!(username = %payload.username, email = %payload.email, "username or email taken");
            return Err(ApiError::Conflict(TAKEN.into()));
        }
        Err(e) => {
            error!(error = %e, username = %payload.username, "register lookup failed");
            return Err(e.into());
        }
    }

    let hash = hash_password(&payload.password)?;

    let user = match state
        .users
        .create(&payload.username, &payload.email, &hash)
        .await
    {
        Ok(u) => u,
        Err(StoreError::Duplicate) => {
            warn!(username = %payload.username, "lost registration race on unique index");
            return Err(ApiError::Conflict(TAKEN.into()));
        }
        Err(e) => {
            error!(error = %e, username = %payload.username, "create user failed");
            return Err(e.into());
        }
    };

    info!(user_id = user.id, username = %user.username, "user registered");
    Ok(Json(user.into()))
}

#[instrument(skip(state, form))]
pub async fn login(
    State(state): State<AppState>,
    Form(mut form): Form<TokenRequest>,
) -> ApiResult<Json<TokenResponse>> {
    // Registered usernames are stored trimmed.
    form.username = form.username.trim().to_string();

    let user = match state.users.find_by_username(&form.username).await {
        Ok(u) => u,
        Err(e) => {
            error!(error = %e, username = %form.username, "find_by_username failed");
            return Err(e.into());
        }
    };

    // Same answer for an unknown user and a wrong password.
    let user = match user {
        Some(u) if verify_password(&form.password, &u.hashed_password) => u,
        Some(u) => {
            warn!(user_id = u.id, "login invalid password");
            return Err(ApiError::Unauthorized(BAD_CREDENTIALS.into()));
        }
        None => {
            verify_unknown_user(&form.password);
            warn!(username = %form.username, "login unknown username");
            return Err(ApiError::Unauthorized(BAD_CREDENTIALS.into()));
        }
    };

    let keys = JwtKeys::from_ref(&state);
    let access_token = keys.issue(&user.username)?;

    info!(user_id = user.id, "user logged in");
    Ok(Json(TokenResponse::bearer(access_token)))
}

#[instrument(skip_all)]
pub async fn get_me(CurrentUser(user): CurrentUser) -> Json<PublicUser> {
    Json(user.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::repo::User;

    #[test]
    fn email_validation() {
        assert!(is_valid_email("alice@x.com"));
        assert!(!is_valid_email("alice"));
        assert!(!is_valid_email("alice@x"));
        assert!(!is_valid_email("al ice@x.com"));
    }

    #[test]
    fn public_user_never_carries_the_hash() {
        let user = User {
            id: 1,
            username: "alice".into(),
            email: "alice@x.com".into(),
            hashed_password: "$argon2id$secret".into(),
        };
        let json = serde_json::to_value(PublicUser::from(user.clone())).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"id": 1, "username": "alice", "email": "alice@x.com"})
        );
        assert!(!serde_json::to_string(&user).unwrap().contains("argon2"));
    }

    #[test]
    fn token_response_is_bearer() {
        let json = serde_json::to_value(TokenResponse::bearer("t".into())).unwrap();
        assert_eq!(json["token_type"], "bearer");
        assert_eq!(json["access_token"], "t");
    }
}
