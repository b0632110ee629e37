use axum::extract::FromRef;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::debug;

use crate::{config::JwtConfig, state::AppState};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // username
    pub exp: usize,
    pub iat: usize,
    pub iss: String,
    pub aud: String,
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("invalid token signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            // issuer/audience mismatch: signed, but not by us for us
            ErrorKind::InvalidSignature
            | ErrorKind::InvalidAlgorithm
            | ErrorKind::InvalidIssuer
            | ErrorKind::InvalidAudience => TokenError::InvalidSignature,
            _ => TokenError::Malformed,
        }
    }
}

/// Signing keys derived once from the configured secret.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    ttl: Duration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        state.jwt.clone()
    }
}

impl JwtKeys {
    pub fn from_config(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            ttl: Duration::minutes(cfg.ttl_minutes),
        }
    }

    pub fn issue(&self, subject: &str) -> anyhow::Result<String> {
        self.issue_at(subject, OffsetDateTime::now_utc())
    }

    /// Signs a token for `subject` as if issued at `now`; it expires at `now + ttl`.
    pub fn issue_at(&self, subject: &str, now: OffsetDateTime) -> anyhow::Result<String> {
        let exp = now + self.ttl;
        let claims = Claims {
            sub: subject.to_string(),
            iat: now.unix_timestamp().max(0) as usize,
            exp: exp.unix_timestamp().max(0) as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        debug!(subject, exp = claims.exp, "jwt signed");
        Ok(token)
    }

    /// Verifies signature, issuer, audience and expiry, returning the subject.
    pub fn validate(&self, token: &str) -> Result<String, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(subject = %data.claims.sub, "jwt verified");
        Ok(data.claims.sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_keys(secret: &str, issuer: &str, audience: &str) -> JwtKeys {
        JwtKeys::from_config(&JwtConfig {
            secret: secret.into(),
            issuer: issuer.into(),
            audience: audience.into(),
            ttl_minutes: 30,
        })
    }

    #[test]
    fn issue_and_validate_recovers_subject() {
        let keys = make_keys("dev-secret", "test-issuer", "test-aud");
        let token = keys.issue("alice").expect("issue");
        assert!(!token.is_empty());
        assert_eq!(keys.validate(&token), Ok("alice".to_string()));
    }

    #[test]
    fn validate_fails_once_ttl_elapsed() {
        let keys = make_keys("dev-secret", "iss", "aud");
        let issued = OffsetDateTime::now_utc() - Duration::minutes(31);
        let token = keys.issue_at("alice", issued).expect("issue");
        assert_eq!(keys.validate(&token), Err(TokenError::Expired));
    }

    #[test]
    fn validate_accepts_token_just_inside_ttl() {
        let keys = make_keys("dev-secret", "iss", "aud");
        let issued = OffsetDateTime::now_utc() - Duration::minutes(29);
        let token = keys.issue_at("alice", issued).expect("issue");
        assert_eq!(keys.validate(&token), Ok("alice".to_string()));
    }

    #[test]
    fn validate_rejects_foreign_secret() {
        let ours = make_keys("our-secret", "iss", "aud");
        let theirs = make_keys("their-secret", "iss", "aud");
        let token = theirs.issue("alice").expect("issue");
        assert_eq!(ours.validate(&token), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn validate_rejects_wrong_issuer_or_audience() {
        let good = make_keys("same-secret", "good-iss", "good-aud");
        let bad = make_keys("same-secret", "bad-iss", "bad-aud");
        let token = good.issue("alice").expect("issue");
        assert_eq!(bad.validate(&token), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn validate_rejects_tampered_payload() {
        let keys = make_keys("dev-secret", "iss", "aud");
        let alice = keys.issue("alice").expect("issue");
        let mallory = keys.issue("mallory").expect("issue");
        let a: Vec<&str> = alice.split('.').collect();
        let m: Vec<&str> = mallory.split('.').collect();
        let forged = format!("{}.{}.{}", a[0], m[1], a[2]);
        assert_eq!(keys.validate(&forged), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn validate_rejects_garbage_as_malformed() {
        let keys = make_keys("dev-secret", "iss", "aud");
        for token in ["", "abc", "a.b.c", "not-a-jwt.at.all"] {
            assert_eq!(keys.validate(token), Err(TokenError::Malformed), "{token}");
        }
    }
}
