//! Session resolution.
//!
//! Sessions are HS256 JWTs minted by the identity provider and shared with
//! this server through `SESSION_SECRET`. The token arrives either as a bearer
//! `Authorization` header or in the `__session` cookie; its `sub` claim is the
//! user id every task query is scoped by.

use std::sync::Arc;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{error::ApiError, AppState};

const SESSION_COOKIE: &str = "__session";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no session token presented")]
    MissingToken,
    #[error("session token has no subject")]
    EmptySubject,
    #[error(transparent)]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user id
    pub exp: usize,
    pub iat: usize,
}

#[derive(Clone)]
pub struct SessionKeys {
    encoding: Arc<EncodingKey>,
    decoding: Arc<DecodingKey>,
}

impl SessionKeys {
    pub fn from_secret(secret: &[u8]) -> Self {
        Self {
            encoding: Arc::new(EncodingKey::from_secret(secret)),
            decoding: Arc::new(DecodingKey::from_secret(secret)),
        }
    }

    pub fn issue_token(&self, user_id: &str, ttl: Duration) -> Result<String, AuthError> {
        if user_id.is_empty() {
            return Err(AuthError::EmptySubject);
        }
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            exp: (now + ttl).timestamp().max(0) as usize,
            iat: now.timestamp() as usize,
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }

    /// Returns the user id the token was issued for.
    pub fn verify(&self, token: &str) -> Result<String, AuthError> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256))?;
        if data.claims.sub.is_empty() {
            return Err(AuthError::EmptySubject);
        }
        Ok(data.claims.sub)
    }
}

fn session_token(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());
    if bearer.is_some() {
        return bearer;
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .find_map(|cookie| {
            cookie
                .trim()
                .strip_prefix(SESSION_COOKIE)
                .and_then(|rest| rest.strip_prefix('='))
        })
        .filter(|token| !token.is_empty())
}

/// The authenticated user behind a request. Handlers that take a `Caller`
/// cannot run for an anonymous request.
#[derive(Debug, Clone)]
pub struct Caller {
    pub user_id: String,
}

#[async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = session_token(&parts.headers).ok_or(ApiError::Unauthorized)?;
        let user_id = state.keys.verify(token).map_err(|err| {
            tracing::debug!(error = %err, "rejected session token");
            ApiError::Unauthorized
        })?;
        Ok(Caller { user_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn issued_token_resolves_to_its_user() {
        let keys = SessionKeys::from_secret(b"test-secret");
        let token = keys.issue_token("user_42", Duration::hours(1)).unwrap();
        assert_eq!(keys.verify(&token).unwrap(), "user_42");
    }

    #[test]
    fn foreign_and_expired_tokens_are_rejected() {
        let keys = SessionKeys::from_secret(b"test-secret");
        let other = SessionKeys::from_secret(b"other-secret");

        let foreign = other.issue_token("user_42", Duration::hours(1)).unwrap();
        assert!(keys.verify(&foreign).is_err());

        let expired = keys.issue_token("user_42", Duration::hours(-2)).unwrap();
        assert!(keys.verify(&expired).is_err());

        assert!(keys.verify("not-a-jwt").is_err());
    }

    #[test]
    fn token_is_read_from_header_or_cookie() {
        let mut headers = HeaderMap::new();
        assert_eq!(session_token(&headers), None);

        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; __session=from-cookie"),
        );
        assert_eq!(session_token(&headers), Some("from-cookie"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        assert_eq!(session_token(&headers), Some("from-header"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(session_token(&headers), Some("from-cookie"));
    }
}
