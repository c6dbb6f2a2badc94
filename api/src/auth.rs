use axum::http::HeaderMap;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::EngageError;

// ── JWT Claims ──

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,    // user id
    pub exp: usize,  // expiry (unix timestamp)
}

impl Claims {
    pub fn new(user_id: i64, ttl: chrono::Duration) -> Self {
        let exp = (chrono::Utc::now() + ttl).timestamp().max(0) as usize;
        Self { sub: user_id, exp }
    }
}

/// Tokens are issued by the identity service; this is used by tooling and tests.
pub fn issue_token(user_id: i64, jwt_secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
    encode(
        &Header::default(),
        &Claims::new(user_id, chrono::Duration::days(30)),
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
}

// ── Extract authenticated user from Authorization header ──

pub fn extract_user_id(headers: &HeaderMap, jwt_secret: &str) -> Result<i64, EngageError> {
    let token = headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(EngageError::Unauthorized)?;

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| EngageError::Unauthorized)?;

    Ok(data.claims.sub)
}

/// Anonymous viewers (no or invalid token) get `None`.
pub fn viewer_id(headers: &HeaderMap, jwt_secret: &str) -> Option<i64> {
    extract_user_id(headers, jwt_secret).ok()
}
