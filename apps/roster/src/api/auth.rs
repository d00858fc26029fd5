//! Bearer tokens for staff endpoints.
//!
//! Token layout: `base64url(claims JSON) "." hex(HMAC-SHA256(key, first part))`.
//! Signatures are compared in constant time.

use super::{ApiError, AppState};
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::Duration;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// What a token asserts about its bearer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Username.
    pub sub: String,
    #[serde(rename = "MSSV")]
    pub mssv: String,
    /// Expiry, unix seconds.
    pub exp: i64,
}

/// Issues and checks bearer tokens.
#[derive(Clone)]
pub struct TokenSigner {
    key: Vec<u8>,
    ttl: Duration,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenSigner {
    pub fn new(key: impl Into<Vec<u8>>, ttl: Duration) -> Self {
        Self {
            key: key.into(),
            ttl,
        }
    }

    fn sign(&self, payload: &str) -> Result<String, ApiError> {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|e| ApiError::Internal(format!("token key rejected: {e}")))?;
        mac.update(payload.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Mint a token for `username` valid from `now` for the configured TTL.
    pub fn issue(&self, username: &str, mssv: &str, now: DateTime<Utc>) -> Result<String, ApiError> {
        let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = Claims {
            sub: username.to_string(),
            mssv: mssv.to_string(),
            exp: now.timestamp().saturating_add(ttl),
        };
        let json = serde_json::to_vec(&claims)
            .map_err(|e| ApiError::Internal(format!("token encoding failed: {e}")))?;
        let payload = URL_SAFE_NO_PAD.encode(json);
        let signature = self.sign(&payload)?;
        Ok(format!("{payload}.{signature}"))
    }

    /// Check signature and expiry.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, ApiError> {
        let invalid = || ApiError::Unauthorized("Invalid token".to_string());

        let (payload, signature) = token.split_once('.').ok_or_else(invalid)?;
        let expected = self.sign(payload)?;
        if !bool::from(expected.as_bytes().ct_eq(signature.as_bytes())) {
            return Err(invalid());
        }

        let json = URL_SAFE_NO_PAD.decode(payload).map_err(|_| invalid())?;
        let claims: Claims = serde_json::from_slice(&json).map_err(|_| invalid())?;
        if claims.exp <= now.timestamp() {
            return Err(ApiError::Unauthorized("Token has expired".to_string()));
        }
        Ok(claims)
    }
}

/// Extractor for handlers that require a logged-in staff member.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("Missing Authorization header".to_string()))?;

        let token = header
            .strip_prefix("Bearer ")
            .or_else(|| header.strip_prefix("bearer "))
            .map(str::trim)
            .ok_or_else(|| ApiError::Unauthorized("Expected a Bearer token".to_string()))?;

        state.tokens.verify(token, Utc::now()).map(AuthUser)
    }
}
