//! Request and response bodies.

use roster_core::{Member, MemberAction, MemberState};
use serde::{Deserialize, Serialize};

// =============================================================================
// REQUESTS
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    #[serde(rename = "MSSV", alias = "mssv")]
    pub mssv: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Desk check-in. The QR page sends `uid`, older clients send `MSSV`.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckinRequest {
    #[serde(rename = "MSSV", alias = "mssv", alias = "uid")]
    pub mssv: String,
}

/// Card-reader check-in.
#[derive(Debug, Clone, Deserialize)]
pub struct CardCheckinRequest {
    #[serde(rename = "IDcard", alias = "id_card", alias = "uid")]
    pub id_card: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StateRequest {
    pub action: MemberAction,
}

// =============================================================================
// RESPONSES
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberResponse {
    pub message: String,
    pub member: Member,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionResponse {
    pub message: String,
    pub member: Member,
    pub from: MemberState,
    pub to: MemberState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetResponse {
    pub message: String,
    pub reset: usize,
}
