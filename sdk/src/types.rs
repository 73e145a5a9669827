//! Backend data model and request bodies.

use serde::{Deserialize, Serialize};

/// STUN server used when the backend cannot provide ICE configuration.
pub const FALLBACK_STUN_URL: &str = "stun:stun.l.google.com:19302";

/// Account returned by login and registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
}

/// Snapshot of a call session. Only the backend mutates sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub session_id: String,
    pub room_name: String,
    pub host_user_id: String,
    #[serde(default)]
    pub participants: Vec<String>,
    pub created_at: String,
    pub is_active: bool,
}

/// STUN/TURN endpoint for WebRTC connectivity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServer {
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

impl IceServer {
    /// Public STUN entry used as fallback.
    #[must_use]
    pub fn fallback() -> Self {
        Self {
            urls: vec![FALLBACK_STUN_URL.to_owned()],
            username: None,
            credential: None,
        }
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

/// Body of both login and register.
#[derive(Debug, Serialize)]
pub(crate) struct Credentials<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateSessionRequest<'a> {
    pub room_name: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct JoinSessionRequest<'a> {
    pub session_id: &'a str,
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
