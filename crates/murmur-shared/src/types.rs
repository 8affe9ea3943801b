use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// User identity = backend-assigned document id
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn short(&self) -> &str {
        let end = self.0.char_indices().nth(8).map(|(i, _)| i).unwrap_or(self.0.len());
        &self.0[..end]
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Server-assigned message id, known only once the backend has persisted
/// the message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Client-assigned id of an optimistic message that the backend has not
/// acknowledged yet.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct TempId(pub Uuid);

impl TempId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TempId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TempId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "temp-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Identity / peers
// ---------------------------------------------------------------------------

/// The authenticated user, as returned by the auth endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    #[serde(rename = "_id")]
    pub id: UserId,
    pub full_name: String,
    pub email: String,
    #[serde(default)]
    pub profile_pic: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Another user in the roster.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Peer {
    #[serde(rename = "_id")]
    pub id: UserId,
    pub full_name: String,
    #[serde(default)]
    pub profile_pic: Option<String>,
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Realtime connection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        self == Self::Connected
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::Disconnected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_user_uses_backend_field_names() {
        let json = r#"{
            "_id": "65f1c0ffee",
            "fullName": "Ada Lovelace",
            "email": "ada@example.com",
            "profilePic": "",
            "createdAt": "2024-03-01T10:00:00Z"
        }"#;
        let user: AuthUser = serde_json::from_str(json).unwrap();
        assert_eq!(user.id, UserId::from("65f1c0ffee"));
        assert_eq!(user.full_name, "Ada Lovelace");
        assert_eq!(user.profile_pic.as_deref(), Some(""));
    }

    #[test]
    fn test_peer_last_seen_is_optional() {
        let peer: Peer = serde_json::from_str(r#"{"_id":"b","fullName":"Bob"}"#).unwrap();
        assert!(peer.last_seen.is_none());
        assert!(peer.profile_pic.is_none());
    }

    #[test]
    fn test_user_id_short() {
        assert_eq!(UserId::from("0123456789abcdef").short(), "01234567");
        assert_eq!(UserId::from("abc").short(), "abc");
    }
}
