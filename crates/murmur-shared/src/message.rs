//! Chat message model.
//!
//! A message shown in a conversation is either an optimistic local entry
//! that the backend has not acknowledged yet ([`ChatMessage::Pending`]) or a
//! server-confirmed record ([`ChatMessage::Confirmed`]).  The two variants
//! carry different identifiers so a message can never hold a temporary id and
//! a server id at the same time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{MessageId, TempId, UserId};

/// A message as persisted and returned by the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    #[serde(rename = "_id")]
    pub id: MessageId,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub edited_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub seen_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub seen: bool,
    #[serde(default)]
    pub seen_by: Option<UserId>,
    #[serde(default)]
    pub edited: bool,
    #[serde(default)]
    pub deleted: bool,
}

impl ServerMessage {
    /// Mark the message as seen by `peer`.  Returns `false` when it was
    /// already marked, so callers can tell genuine updates from replays.
    pub fn mark_seen(&mut self, peer: &UserId, at: DateTime<Utc>) -> bool {
        if self.seen {
            return false;
        }
        self.seen = true;
        self.seen_by = Some(peer.clone());
        self.seen_at = Some(at);
        true
    }

    pub fn apply_edit(&mut self, text: &str, at: DateTime<Utc>) {
        self.text = Some(text.to_string());
        self.edited = true;
        self.edited_at = Some(at);
    }

    /// Soft-delete: the entry keeps its place in the list but loses its
    /// renderable content.
    pub fn tombstone(&mut self, deleted_by: &str) {
        self.deleted = true;
        self.text = Some(tombstone_text(deleted_by));
        self.image = None;
    }
}

pub fn tombstone_text(deleted_by: &str) -> String {
    format!("{deleted_by} deleted this message")
}

/// An optimistic message inserted before the backend round-trip completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMessage {
    pub temp_id: TempId,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub text: Option<String>,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Delivery status derived from the variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Sent,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageKey {
    Temp(TempId),
    Server(MessageId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatMessage {
    Pending(PendingMessage),
    Confirmed(ServerMessage),
}

impl ChatMessage {
    pub fn key(&self) -> MessageKey {
        match self {
            Self::Pending(p) => MessageKey::Temp(p.temp_id),
            Self::Confirmed(m) => MessageKey::Server(m.id.clone()),
        }
    }

    pub fn status(&self) -> DeliveryStatus {
        match self {
            Self::Pending(_) => DeliveryStatus::Pending,
            Self::Confirmed(_) => DeliveryStatus::Sent,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }

    pub fn temp_id(&self) -> Option<TempId> {
        match self {
            Self::Pending(p) => Some(p.temp_id),
            Self::Confirmed(_) => None,
        }
    }

    pub fn server_id(&self) -> Option<&MessageId> {
        match self {
            Self::Pending(_) => None,
            Self::Confirmed(m) => Some(&m.id),
        }
    }

    pub fn sender_id(&self) -> &UserId {
        match self {
            Self::Pending(p) => &p.sender_id,
            Self::Confirmed(m) => &m.sender_id,
        }
    }

    pub fn receiver_id(&self) -> &UserId {
        match self {
            Self::Pending(p) => &p.receiver_id,
            Self::Confirmed(m) => &m.receiver_id,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Pending(p) => p.text.as_deref(),
            Self::Confirmed(m) => m.text.as_deref(),
        }
    }

    pub fn image(&self) -> Option<&str> {
        match self {
            Self::Pending(p) => p.image.as_deref(),
            Self::Confirmed(m) => m.image.as_deref(),
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            Self::Pending(p) => p.created_at,
            Self::Confirmed(m) => m.created_at,
        }
    }

    pub fn as_confirmed(&self) -> Option<&ServerMessage> {
        match self {
            Self::Confirmed(m) => Some(m),
            Self::Pending(_) => None,
        }
    }

    pub fn as_confirmed_mut(&mut self) -> Option<&mut ServerMessage> {
        match self {
            Self::Confirmed(m) => Some(m),
            Self::Pending(_) => None,
        }
    }
}

impl From<ServerMessage> for ChatMessage {
    fn from(m: ServerMessage) -> Self {
        Self::Confirmed(m)
    }
}

/// Body of a send request.  At least one of `text` / `image` must be
/// present.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutgoingMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl OutgoingMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            image: None,
        }
    }

    pub fn image(image: impl Into<String>) -> Self {
        Self {
            text: None,
            image: Some(image.into()),
        }
    }

    /// Trim the text and drop empty fields.
    pub fn normalized(self) -> Self {
        let text = self
            .text
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        let image = self.image.filter(|i| !i.is_empty());
        Self { text, image }
    }

    pub fn is_empty(&self) -> bool {
        self.text.as_deref().map_or(true, |t| t.trim().is_empty())
            && self.image.as_deref().map_or(true, str::is_empty)
    }
}
