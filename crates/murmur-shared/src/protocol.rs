use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::message::ServerMessage;
use crate::types::{MessageId, UserId};

/// Realtime events pushed by the server.  Each frame on the wire is a JSON
/// object `{"event": <name>, "data": <payload>}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// Full set of currently connected user ids (replace, never merge)
    #[serde(rename = "getOnlineUsers")]
    OnlineUsers(Vec<UserId>),

    #[serde(rename = "newMessage")]
    NewMessage(ServerMessage),

    #[serde(rename = "userTyping")]
    UserTyping(PeerRef),

    #[serde(rename = "userStopTyping")]
    UserStopTyping(PeerRef),

    /// Explicit acknowledgement of specific messages by the peer
    #[serde(rename = "messageSeenUpdate")]
    MessageSeenUpdate(SeenUpdate),

    /// The peer opened its conversation with us
    #[serde(rename = "chatOpenedBy")]
    ChatOpenedBy(PeerRef),

    #[serde(rename = "messageEdited")]
    MessageEdited(ServerMessage),

    #[serde(rename = "messageDeleted")]
    MessageDeleted(MessageId),
}

pub const SERVER_EVENT_NAMES: &[&str] = &[
    "getOnlineUsers",
    "newMessage",
    "userTyping",
    "userStopTyping",
    "messageSeenUpdate",
    "chatOpenedBy",
    "messageEdited",
    "messageDeleted",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PeerRef {
    #[serde(alias = "senderId", alias = "userId")]
    pub peer_id: UserId,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SeenUpdate {
    #[serde(alias = "receiverId", alias = "seenBy")]
    pub peer_id: UserId,
    pub message_ids: Vec<MessageId>,
}

/// Signals emitted by this client.  Fire-and-forget: the server never acks
/// them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "typing")]
    Typing(TypingSignal),

    #[serde(rename = "stopTyping")]
    StopTyping(TypingSignal),

    #[serde(rename = "messageSeen")]
    MessageSeen(SeenSignal),

    #[serde(rename = "chatOpened")]
    ChatOpened(ChatOpenedSignal),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TypingSignal {
    pub sender_id: UserId,
    pub receiver_id: UserId,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SeenSignal {
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub message_ids: Vec<MessageId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatOpenedSignal {
    pub user_id: UserId,
    pub other_user_id: UserId,
}

impl ServerEvent {
    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        let name = value
            .get("event")
            .and_then(|e| e.as_str())
            .ok_or(ProtocolError::MissingEventName)?;
        if !SERVER_EVENT_NAMES.contains(&name) {
            return Err(ProtocolError::UnknownEvent(name.to_string()));
        }
        Ok(serde_json::from_value(value)?)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::OnlineUsers(_) => "getOnlineUsers",
            Self::NewMessage(_) => "newMessage",
            Self::UserTyping(_) => "userTyping",
            Self::UserStopTyping(_) => "userStopTyping",
            Self::MessageSeenUpdate(_) => "messageSeenUpdate",
            Self::ChatOpenedBy(_) => "chatOpenedBy",
            Self::MessageEdited(_) => "messageEdited",
            Self::MessageDeleted(_) => "messageDeleted",
        }
    }
}

impl ClientEvent {
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Typing(_) => "typing",
            Self::StopTyping(_) => "stopTyping",
            Self::MessageSeen(_) => "messageSeen",
            Self::ChatOpened(_) => "chatOpened",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_online_users() {
        let ev = ServerEvent::from_json(r#"{"event":"getOnlineUsers","data":["a","b"]}"#).unwrap();
        assert_eq!(
            ev,
            ServerEvent::OnlineUsers(vec![UserId::from("a"), UserId::from("b")])
        );
    }

    #[test]
    fn test_decode_typing_accepts_sender_alias() {
        let ev = ServerEvent::from_json(r#"{"event":"userTyping","data":{"senderId":"b"}}"#).unwrap();
        assert_eq!(
            ev,
            ServerEvent::UserTyping(PeerRef {
                peer_id: UserId::from("b")
            })
        );
    }

    #[test]
    fn test_decode_message_deleted() {
        let ev = ServerEvent::from_json(r#"{"event":"messageDeleted","data":"m9"}"#).unwrap();
        assert_eq!(ev, ServerEvent::MessageDeleted(MessageId::from("m9")));
        assert_eq!(ev.name(), "messageDeleted");
    }

    #[test]
    fn test_unknown_event_is_reported_by_name() {
        let err = ServerEvent::from_json(r#"{"event":"reaction","data":{}}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownEvent(ref n) if n == "reaction"));
    }

    #[test]
    fn test_missing_event_name() {
        let err = ServerEvent::from_json(r#"{"data":1}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::MissingEventName));
    }

    #[test]
    fn test_encode_seen_signal() {
        let ev = ClientEvent::MessageSeen(SeenSignal {
            sender_id: UserId::from("b"),
            receiver_id: UserId::from("a"),
            message_ids: vec![MessageId::from("m1"), MessageId::from("m2")],
        });
        let json: serde_json::Value = serde_json::from_str(&ev.to_json().unwrap()).unwrap();
        assert_eq!(json["event"], "messageSeen");
        assert_eq!(json["data"]["senderId"], "b");
        assert_eq!(json["data"]["messageIds"][1], "m2");
    }

    #[test]
    fn test_encode_chat_opened() {
        let ev = ClientEvent::ChatOpened(ChatOpenedSignal {
            user_id: UserId::from("a"),
            other_user_id: UserId::from("b"),
        });
        assert_eq!(
            ev.to_json().unwrap(),
            r#"{"event":"chatOpened","data":{"userId":"a","otherUserId":"b"}}"#
        );
    }
}
