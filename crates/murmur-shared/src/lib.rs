//! Data model and realtime wire protocol shared by the Murmur crates.

pub mod constants;
pub mod error;
pub mod format;
pub mod message;
pub mod protocol;
pub mod types;

pub use error::ProtocolError;
pub use message::{ChatMessage, DeliveryStatus, MessageKey, OutgoingMessage, PendingMessage, ServerMessage};
pub use protocol::{ClientEvent, ServerEvent};
pub use types::{AuthUser, ConnectionState, MessageId, Peer, TempId, UserId};
