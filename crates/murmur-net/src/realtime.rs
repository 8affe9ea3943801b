//! Realtime channel contract with a tokio mpsc command/notification pattern.
//!
//! A connector opens the channel and hands back a [`RealtimeLink`]: commands
//! flow *into* the transport task, notifications flow *out* of it.  The
//! transport task owns the socket; callers never touch it directly.

use async_trait::async_trait;
use tokio::sync::mpsc;

use murmur_shared::protocol::{ClientEvent, ServerEvent};
use murmur_shared::types::UserId;

use crate::error::RealtimeError;

// ---------------------------------------------------------------------------
// Command / notification types
// ---------------------------------------------------------------------------

/// Commands sent *into* the transport task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RealtimeCommand {
    /// Send an outbound signal.  No acknowledgement is awaited.
    Emit(ClientEvent),
    /// Close the socket and end the task.
    Shutdown,
}

/// Notifications sent *from* the transport task, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RealtimeNotification {
    /// A decoded server event.
    Event(ServerEvent),
    /// The channel is gone (server close, network error or shutdown).
    /// Always the last notification of a link.
    Disconnected { reason: String },
}

/// Both ends of an open realtime channel.
#[derive(Debug)]
pub struct RealtimeLink {
    pub commands: mpsc::Sender<RealtimeCommand>,
    pub notifications: mpsc::Receiver<RealtimeNotification>,
}

/// Opens a realtime channel keyed by the authenticated user's id.
#[async_trait]
pub trait RealtimeConnector: Send + Sync {
    async fn connect(&self, user_id: &UserId) -> Result<RealtimeLink, RealtimeError>;
}
