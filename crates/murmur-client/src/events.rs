use serde::Serialize;
use tokio::sync::broadcast;

use murmur_shared::types::{ConnectionState, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Error,
}

/// A user-facing notification (the UI renders it as a toast).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

/// Change notifications published by the stores.  Payloads are kept small;
/// subscribers read the current state from the stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "payload", rename_all = "kebab-case")]
pub enum StoreEvent {
    Notice(Notice),
    SessionChanged,
    ConnectionChanged(ConnectionState),
    PresenceChanged,
    RosterChanged,
    MessagesChanged,
    UnreadChanged,
    TypingChanged(Option<UserId>),
    /// Carries the new seen marker; it differs from every earlier value.
    SeenUpdated(u64),
}

/// Broadcast fan-out for [`StoreEvent`]s.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: broadcast::Sender<StoreEvent>,
}

impl EventSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: StoreEvent) {
        // No subscribers is a normal state (headless use, tests).
        if self.tx.send(event).is_err() {
            tracing::trace!("Store event dropped: no subscribers");
        }
    }

    pub fn success(&self, text: impl Into<String>) {
        self.emit(StoreEvent::Notice(Notice {
            level: NoticeLevel::Success,
            text: text.into(),
        }));
    }

    pub fn error(&self, text: impl Into<String>) {
        self.emit(StoreEvent::Notice(Notice {
            level: NoticeLevel::Error,
            text: text.into(),
        }));
    }
}
