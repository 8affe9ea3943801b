use tracing::debug;

use murmur_shared::protocol::ServerEvent;

use crate::conversation::ConversationStore;
use crate::session::RealtimeListener;

/// Routes realtime events from the session's channel into the conversation
/// store.
///
/// Session-wide events (new message, typing, seen, chat opened) are always
/// applied; the conversation store itself ignores edit/delete broadcasts
/// unless listeners are bound to a conversation.
pub struct EventBridge {
    conversations: ConversationStore,
}

impl EventBridge {
    pub fn new(conversations: ConversationStore) -> Self {
        Self { conversations }
    }
}

impl RealtimeListener for EventBridge {
    fn on_event(&self, event: ServerEvent) {
        debug!(event = event.name(), "Realtime event");

        match event {
            ServerEvent::NewMessage(message) => self.conversations.handle_new_message(message),
            ServerEvent::UserTyping(peer) => self.conversations.handle_typing(peer.peer_id),
            ServerEvent::UserStopTyping(peer) => {
                self.conversations.handle_stop_typing(&peer.peer_id)
            }
            ServerEvent::MessageSeenUpdate(update) => self.conversations.handle_seen_update(update),
            ServerEvent::ChatOpenedBy(peer) => self.conversations.handle_chat_opened_by(peer.peer_id),
            ServerEvent::MessageEdited(message) => self.conversations.handle_message_edited(message),
            ServerEvent::MessageDeleted(id) => self.conversations.handle_message_deleted(id),
            // Presence is consumed by the session before it reaches us.
            ServerEvent::OnlineUsers(_) => {}
        }
    }

    fn on_disconnected(&self) {
        self.conversations.handle_disconnected();
    }

    fn on_session_ending(&self) {
        self.conversations.end_session_signals();
    }

    fn on_session_ended(&self) {
        self.conversations.reset();
    }
}
