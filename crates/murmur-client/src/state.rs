//! Store state.
//!
//! Each store keeps one of these structs behind a `Mutex`.  Critical
//! sections are short and never span an `.await`.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use murmur_net::{PresenceSet, RealtimeCommand};
use murmur_shared::message::{ChatMessage, ServerMessage};
use murmur_shared::types::{AuthUser, ConnectionState, MessageId, Peer, TempId, UserId};

/// Lock a store mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Raises a boolean flag for as long as it is alive and lowers it on drop,
/// including early returns and cancelled futures.
pub(crate) struct BusyFlag<'a, S> {
    state: &'a Mutex<S>,
    flag: fn(&mut S) -> &mut bool,
}

impl<'a, S> BusyFlag<'a, S> {
    pub(crate) fn raise(state: &'a Mutex<S>, flag: fn(&mut S) -> &mut bool) -> Self {
        *flag(&mut lock(state)) = true;
        Self { state, flag }
    }
}

impl<S> Drop for BusyFlag<'_, S> {
    fn drop(&mut self) {
        *(self.flag)(&mut lock(self.state)) = false;
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// The open realtime channel owned by the session.
pub(crate) struct ActiveLink {
    pub(crate) commands: mpsc::Sender<RealtimeCommand>,
    pub(crate) epoch: u64,
    pub(crate) dispatcher: JoinHandle<()>,
}

pub struct SessionState {
    /// The logged-in user.  `None` until a session check or login succeeds.
    pub auth_user: Option<AuthUser>,

    /// True from start-up until the first session check finishes.
    pub is_checking_session: bool,
    pub is_signing_up: bool,
    pub is_logging_in: bool,
    pub is_updating_profile: bool,

    /// Connected user ids, as last broadcast by the server.
    pub presence: PresenceSet,

    pub connection: ConnectionState,

    pub(crate) link: Option<ActiveLink>,

    /// Incremented per opened link so a stale dispatcher cannot tear down
    /// its successor.
    pub(crate) epoch: u64,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            auth_user: None,
            is_checking_session: true,
            is_signing_up: false,
            is_logging_in: false,
            is_updating_profile: false,
            presence: PresenceSet::new(),
            connection: ConnectionState::Disconnected,
            link: None,
            epoch: 0,
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Conversation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct ConversationState {
    pub roster: Vec<Peer>,
    pub active: Option<Peer>,
    pub messages: Vec<ChatMessage>,
    /// Unread inbound messages per sender.  Absent and zero mean the same.
    pub unread: HashMap<UserId, u32>,
    /// Inbound ids already added to `unread`, so a redelivery is not
    /// counted twice.
    pub counted_unread: HashSet<MessageId>,
    pub is_roster_loading: bool,
    pub is_history_loading: bool,
    /// The single peer currently shown as typing.
    pub typing_peer: Option<UserId>,
    /// Bumped on every seen update that changed at least one message.
    pub seen_marker: u64,
    /// Peer whose conversation-scoped events are currently applied.
    pub bound_peer: Option<UserId>,
}

impl ConversationState {
    pub fn active_peer_id(&self) -> Option<&UserId> {
        self.active.as_ref().map(|p| &p.id)
    }

    pub fn position_of_temp(&self, temp_id: TempId) -> Option<usize> {
        self.messages.iter().position(|m| m.temp_id() == Some(temp_id))
    }

    pub fn position_of(&self, id: &MessageId) -> Option<usize> {
        self.messages.iter().position(|m| m.server_id() == Some(id))
    }

    pub fn confirmed_mut(&mut self, id: &MessageId) -> Option<&mut ServerMessage> {
        self.messages
            .iter_mut()
            .filter_map(ChatMessage::as_confirmed_mut)
            .find(|m| &m.id == id)
    }

    /// Turn the pending entry `temp_id` into its confirmed form, in place.
    /// Returns `false` when the pending entry is gone (e.g. the history was
    /// replaced by a conversation switch).
    pub fn confirm_pending(&mut self, temp_id: TempId, confirmed: ServerMessage) -> bool {
        let Some(pos) = self.position_of_temp(temp_id) else {
            return false;
        };
        if self.position_of(&confirmed.id).is_some() {
            // Already delivered through another path; drop the placeholder.
            self.messages.remove(pos);
        } else {
            self.messages[pos] = ChatMessage::Confirmed(confirmed);
        }
        true
    }

    pub fn remove_pending(&mut self, temp_id: TempId) -> bool {
        let before = self.messages.len();
        self.messages.retain(|m| m.temp_id() != Some(temp_id));
        self.messages.len() != before
    }

    /// Replace a confirmed message by id.  Returns `false` if it is not in
    /// the list.
    pub fn replace_confirmed(&mut self, message: ServerMessage) -> bool {
        match self.confirmed_mut(&message.id) {
            Some(slot) => {
                *slot = message;
                true
            }
            None => false,
        }
    }

    /// Mark the listed messages, sent by `me` to `peer`, as seen.  Returns
    /// how many changed.
    pub fn mark_seen_ids(
        &mut self,
        me: &UserId,
        peer: &UserId,
        ids: &[MessageId],
        at: DateTime<Utc>,
    ) -> usize {
        self.messages
            .iter_mut()
            .filter_map(ChatMessage::as_confirmed_mut)
            .filter(|m| &m.sender_id == me && &m.receiver_id == peer && ids.contains(&m.id))
            .map(|m| m.mark_seen(peer, at))
            .filter(|changed| *changed)
            .count()
    }

    /// Mark every message `me` sent to `peer` as seen.  Returns how many
    /// changed.
    pub fn mark_all_seen_by(&mut self, me: &UserId, peer: &UserId, at: DateTime<Utc>) -> usize {
        self.messages
            .iter_mut()
            .filter_map(ChatMessage::as_confirmed_mut)
            .filter(|m| &m.sender_id == me && &m.receiver_id == peer)
            .map(|m| m.mark_seen(peer, at))
            .filter(|changed| *changed)
            .count()
    }

    /// Count an inbound message as unread.  Returns `false` if this id was
    /// already counted.
    pub fn count_unread(&mut self, sender: &UserId, id: &MessageId) -> bool {
        if !self.counted_unread.insert(id.clone()) {
            return false;
        }
        *self.unread.entry(sender.clone()).or_insert(0) += 1;
        true
    }

    /// Inbound messages from `peer` that we have not acknowledged yet.
    pub fn unseen_from(&self, me: &UserId, peer: &UserId) -> Vec<MessageId> {
        self.messages
            .iter()
            .filter_map(ChatMessage::as_confirmed)
            .filter(|m| &m.sender_id == peer && &m.receiver_id == me && !m.seen && !m.deleted)
            .map(|m| m.id.clone())
            .collect()
    }
}
