//! Conversation store.
//!
//! Owns the roster, the active conversation and its message list, unread
//! counters and the typing/seen state derived from realtime events.  Sends,
//! edits and deletes are applied optimistically and reconciled with (or
//! rolled back from) the backend's answer.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use tracing::{debug, error, info, warn};

use murmur_net::ChatApi;
use murmur_shared::format::unread_badge;
use murmur_shared::message::{ChatMessage, OutgoingMessage, PendingMessage, ServerMessage};
use murmur_shared::protocol::SeenUpdate;
use murmur_shared::types::{MessageId, Peer, TempId, UserId};

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::events::{EventSink, StoreEvent};
use crate::seen::SeenThrottle;
use crate::session::SessionStore;
use crate::state::{lock, BusyFlag, ConversationState};
use crate::typing::TypingDebouncer;

struct ConversationInner {
    api: Arc<dyn ChatApi>,
    session: SessionStore,
    events: EventSink,
    state: Mutex<ConversationState>,
    typing: TypingDebouncer,
    seen: SeenThrottle,
}

/// Cheap to clone; all clones share one store.
#[derive(Clone)]
pub struct ConversationStore {
    inner: Arc<ConversationInner>,
}

impl ConversationStore {
    pub fn new(
        api: Arc<dyn ChatApi>,
        session: SessionStore,
        events: EventSink,
        config: &ClientConfig,
    ) -> Self {
        let typing = TypingDebouncer::new(session.clone(), config.typing_stop_delay);
        let seen = SeenThrottle::new(session.clone(), config.seen_flush_delay);
        Self {
            inner: Arc::new(ConversationInner {
                api,
                session,
                events,
                state: Mutex::new(ConversationState::default()),
                typing,
                seen,
            }),
        }
    }

    fn report(&self, context: &'static str, err: ClientError) -> ClientError {
        error!(error = %err, "{context} failed");
        self.inner.events.error(err.user_message());
        err
    }

    // -----------------------------------------------------------------------
    // Roster and history
    // -----------------------------------------------------------------------

    /// Replace the contact list with the backend's.
    pub async fn fetch_roster(&self) -> Result<(), ClientError> {
        let _busy = BusyFlag::raise(&self.inner.state, |s| &mut s.is_roster_loading);

        match self.inner.api.list_contacts().await {
            Ok(roster) => {
                debug!(count = roster.len(), "Roster loaded");
                lock(&self.inner.state).roster = roster;
                self.inner.events.emit(StoreEvent::RosterChanged);
                Ok(())
            }
            Err(e) => Err(self.report("Roster fetch", e.into())),
        }
    }

    /// Replace the message list with the conversation history for `peer`.
    /// A response for a peer that is no longer active is discarded.
    pub async fn fetch_history(&self, peer: &UserId) -> Result<(), ClientError> {
        let _busy = BusyFlag::raise(&self.inner.state, |s| &mut s.is_history_loading);

        let history = match self.inner.api.history(peer).await {
            Ok(history) => history,
            Err(e) => return Err(self.report("History fetch", e.into())),
        };

        {
            let mut state = lock(&self.inner.state);
            if state.active_peer_id() != Some(peer) {
                warn!(peer = %peer, "Discarding history for a conversation that is no longer active");
                return Ok(());
            }
            state.messages = history.into_iter().map(ChatMessage::from).collect();
            debug!(peer = %peer, count = state.messages.len(), "History loaded");
        }
        self.inner.events.emit(StoreEvent::MessagesChanged);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Selection and unread
    // -----------------------------------------------------------------------

    /// Make `peer` the active conversation and drop its unread counter.
    pub fn select_conversation(&self, peer: Peer) {
        let (changed, had_unread) = {
            let mut state = lock(&self.inner.state);
            let changed = state.active_peer_id() != Some(&peer.id);
            if changed {
                state.messages.clear();
            }
            let had_unread = state.unread.remove(&peer.id).is_some();
            state.active = Some(peer);
            (changed, had_unread)
        };

        if changed {
            self.inner.seen.reset();
            self.inner.events.emit(StoreEvent::MessagesChanged);
        }
        if had_unread {
            self.inner.events.emit(StoreEvent::UnreadChanged);
        }
    }

    pub fn clear_unread(&self, peer: &UserId) {
        let removed = lock(&self.inner.state).unread.remove(peer).is_some();
        if removed {
            self.inner.events.emit(StoreEvent::UnreadChanged);
        }
    }

    /// Apply conversation-scoped realtime events to the active peer.
    pub fn bind_realtime_listeners(&self) {
        let mut state = lock(&self.inner.state);
        state.bound_peer = state.active_peer_id().cloned();
        debug!(peer = ?state.bound_peer, "Conversation listeners bound");
    }

    pub fn unbind_realtime_listeners(&self) {
        let previous = lock(&self.inner.state).bound_peer.take();
        if let Some(peer) = previous {
            debug!(peer = %peer, "Conversation listeners unbound");
        }
    }

    /// Switch to the conversation with `peer`: rebind listeners, load the
    /// history, tell the peer we are looking and acknowledge what is unread.
    pub async fn open_conversation(&self, peer: Peer) -> Result<(), ClientError> {
        let switching = self.active_peer().map(|p| p.id) != Some(peer.id.clone());
        if switching {
            self.inner.typing.flush();
        }
        self.unbind_realtime_listeners();
        self.inner.seen.reset();

        let peer_id = peer.id.clone();
        self.select_conversation(peer);
        self.bind_realtime_listeners();
        info!(peer = %peer_id, "Conversation opened");

        self.fetch_history(&peer_id).await?;

        if self.active_peer_id().as_ref() != Some(&peer_id) {
            return Ok(());
        }
        self.inner.session.emit_conversation_opened(&peer_id);
        self.acknowledge_unseen(&peer_id);
        Ok(())
    }

    /// Leave the active conversation (the view went away).
    pub fn close_conversation(&self) {
        self.inner.typing.flush();
        self.unbind_realtime_listeners();
        self.inner.seen.reset();

        let closed = {
            let mut state = lock(&self.inner.state);
            state.messages.clear();
            state.active.take()
        };
        if let Some(peer) = closed {
            debug!(peer = %peer.id, "Conversation closed");
            self.inner.events.emit(StoreEvent::MessagesChanged);
        }
    }

    fn acknowledge_unseen(&self, peer: &UserId) {
        let Some(me) = self.inner.session.user_id() else {
            return;
        };
        let unseen = lock(&self.inner.state).unseen_from(&me, peer);
        if !unseen.is_empty() {
            self.inner.seen.observe(peer, unseen);
        }
    }

    // -----------------------------------------------------------------------
    // Composer
    // -----------------------------------------------------------------------

    /// A keystroke in the composer of the active conversation.
    pub fn note_keystroke(&self) {
        if let Some(peer) = self.active_peer_id() {
            self.inner.typing.keystroke(&peer);
        }
    }

    /// Send the stop-typing signal now if a burst is in progress.
    pub fn flush_typing(&self) -> bool {
        self.inner.typing.flush()
    }

    /// Send a message to the active peer.  The entry is visible immediately
    /// as pending and replaced in place by the confirmed message, or
    /// removed if the backend rejects it.
    pub async fn send_message(&self, message: OutgoingMessage) -> Result<ServerMessage, ClientError> {
        let message = message.normalized();
        if message.is_empty() {
            return Err(ClientError::EmptyMessage);
        }
        let me = self
            .inner
            .session
            .user_id()
            .ok_or(ClientError::NotAuthenticated)?;
        let peer = self.active_peer_id().ok_or(ClientError::NoActiveConversation)?;

        self.inner.typing.flush();

        let temp_id = TempId::new();
        lock(&self.inner.state)
            .messages
            .push(ChatMessage::Pending(PendingMessage {
                temp_id,
                sender_id: me,
                receiver_id: peer.clone(),
                text: message.text.clone(),
                image: message.image.clone(),
                created_at: Utc::now(),
            }));
        self.inner.events.emit(StoreEvent::MessagesChanged);
        debug!(peer = %peer, temp = %temp_id, "Message queued");

        match self.inner.api.send_message(&peer, &message).await {
            Ok(confirmed) => {
                let placed = lock(&self.inner.state).confirm_pending(temp_id, confirmed.clone());
                if placed {
                    self.inner.events.emit(StoreEvent::MessagesChanged);
                } else {
                    debug!(id = %confirmed.id, "Send acknowledged after the conversation changed");
                }
                Ok(confirmed)
            }
            Err(e) => {
                if lock(&self.inner.state).remove_pending(temp_id) {
                    self.inner.events.emit(StoreEvent::MessagesChanged);
                }
                Err(self.report("Send", e.into()))
            }
        }
    }

    /// Edit one of our own messages, rolling back if the backend refuses.
    pub async fn edit_message(&self, id: &MessageId, text: &str) -> Result<ServerMessage, ClientError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ClientError::EmptyMessage);
        }
        let me = self
            .inner
            .session
            .user_id()
            .ok_or(ClientError::NotAuthenticated)?;

        let snapshot = {
            let mut state = lock(&self.inner.state);
            let message = state
                .confirmed_mut(id)
                .ok_or_else(|| ClientError::MessageNotFound(id.clone()))?;
            if message.sender_id != me || message.deleted {
                return Err(ClientError::NotEditable(id.clone()));
            }
            let snapshot = message.clone();
            message.apply_edit(text, Utc::now());
            snapshot
        };
        self.inner.events.emit(StoreEvent::MessagesChanged);

        match self.inner.api.edit_message(id, text).await {
            Ok(updated) => {
                lock(&self.inner.state).replace_confirmed(updated.clone());
                self.inner.events.emit(StoreEvent::MessagesChanged);
                Ok(updated)
            }
            Err(e) => {
                lock(&self.inner.state).replace_confirmed(snapshot);
                self.inner.events.emit(StoreEvent::MessagesChanged);
                Err(self.report("Edit", e.into()))
            }
        }
    }

    /// Soft-delete one of our own messages, rolling back if the backend
    /// refuses.
    pub async fn delete_message(&self, id: &MessageId) -> Result<(), ClientError> {
        let me = self
            .inner
            .session
            .auth_user()
            .ok_or(ClientError::NotAuthenticated)?;

        let snapshot = {
            let mut state = lock(&self.inner.state);
            let message = state
                .confirmed_mut(id)
                .ok_or_else(|| ClientError::MessageNotFound(id.clone()))?;
            if message.sender_id != me.id || message.deleted {
                return Err(ClientError::NotEditable(id.clone()));
            }
            let snapshot = message.clone();
            message.tombstone(&me.full_name);
            snapshot
        };
        self.inner.events.emit(StoreEvent::MessagesChanged);

        match self.inner.api.delete_message(id).await {
            Ok(()) => Ok(()),
            Err(e) => {
                lock(&self.inner.state).replace_confirmed(snapshot);
                self.inner.events.emit(StoreEvent::MessagesChanged);
                Err(self.report("Delete", e.into()))
            }
        }
    }

    // -----------------------------------------------------------------------
    // Realtime event handlers
    // -----------------------------------------------------------------------

    /// Route an inbound message to exactly one of: the visible list (the
    /// sender is the bound peer) or the sender's unread counter.  Echoes of
    /// our own sends are ignored.
    pub(crate) fn handle_new_message(&self, message: ServerMessage) {
        let Some(me) = self.inner.session.user_id() else {
            return;
        };
        if message.sender_id == me {
            debug!(id = %message.id, "Ignoring echo of own message");
            return;
        }

        let sender = message.sender_id.clone();
        let id = message.id.clone();
        let displayed = {
            let mut state = lock(&self.inner.state);
            if state.bound_peer.as_ref() == Some(&sender) {
                if state.position_of(&id).is_none() {
                    state.messages.push(ChatMessage::Confirmed(message));
                }
                true
            } else if state.count_unread(&sender, &id) {
                false
            } else {
                debug!(id = %id, "Ignoring redelivered unread message");
                return;
            }
        };

        if displayed {
            self.inner.events.emit(StoreEvent::MessagesChanged);
            self.inner.seen.observe(&sender, [id]);
        } else {
            debug!(from = %sender, "Unread message");
            self.inner.events.emit(StoreEvent::UnreadChanged);
        }
    }

    pub(crate) fn handle_message_edited(&self, message: ServerMessage) {
        let replaced = {
            let mut state = lock(&self.inner.state);
            let Some(peer) = state.bound_peer.clone() else {
                return;
            };
            if message.sender_id != peer && message.receiver_id != peer {
                return;
            }
            state.replace_confirmed(message)
        };
        if replaced {
            self.inner.events.emit(StoreEvent::MessagesChanged);
        }
    }

    pub(crate) fn handle_message_deleted(&self, id: MessageId) {
        let me = self.inner.session.auth_user();
        let changed = {
            let mut state = lock(&self.inner.state);
            if state.bound_peer.is_none() {
                return;
            }
            let sender = match state.confirmed_mut(&id) {
                Some(message) if !message.deleted => message.sender_id.clone(),
                _ => return,
            };
            let name = match me.as_ref() {
                Some(me) if me.id == sender => me.full_name.clone(),
                _ => state
                    .roster
                    .iter()
                    .chain(state.active.as_ref())
                    .find(|p| p.id == sender)
                    .map(|p| p.full_name.clone())
                    .unwrap_or_else(|| sender.short().to_string()),
            };
            match state.confirmed_mut(&id) {
                Some(message) => {
                    message.tombstone(&name);
                    true
                }
                None => false,
            }
        };
        if changed {
            self.inner.events.emit(StoreEvent::MessagesChanged);
        }
    }

    pub(crate) fn handle_typing(&self, peer: UserId) {
        lock(&self.inner.state).typing_peer = Some(peer.clone());
        self.inner.events.emit(StoreEvent::TypingChanged(Some(peer)));
    }

    /// Only clears the indicator if it still names `peer`.
    pub(crate) fn handle_stop_typing(&self, peer: &UserId) {
        let cleared = {
            let mut state = lock(&self.inner.state);
            if state.typing_peer.as_ref() == Some(peer) {
                state.typing_peer = None;
                true
            } else {
                false
            }
        };
        if cleared {
            self.inner.events.emit(StoreEvent::TypingChanged(None));
        }
    }

    pub(crate) fn handle_seen_update(&self, update: SeenUpdate) {
        let Some(me) = self.inner.session.user_id() else {
            return;
        };
        let changed = lock(&self.inner.state).mark_seen_ids(
            &me,
            &update.peer_id,
            &update.message_ids,
            Utc::now(),
        );
        self.after_seen(&update.peer_id, changed);
    }

    pub(crate) fn handle_chat_opened_by(&self, peer: UserId) {
        let Some(me) = self.inner.session.user_id() else {
            return;
        };
        let changed = lock(&self.inner.state).mark_all_seen_by(&me, &peer, Utc::now());
        self.after_seen(&peer, changed);
    }

    fn after_seen(&self, peer: &UserId, changed: usize) {
        if changed == 0 {
            return;
        }
        let marker = {
            let mut state = lock(&self.inner.state);
            state.seen_marker += 1;
            state.seen_marker
        };
        debug!(peer = %peer, changed, marker, "Messages seen by peer");
        self.inner.events.emit(StoreEvent::MessagesChanged);
        self.inner.events.emit(StoreEvent::SeenUpdated(marker));
    }

    /// The realtime channel dropped: a typing indicator can no longer be
    /// cleared by its peer.
    pub(crate) fn handle_disconnected(&self) {
        let had_typer = lock(&self.inner.state).typing_peer.take().is_some();
        if had_typer {
            self.inner.events.emit(StoreEvent::TypingChanged(None));
        }
    }

    /// Last words before the session's channel closes: stop any typing
    /// burst and detach from the conversation.
    pub fn end_session_signals(&self) {
        self.inner.typing.flush();
        self.unbind_realtime_listeners();
        self.inner.seen.reset();
    }

    /// Drop everything tied to the ended session.
    pub fn reset(&self) {
        self.inner.typing.flush();
        self.inner.seen.reset();
        *lock(&self.inner.state) = ConversationState::default();
        self.inner.events.emit(StoreEvent::RosterChanged);
        self.inner.events.emit(StoreEvent::MessagesChanged);
        self.inner.events.emit(StoreEvent::UnreadChanged);
        self.inner.events.emit(StoreEvent::TypingChanged(None));
    }

    // -----------------------------------------------------------------------
    // Read accessors
    // -----------------------------------------------------------------------

    pub fn roster(&self) -> Vec<Peer> {
        lock(&self.inner.state).roster.clone()
    }

    /// The roster, optionally restricted to peers that are online.
    pub fn visible_roster(&self, online_only: bool) -> Vec<Peer> {
        let roster = self.roster();
        if !online_only {
            return roster;
        }
        roster
            .into_iter()
            .filter(|p| self.inner.session.is_online(&p.id))
            .collect()
    }

    /// Online users other than ourselves.
    pub fn online_count(&self) -> usize {
        self.inner.session.online_count()
    }

    pub fn active_peer(&self) -> Option<Peer> {
        lock(&self.inner.state).active.clone()
    }

    pub fn active_peer_id(&self) -> Option<UserId> {
        lock(&self.inner.state).active_peer_id().cloned()
    }

    pub fn bound_peer(&self) -> Option<UserId> {
        lock(&self.inner.state).bound_peer.clone()
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        lock(&self.inner.state).messages.clone()
    }

    pub fn unread_count(&self, peer: &UserId) -> u32 {
        lock(&self.inner.state).unread.get(peer).copied().unwrap_or(0)
    }

    /// `None` for "no unread"; the counter keys are removed rather than
    /// zeroed, so both cases read the same.
    pub fn unread_entry(&self, peer: &UserId) -> Option<u32> {
        lock(&self.inner.state).unread.get(peer).copied()
    }

    pub fn unread_badge(&self, peer: &UserId) -> Option<String> {
        unread_badge(self.unread_count(peer))
    }

    pub fn typing_peer(&self) -> Option<UserId> {
        lock(&self.inner.state).typing_peer.clone()
    }

    /// True when the active peer is the one typing.
    pub fn is_active_peer_typing(&self) -> bool {
        let state = lock(&self.inner.state);
        state.typing_peer.is_some() && state.typing_peer.as_ref() == state.active_peer_id()
    }

    pub fn seen_marker(&self) -> u64 {
        lock(&self.inner.state).seen_marker
    }

    pub fn is_roster_loading(&self) -> bool {
        lock(&self.inner.state).is_roster_loading
    }

    pub fn is_history_loading(&self) -> bool {
        lock(&self.inner.state).is_history_loading
    }

    pub fn is_typing(&self) -> bool {
        self.inner.typing.is_typing()
    }

    pub fn pending_seen(&self) -> usize {
        self.inner.seen.pending()
    }
}
