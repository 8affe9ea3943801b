//! Session and presence store.
//!
//! Owns the authenticated identity, the realtime channel and the presence
//! set, and exposes the outbound signalling primitives (typing, seen,
//! chat-opened).  Conversation-level reactions to realtime events are
//! delegated to a [`RealtimeListener`] attached after construction.

use std::sync::{Arc, Mutex, Weak};

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use murmur_net::{
    ChatApi, LoginRequest, ProfileUpdate, RealtimeCommand, RealtimeConnector, RealtimeLink,
    RealtimeNotification, SignUpRequest,
};
use murmur_shared::protocol::{
    ChatOpenedSignal, ClientEvent, SeenSignal, ServerEvent, TypingSignal,
};
use murmur_shared::types::{AuthUser, ConnectionState, MessageId, UserId};

use crate::error::ClientError;
use crate::events::{EventSink, StoreEvent};
use crate::state::{lock, ActiveLink, BusyFlag, SessionState};

/// Receives realtime events that are not presence broadcasts.
pub trait RealtimeListener: Send + Sync {
    fn on_event(&self, event: ServerEvent);

    /// The realtime channel dropped (server close, network loss, explicit
    /// disconnect).
    fn on_disconnected(&self);

    /// The session is about to end; the channel is still open, so final
    /// signals (stop typing) can still go out.
    fn on_session_ending(&self);

    /// The session ended (logout or a rejected session check).
    fn on_session_ended(&self);
}

struct SessionInner {
    api: Arc<dyn ChatApi>,
    connector: Arc<dyn RealtimeConnector>,
    events: EventSink,
    state: Mutex<SessionState>,
    listener: Mutex<Option<Weak<dyn RealtimeListener>>>,
}

/// Cheap to clone; all clones share one session.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<SessionInner>,
}

impl SessionStore {
    pub fn new(
        api: Arc<dyn ChatApi>,
        connector: Arc<dyn RealtimeConnector>,
        events: EventSink,
    ) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                api,
                connector,
                events,
                state: Mutex::new(SessionState::new()),
                listener: Mutex::new(None),
            }),
        }
    }

    /// Attach the listener that realtime events are forwarded to.  Held
    /// weakly: the owner of the listener controls its lifetime.
    pub fn attach_listener(&self, listener: Weak<dyn RealtimeListener>) {
        *lock(&self.inner.listener) = Some(listener);
    }

    fn listener(&self) -> Option<Arc<dyn RealtimeListener>> {
        lock(&self.inner.listener).as_ref().and_then(Weak::upgrade)
    }

    // -----------------------------------------------------------------------
    // Read accessors
    // -----------------------------------------------------------------------

    pub fn auth_user(&self) -> Option<AuthUser> {
        lock(&self.inner.state).auth_user.clone()
    }

    pub fn user_id(&self) -> Option<UserId> {
        lock(&self.inner.state)
            .auth_user
            .as_ref()
            .map(|u| u.id.clone())
    }

    pub fn is_checking_session(&self) -> bool {
        lock(&self.inner.state).is_checking_session
    }

    pub fn is_signing_up(&self) -> bool {
        lock(&self.inner.state).is_signing_up
    }

    pub fn is_logging_in(&self) -> bool {
        lock(&self.inner.state).is_logging_in
    }

    pub fn is_updating_profile(&self) -> bool {
        lock(&self.inner.state).is_updating_profile
    }

    pub fn connection_state(&self) -> ConnectionState {
        lock(&self.inner.state).connection
    }

    pub fn is_online(&self, id: &UserId) -> bool {
        lock(&self.inner.state).presence.is_online(id)
    }

    pub fn online_users(&self) -> Vec<UserId> {
        lock(&self.inner.state).presence.ids()
    }

    /// Online users other than ourselves.
    pub fn online_count(&self) -> usize {
        let state = lock(&self.inner.state);
        match state.auth_user.as_ref() {
            Some(me) => state.presence.online_count_excluding(&me.id),
            None => state.presence.len(),
        }
    }

    // -----------------------------------------------------------------------
    // Authentication
    // -----------------------------------------------------------------------

    /// Ask the backend whether a session already exists.  Never fails: a
    /// rejected check simply leaves the user logged out.
    pub async fn check_session(&self) -> Option<AuthUser> {
        let _busy = BusyFlag::raise(&self.inner.state, |s| &mut s.is_checking_session);

        match self.inner.api.check_session().await {
            Ok(user) => {
                info!(user = %user.id, "Existing session restored");
                self.set_auth_user(Some(user.clone()));
                self.connect_best_effort().await;
                Some(user)
            }
            Err(e) => {
                debug!(error = %e, "No existing session");
                if self.auth_user().is_some() {
                    info!("Session no longer valid");
                    self.end_session();
                } else {
                    self.set_auth_user(None);
                }
                None
            }
        }
    }

    pub async fn sign_up(&self, request: SignUpRequest) -> Result<AuthUser, ClientError> {
        let _busy = BusyFlag::raise(&self.inner.state, |s| &mut s.is_signing_up);

        match self.inner.api.sign_up(&request).await {
            Ok(user) => {
                info!(user = %user.id, "Account created");
                self.set_auth_user(Some(user.clone()));
                self.inner.events.success("Account created successfully");
                self.connect_best_effort().await;
                Ok(user)
            }
            Err(e) => Err(self.report(e.into())),
        }
    }

    pub async fn login(&self, request: LoginRequest) -> Result<AuthUser, ClientError> {
        let _busy = BusyFlag::raise(&self.inner.state, |s| &mut s.is_logging_in);

        match self.inner.api.login(&request).await {
            Ok(user) => {
                info!(user = %user.id, "Logged in");
                self.set_auth_user(Some(user.clone()));
                self.inner.events.success("Logged in successfully");
                self.connect_best_effort().await;
                Ok(user)
            }
            Err(e) => Err(self.report(e.into())),
        }
    }

    /// Invalidate the server session, then drop the identity and the
    /// realtime channel together with every listener attached to it.
    pub async fn logout(&self) -> Result<(), ClientError> {
        if let Err(e) = self.inner.api.logout().await {
            return Err(self.report(e.into()));
        }

        self.end_session();
        self.inner.events.success("Logged out successfully");
        info!("Logged out");
        Ok(())
    }

    /// Apply a partial profile update once the backend confirms it.
    pub async fn update_profile(&self, update: ProfileUpdate) -> Result<AuthUser, ClientError> {
        let _busy = BusyFlag::raise(&self.inner.state, |s| &mut s.is_updating_profile);

        match self.inner.api.update_profile(&update).await {
            Ok(user) => {
                self.set_auth_user(Some(user.clone()));
                self.inner.events.success("Profile updated successfully");
                Ok(user)
            }
            Err(e) => Err(self.report(e.into())),
        }
    }

    /// Tear down everything tied to the current identity.
    fn end_session(&self) {
        let listener = self.listener();
        if let Some(listener) = listener.as_ref() {
            listener.on_session_ending();
        }
        self.disconnect_realtime();
        self.set_auth_user(None);
        if let Some(listener) = listener {
            listener.on_session_ended();
        }
    }

    fn set_auth_user(&self, user: Option<AuthUser>) {
        lock(&self.inner.state).auth_user = user;
        self.inner.events.emit(StoreEvent::SessionChanged);
    }

    fn report(&self, err: ClientError) -> ClientError {
        error!(error = %err, "Session request failed");
        self.inner.events.error(err.user_message());
        err
    }

    // -----------------------------------------------------------------------
    // Realtime channel
    // -----------------------------------------------------------------------

    async fn connect_best_effort(&self) {
        if let Err(e) = self.connect_realtime().await {
            warn!(error = %e, "Realtime connection unavailable, continuing without it");
        }
    }

    /// Open the realtime channel for the current identity.  No-op without an
    /// identity or while a channel is already open or opening.
    pub async fn connect_realtime(&self) -> Result<(), ClientError> {
        let user_id = {
            let mut state = lock(&self.inner.state);
            let Some(user) = state.auth_user.as_ref() else {
                debug!("No identity, not connecting");
                return Ok(());
            };
            if state.connection != ConnectionState::Disconnected {
                debug!(state = ?state.connection, "Realtime already connected");
                return Ok(());
            }
            let id = user.id.clone();
            state.connection = ConnectionState::Connecting;
            id
        };
        self.inner
            .events
            .emit(StoreEvent::ConnectionChanged(ConnectionState::Connecting));

        let link = match self.inner.connector.connect(&user_id).await {
            Ok(link) => link,
            Err(e) => {
                {
                    let mut state = lock(&self.inner.state);
                    if state.connection == ConnectionState::Connecting {
                        state.connection = ConnectionState::Disconnected;
                    }
                }
                self.inner
                    .events
                    .emit(StoreEvent::ConnectionChanged(ConnectionState::Disconnected));
                return Err(e.into());
            }
        };

        let RealtimeLink {
            commands,
            notifications,
        } = link;

        {
            let mut state = lock(&self.inner.state);
            let same_user = state.auth_user.as_ref().map(|u| &u.id) == Some(&user_id);
            if !same_user || state.connection != ConnectionState::Connecting {
                // Logged out or disconnected while the handshake was running.
                debug!(user = %user_id, "Discarding realtime link opened for a stale session");
                let _ = commands.try_send(RealtimeCommand::Shutdown);
                return Ok(());
            }

            state.epoch += 1;
            let epoch = state.epoch;
            let dispatcher = tokio::spawn(dispatch_loop(
                Arc::downgrade(&self.inner),
                epoch,
                notifications,
            ));
            state.link = Some(ActiveLink {
                commands,
                epoch,
                dispatcher,
            });
            state.connection = ConnectionState::Connected;
        }

        info!(user = %user_id, "Realtime connected");
        self.inner
            .events
            .emit(StoreEvent::ConnectionChanged(ConnectionState::Connected));
        Ok(())
    }

    /// Close the realtime channel.  Idempotent.
    pub fn disconnect_realtime(&self) {
        let (link, was) = {
            let mut state = lock(&self.inner.state);
            let was = state.connection;
            state.connection = ConnectionState::Disconnected;
            state.presence.clear();
            (state.link.take(), was)
        };

        if let Some(link) = link {
            let _ = link.commands.try_send(RealtimeCommand::Shutdown);
            // Stops event delivery immediately; nothing reaches the stores
            // after this point.
            link.dispatcher.abort();
            info!(epoch = link.epoch, "Realtime disconnected");
        }

        if was != ConnectionState::Disconnected {
            self.inner
                .events
                .emit(StoreEvent::ConnectionChanged(ConnectionState::Disconnected));
            if let Some(listener) = self.listener() {
                listener.on_disconnected();
            }
        }
    }

    fn apply_presence(&self, ids: Vec<UserId>) {
        lock(&self.inner.state).presence.replace(ids);
        self.inner.events.emit(StoreEvent::PresenceChanged);
    }

    fn on_transport_closed(&self, epoch: u64, reason: &str) {
        let closed = {
            let mut state = lock(&self.inner.state);
            if state.link.as_ref().map(|l| l.epoch) != Some(epoch) {
                false
            } else {
                state.link = None;
                state.connection = ConnectionState::Disconnected;
                state.presence.clear();
                true
            }
        };
        if !closed {
            return;
        }

        warn!(reason, "Realtime connection lost");
        self.inner
            .events
            .emit(StoreEvent::ConnectionChanged(ConnectionState::Disconnected));
        if let Some(listener) = self.listener() {
            listener.on_disconnected();
        }
    }

    // -----------------------------------------------------------------------
    // Outbound signals (fire-and-forget, no-op without a channel)
    // -----------------------------------------------------------------------

    fn emit(&self, event: ClientEvent) {
        let commands = lock(&self.inner.state)
            .link
            .as_ref()
            .map(|l| l.commands.clone());
        let Some(commands) = commands else {
            debug!(event = event.name(), "No realtime connection, dropping signal");
            return;
        };
        let name = event.name();
        if let Err(e) = commands.try_send(RealtimeCommand::Emit(event)) {
            warn!(event = name, error = %e, "Failed to queue realtime signal");
        }
    }

    pub fn emit_typing_start(&self, peer: &UserId) {
        if let Some(me) = self.user_id() {
            self.emit(ClientEvent::Typing(TypingSignal {
                sender_id: me,
                receiver_id: peer.clone(),
            }));
        }
    }

    pub fn emit_typing_stop(&self, peer: &UserId) {
        if let Some(me) = self.user_id() {
            self.emit(ClientEvent::StopTyping(TypingSignal {
                sender_id: me,
                receiver_id: peer.clone(),
            }));
        }
    }

    /// Acknowledge inbound messages from `peer`.  Sender and receiver name
    /// the acknowledged messages' own parties: `peer` wrote them, we read
    /// them.
    pub fn emit_message_seen(&self, peer: &UserId, message_ids: Vec<MessageId>) {
        if message_ids.is_empty() {
            return;
        }
        if let Some(me) = self.user_id() {
            self.emit(ClientEvent::MessageSeen(SeenSignal {
                sender_id: peer.clone(),
                receiver_id: me,
                message_ids,
            }));
        }
    }

    pub fn emit_conversation_opened(&self, peer: &UserId) {
        if let Some(me) = self.user_id() {
            self.emit(ClientEvent::ChatOpened(ChatOpenedSignal {
                user_id: me,
                other_user_id: peer.clone(),
            }));
        }
    }
}

/// Forwards transport notifications to the session until the link closes
/// or the session is dropped.
async fn dispatch_loop(
    session: Weak<SessionInner>,
    epoch: u64,
    mut notifications: mpsc::Receiver<RealtimeNotification>,
) {
    let reason = loop {
        let Some(notification) = notifications.recv().await else {
            break "notification channel closed".to_string();
        };
        let Some(inner) = session.upgrade() else {
            debug!(epoch, "Session dropped, stopping dispatcher");
            return;
        };
        let store = SessionStore { inner };

        match notification {
            RealtimeNotification::Event(ServerEvent::OnlineUsers(ids)) => {
                store.apply_presence(ids);
            }
            RealtimeNotification::Event(event) => match store.listener() {
                Some(listener) => listener.on_event(event),
                None => debug!(event = event.name(), "No listener attached, dropping event"),
            },
            RealtimeNotification::Disconnected { reason } => break reason,
        }
    };

    if let Some(inner) = session.upgrade() {
        SessionStore { inner }.on_transport_closed(epoch, &reason);
    }
    debug!(epoch, "Realtime dispatcher finished");
}
