//! In-memory backend for store integration tests.
//!
//! `FakeApi` answers REST calls from a mutable in-memory fixture and can be
//! told to fail or hold any operation.  `FakeConnector` hands out channel
//! pairs so a test plays the server side of the realtime connection.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::sync::{mpsc, Notify};

use murmur_client_lib::{AppContext, ClientConfig};
use murmur_net::{
    ApiError, ChatApi, LoginRequest, ProfileUpdate, RealtimeCommand, RealtimeConnector,
    RealtimeError, RealtimeLink, RealtimeNotification, SignUpRequest,
};
use murmur_shared::message::{OutgoingMessage, ServerMessage};
use murmur_shared::protocol::{ClientEvent, ServerEvent};
use murmur_shared::types::{AuthUser, MessageId, Peer, UserId};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn user(id: &str, name: &str) -> AuthUser {
    AuthUser {
        id: UserId::from(id),
        full_name: name.to_string(),
        email: format!("{id}@example.com"),
        profile_pic: None,
        created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
    }
}

pub fn peer(id: &str, name: &str) -> Peer {
    Peer {
        id: UserId::from(id),
        full_name: name.to_string(),
        profile_pic: None,
        last_seen: None,
    }
}

pub fn message(id: &str, from: &str, to: &str, text: &str) -> ServerMessage {
    ServerMessage {
        id: MessageId::from(id),
        sender_id: UserId::from(from),
        receiver_id: UserId::from(to),
        text: Some(text.to_string()),
        image: None,
        created_at: Utc::now(),
        edited_at: None,
        seen_at: None,
        seen: false,
        seen_by: None,
        edited: false,
        deleted: false,
    }
}

pub fn rejected(op: &str) -> ApiError {
    ApiError::Server {
        status: 400,
        message: Some(format!("{op} rejected")),
    }
}

/// Let spawned tasks (dispatcher, timers) run to quiescence.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

// ---------------------------------------------------------------------------
// FakeApi
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeData {
    pub session: Option<AuthUser>,
    pub accounts: HashMap<String, AuthUser>,
    pub contacts: Vec<Peer>,
    pub histories: HashMap<UserId, Vec<ServerMessage>>,
    pub sent: Vec<(UserId, OutgoingMessage)>,
    pub next_id: u32,
    pub logouts: usize,
}

pub struct FakeApi {
    data: Mutex<FakeData>,
    failing: Mutex<HashSet<&'static str>>,
    holds: Mutex<HashMap<&'static str, Arc<Notify>>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self {
            data: Mutex::new(FakeData::default()),
            failing: Mutex::new(HashSet::new()),
            holds: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_data<R>(&self, f: impl FnOnce(&mut FakeData) -> R) -> R {
        f(&mut self.data.lock().unwrap())
    }

    /// Make every later call of `op` fail with a 400 and a backend message.
    pub fn fail(&self, op: &'static str) {
        self.failing.lock().unwrap().insert(op);
    }

    pub fn recover(&self, op: &'static str) {
        self.failing.lock().unwrap().remove(op);
    }

    /// Make the next call of `op` wait until the returned handle is
    /// notified.
    pub fn hold(&self, op: &'static str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.holds.lock().unwrap().insert(op, gate.clone());
        gate
    }

    async fn enter(&self, op: &'static str) -> Result<(), ApiError> {
        let gate = self.holds.lock().unwrap().remove(op);
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.failing.lock().unwrap().contains(op) {
            return Err(rejected(op));
        }
        Ok(())
    }

    fn find_message(&self, id: &MessageId) -> Option<ServerMessage> {
        self.with_data(|d| {
            d.histories
                .values()
                .flatten()
                .find(|m| &m.id == id)
                .cloned()
        })
    }
}

#[async_trait]
impl ChatApi for FakeApi {
    async fn check_session(&self) -> Result<AuthUser, ApiError> {
        self.enter("check_session").await?;
        self.with_data(|d| d.session.clone())
            .ok_or(ApiError::Unauthorized {
                message: Some("Unauthorized - No Token Provided".into()),
            })
    }

    async fn sign_up(&self, request: &SignUpRequest) -> Result<AuthUser, ApiError> {
        self.enter("sign_up").await?;
        let mut account = user(&request.email.replace('@', "_"), &request.full_name);
        account.email = request.email.clone();
        self.with_data(|d| {
            d.accounts.insert(request.email.clone(), account.clone());
            d.session = Some(account.clone());
        });
        Ok(account)
    }

    async fn login(&self, request: &LoginRequest) -> Result<AuthUser, ApiError> {
        self.enter("login").await?;
        self.with_data(|d| {
            let account = d.accounts.get(&request.email).cloned();
            d.session = account.clone();
            account
        })
        .ok_or(ApiError::Server {
            status: 400,
            message: Some("Invalid credentials".into()),
        })
    }

    async fn logout(&self) -> Result<(), ApiError> {
        self.enter("logout").await?;
        self.with_data(|d| {
            d.session = None;
            d.logouts += 1;
        });
        Ok(())
    }

    async fn update_profile(&self, update: &ProfileUpdate) -> Result<AuthUser, ApiError> {
        self.enter("update_profile").await?;
        self.with_data(|d| {
            let account = d.session.as_mut()?;
            if let Some(pic) = &update.profile_pic {
                account.profile_pic = Some(pic.clone());
            }
            Some(account.clone())
        })
        .ok_or(ApiError::Unauthorized { message: None })
    }

    async fn list_contacts(&self) -> Result<Vec<Peer>, ApiError> {
        self.enter("list_contacts").await?;
        Ok(self.with_data(|d| d.contacts.clone()))
    }

    async fn history(&self, peer: &UserId) -> Result<Vec<ServerMessage>, ApiError> {
        self.enter("history").await?;
        Ok(self.with_data(|d| d.histories.get(peer).cloned().unwrap_or_default()))
    }

    async fn send_message(
        &self,
        peer: &UserId,
        message: &OutgoingMessage,
    ) -> Result<ServerMessage, ApiError> {
        self.enter("send_message").await?;
        self.with_data(|d| {
            let me = d.session.clone().ok_or(ApiError::Unauthorized { message: None })?;
            d.next_id += 1;
            let mut stored = ServerMessage {
                text: message.text.clone(),
                image: message.image.clone(),
                ..self::message(&format!("srv-{}", d.next_id), me.id.as_str(), peer.as_str(), "")
            };
            stored.created_at = Utc::now();
            d.sent.push((peer.clone(), message.clone()));
            d.histories.entry(peer.clone()).or_default().push(stored.clone());
            Ok(stored)
        })
    }

    async fn edit_message(&self, id: &MessageId, text: &str) -> Result<ServerMessage, ApiError> {
        self.enter("edit_message").await?;
        let mut updated = self.find_message(id).ok_or(ApiError::Server {
            status: 404,
            message: Some("Message not found".into()),
        })?;
        updated.text = Some(text.to_string());
        updated.edited = true;
        updated.edited_at = Some(Utc::now());
        Ok(updated)
    }

    async fn delete_message(&self, id: &MessageId) -> Result<(), ApiError> {
        self.enter("delete_message").await?;
        self.find_message(id).map(|_| ()).ok_or(ApiError::Server {
            status: 404,
            message: Some("Message not found".into()),
        })
    }
}

// ---------------------------------------------------------------------------
// FakeConnector
// ---------------------------------------------------------------------------

/// The server side of one realtime connection.
pub struct FakeSocket {
    pub server: mpsc::Sender<RealtimeNotification>,
    pub client: mpsc::Receiver<RealtimeCommand>,
}

impl FakeSocket {
    pub async fn push(&self, event: ServerEvent) {
        // The client may already have hung up.
        let _ = self.server.send(RealtimeNotification::Event(event)).await;
    }

    pub async fn close(&self, reason: &str) {
        let _ = self
            .server
            .send(RealtimeNotification::Disconnected {
                reason: reason.to_string(),
            })
            .await;
    }

    /// Everything the client emitted since the last call.
    pub fn emitted(&mut self) -> Vec<ClientEvent> {
        self.commands()
            .into_iter()
            .filter_map(|c| match c {
                RealtimeCommand::Emit(event) => Some(event),
                RealtimeCommand::Shutdown => None,
            })
            .collect()
    }

    pub fn commands(&mut self) -> Vec<RealtimeCommand> {
        let mut out = Vec::new();
        while let Ok(command) = self.client.try_recv() {
            out.push(command);
        }
        out
    }
}

pub struct FakeConnector {
    connects: AtomicUsize,
    sockets: Mutex<Vec<FakeSocket>>,
    failing: Mutex<bool>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self {
            connects: AtomicUsize::new(0),
            sockets: Mutex::new(Vec::new()),
            failing: Mutex::new(false),
        }
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }

    /// Take the most recently opened socket.
    pub fn take_socket(&self) -> FakeSocket {
        self.sockets
            .lock()
            .unwrap()
            .pop()
            .expect("no realtime connection was opened")
    }
}

#[async_trait]
impl RealtimeConnector for FakeConnector {
    async fn connect(&self, _user_id: &UserId) -> Result<RealtimeLink, RealtimeError> {
        if *self.failing.lock().unwrap() {
            return Err(RealtimeError::Handshake("connection refused".into()));
        }
        self.connects.fetch_add(1, Ordering::SeqCst);
        let (commands_tx, commands_rx) = mpsc::channel(64);
        let (notifications_tx, notifications_rx) = mpsc::channel(64);
        self.sockets.lock().unwrap().push(FakeSocket {
            server: notifications_tx,
            client: commands_rx,
        });
        Ok(RealtimeLink {
            commands: commands_tx,
            notifications: notifications_rx,
        })
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub ctx: AppContext,
    pub api: Arc<FakeApi>,
    pub connector: Arc<FakeConnector>,
}

impl Harness {
    /// Backend with an existing session for Alice and contacts Bob and
    /// Carol.  Nothing is loaded yet.
    pub fn new() -> Self {
        let api = Arc::new(FakeApi::new());
        api.with_data(|d| {
            let alice = user("alice", "Alice");
            d.accounts.insert(alice.email.clone(), alice.clone());
            d.session = Some(alice);
            d.contacts = vec![peer("bob", "Bob"), peer("carol", "Carol")];
        });
        let connector = Arc::new(FakeConnector::new());
        let ctx = AppContext::with_backend(ClientConfig::default(), api.clone(), connector.clone());
        Self { ctx, api, connector }
    }

    /// Restore Alice's session and take the server end of her connection.
    pub async fn logged_in() -> (Self, FakeSocket) {
        let harness = Self::new();
        harness
            .ctx
            .session()
            .check_session()
            .await
            .expect("fixture session");
        let socket = harness.connector.take_socket();
        (harness, socket)
    }

    pub fn me(&self) -> UserId {
        UserId::from("alice")
    }
}
