//! Application context.
//!
//! Builds both stores over one backend, wires the event bridge between
//! them and owns everything for the lifetime of the application.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::info;

use murmur_net::{ChatApi, HttpApi, RealtimeConnector, WsConnector};

use crate::bridge::EventBridge;
use crate::config::ClientConfig;
use crate::conversation::ConversationStore;
use crate::error::ClientError;
use crate::events::{EventSink, StoreEvent};
use crate::session::{RealtimeListener, SessionStore};

pub struct AppContext {
    config: ClientConfig,
    events: EventSink,
    session: SessionStore,
    conversations: ConversationStore,
    // Keeps the listener alive; the session only holds it weakly.
    _bridge: Arc<EventBridge>,
}

impl AppContext {
    /// Context talking to the HTTP API and WebSocket endpoint in `config`.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let api = HttpApi::new(&config.api_url, config.request_timeout)?;
        let connector = WsConnector::new(&config.socket_url, config.event_buffer)?;
        Ok(Self::with_backend(config, Arc::new(api), Arc::new(connector)))
    }

    /// Context over arbitrary backend implementations.
    pub fn with_backend(
        config: ClientConfig,
        api: Arc<dyn ChatApi>,
        connector: Arc<dyn RealtimeConnector>,
    ) -> Self {
        let events = EventSink::new(config.event_buffer);
        let session = SessionStore::new(api.clone(), connector, events.clone());
        let conversations = ConversationStore::new(api, session.clone(), events.clone(), &config);

        let bridge = Arc::new(EventBridge::new(conversations.clone()));
        let listener: Arc<dyn RealtimeListener> = bridge.clone();
        session.attach_listener(Arc::downgrade(&listener));

        Self {
            config,
            events,
            session,
            conversations,
            _bridge: bridge,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn conversations(&self) -> &ConversationStore {
        &self.conversations
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    /// Close the conversation view and the realtime channel.
    pub fn shutdown(&self) {
        self.conversations.close_conversation();
        self.session.disconnect_realtime();
        info!("Client shut down");
    }
}
