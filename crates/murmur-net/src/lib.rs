// Backend-facing layer: REST client and realtime WebSocket transport.

pub mod api;
pub mod error;
pub mod http;
pub mod presence;
pub mod realtime;
pub mod ws;

pub use api::{ChatApi, EditRequest, LoginRequest, ProfileUpdate, SignUpRequest};
pub use error::{ApiError, RealtimeError};
pub use http::HttpApi;
pub use presence::PresenceSet;
pub use realtime::{RealtimeCommand, RealtimeConnector, RealtimeLink, RealtimeNotification};
pub use ws::WsConnector;
