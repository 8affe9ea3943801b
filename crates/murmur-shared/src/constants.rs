/// Application name
pub const APP_NAME: &str = "Murmur";

/// Default REST API base URL (local development backend)
pub const DEFAULT_API_URL: &str = "http://localhost:3000/api";

/// Default realtime endpoint
pub const DEFAULT_SOCKET_URL: &str = "ws://localhost:3000/ws";

/// Quiet period after the last keystroke before a stop-typing signal is sent
pub const TYPING_STOP_DELAY_MS: u64 = 2_000;

/// Window that coalesces newly observed messages into one seen acknowledgement
pub const SEEN_FLUSH_DELAY_MS: u64 = 300;

/// Default HTTP request timeout in seconds
pub const REQUEST_TIMEOUT_SECS: u64 = 15;

/// Capacity of the store event broadcast and realtime channels
pub const EVENT_BUFFER: usize = 256;

/// Unread counts above this render as "N+"
pub const UNREAD_BADGE_CAP: u32 = 9;

/// Fallback text for failures that carry no backend message
pub const GENERIC_ERROR_MESSAGE: &str = "Something went wrong";
