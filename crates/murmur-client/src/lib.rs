pub mod bridge;
pub mod config;
pub mod context;
pub mod conversation;
pub mod error;
pub mod events;
pub mod seen;
pub mod session;
pub mod state;
pub mod typing;

use tracing_subscriber::{fmt, EnvFilter};

pub use config::ClientConfig;
pub use context::AppContext;
pub use conversation::ConversationStore;
pub use error::ClientError;
pub use events::{EventSink, Notice, NoticeLevel, StoreEvent};
pub use session::{RealtimeListener, SessionStore};

/// Install the global tracing subscriber.  `RUST_LOG` overrides the default
/// filter.  Calling it again is harmless.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("murmur_client_lib=debug,murmur_net=info,warn"));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();
}
