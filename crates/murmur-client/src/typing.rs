//! Typing indicator debounce.
//!
//! A start signal goes out once per burst of keystrokes; the stop signal
//! goes out after a quiet period with no keystroke, or immediately on
//! [`TypingDebouncer::flush`].

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use murmur_shared::types::UserId;

use crate::session::SessionStore;
use crate::state::lock;

#[derive(Default)]
struct Burst {
    /// Peer the current burst is addressed to; `None` when idle.
    peer: Option<UserId>,
    timer: Option<JoinHandle<()>>,
    /// Bumped on every keystroke so a timer that lost an abort race does
    /// not fire.
    generation: u64,
}

#[derive(Clone)]
pub struct TypingDebouncer {
    session: SessionStore,
    delay: Duration,
    burst: Arc<Mutex<Burst>>,
}

impl TypingDebouncer {
    pub fn new(session: SessionStore, delay: Duration) -> Self {
        Self {
            session,
            delay,
            burst: Arc::new(Mutex::new(Burst::default())),
        }
    }

    pub fn is_typing(&self) -> bool {
        lock(&self.burst).peer.is_some()
    }

    /// Record a keystroke in the conversation with `peer`.
    pub fn keystroke(&self, peer: &UserId) {
        let (start, stop_previous, generation) = {
            let mut burst = lock(&self.burst);
            if let Some(timer) = burst.timer.take() {
                timer.abort();
            }
            burst.generation += 1;

            let stop_previous = match burst.peer.as_ref() {
                Some(current) if current != peer => burst.peer.take(),
                _ => None,
            };
            let start = burst.peer.is_none();
            burst.peer = Some(peer.clone());
            (start, stop_previous, burst.generation)
        };

        if let Some(previous) = stop_previous {
            self.session.emit_typing_stop(&previous);
        }
        if start {
            debug!(peer = %peer, "Typing started");
            self.session.emit_typing_start(peer);
        }

        let this = self.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(this.delay).await;
            this.expire(generation);
        });

        let mut burst = lock(&self.burst);
        if burst.generation == generation {
            burst.timer = Some(timer);
        } else {
            // A newer keystroke already replaced this one.
            timer.abort();
        }
    }

    fn expire(&self, generation: u64) {
        let peer = {
            let mut burst = lock(&self.burst);
            if burst.generation != generation {
                return;
            }
            burst.timer = None;
            burst.peer.take()
        };
        if let Some(peer) = peer {
            debug!(peer = %peer, "Typing stopped after quiet period");
            self.session.emit_typing_stop(&peer);
        }
    }

    /// End the current burst now.  Returns `true` if a stop signal was sent.
    pub fn flush(&self) -> bool {
        let peer = {
            let mut burst = lock(&self.burst);
            if let Some(timer) = burst.timer.take() {
                timer.abort();
            }
            burst.generation += 1;
            burst.peer.take()
        };
        match peer {
            Some(peer) => {
                self.session.emit_typing_stop(&peer);
                true
            }
            None => false,
        }
    }
}
