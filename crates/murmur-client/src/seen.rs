//! Seen acknowledgement throttle.
//!
//! Inbound message ids observed in the active conversation are collected
//! into a batch that is flushed as one `messageSeen` signal after a short
//! window.  Each id is queued at most once until [`SeenThrottle::reset`].

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use murmur_shared::types::{MessageId, UserId};

use crate::session::SessionStore;
use crate::state::lock;

#[derive(Default)]
struct SeenQueue {
    peer: Option<UserId>,
    queued: HashSet<MessageId>,
    batch: Vec<MessageId>,
    timer: Option<JoinHandle<()>>,
    generation: u64,
}

impl SeenQueue {
    fn clear(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        self.generation += 1;
        self.peer = None;
        self.queued.clear();
        self.batch.clear();
    }
}

#[derive(Clone)]
pub struct SeenThrottle {
    session: SessionStore,
    delay: Duration,
    queue: Arc<Mutex<SeenQueue>>,
}

impl SeenThrottle {
    pub fn new(session: SessionStore, delay: Duration) -> Self {
        Self {
            session,
            delay,
            queue: Arc::new(Mutex::new(SeenQueue::default())),
        }
    }

    /// Queue inbound messages from `peer` for acknowledgement.  Returns how
    /// many ids were newly queued.
    pub fn observe(&self, peer: &UserId, ids: impl IntoIterator<Item = MessageId>) -> usize {
        let mut queue = lock(&self.queue);
        if queue.peer.as_ref() != Some(peer) {
            queue.clear();
            queue.peer = Some(peer.clone());
        }

        let mut added = 0;
        for id in ids {
            if queue.queued.insert(id.clone()) {
                queue.batch.push(id);
                added += 1;
            }
        }

        if !queue.batch.is_empty() && queue.timer.is_none() {
            let generation = queue.generation;
            let this = self.clone();
            queue.timer = Some(tokio::spawn(async move {
                tokio::time::sleep(this.delay).await;
                this.flush_batch(generation);
            }));
        }
        added
    }

    fn flush_batch(&self, generation: u64) {
        let (peer, batch) = {
            let mut queue = lock(&self.queue);
            if queue.generation != generation {
                return;
            }
            queue.timer = None;
            (queue.peer.clone(), std::mem::take(&mut queue.batch))
        };
        if let Some(peer) = peer {
            debug!(peer = %peer, count = batch.len(), "Flushing seen acknowledgements");
            self.session.emit_message_seen(&peer, batch);
        }
    }

    /// Forget everything queued and drop any unsent batch.
    pub fn reset(&self) {
        lock(&self.queue).clear();
    }

    pub fn pending(&self) -> usize {
        lock(&self.queue).batch.len()
    }
}
