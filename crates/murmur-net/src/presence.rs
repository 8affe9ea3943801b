//! Presence tracking.
//!
//! Holds the server's authoritative set of connected user ids.  Every
//! broadcast replaces the set wholesale; entries are never merged.

use std::collections::HashSet;

use tracing::debug;

use murmur_shared::types::UserId;

#[derive(Debug, Clone, Default)]
pub struct PresenceSet {
    online: HashSet<UserId>,
}

impl PresenceSet {
    /// Create a new, empty presence set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the set with the ids from a server broadcast.
    pub fn replace(&mut self, ids: Vec<UserId>) {
        self.online = ids.into_iter().collect();
        debug!(count = self.online.len(), "Presence set replaced");
    }

    pub fn clear(&mut self) {
        self.online.clear();
    }

    /// Check whether a given user is currently connected.
    pub fn is_online(&self, id: &UserId) -> bool {
        self.online.contains(id)
    }

    /// Return the number of connected users, ourselves included.
    pub fn len(&self) -> usize {
        self.online.len()
    }

    pub fn is_empty(&self) -> bool {
        self.online.is_empty()
    }

    /// Number of connected users other than `me`.
    pub fn online_count_excluding(&self, me: &UserId) -> usize {
        self.online.iter().filter(|id| *id != me).count()
    }

    /// Sorted snapshot of the connected ids.
    pub fn ids(&self) -> Vec<UserId> {
        let mut ids: Vec<UserId> = self.online.iter().cloned().collect();
        ids.sort();
        ids
    }
}
