//! Private conversations, blocked peers and favourites

use alloc::collections::{BTreeMap, BTreeSet};

use crate::message::{Message, MessageLog};
use crate::types::PeerId;

/// Per-peer private message logs plus the local block and favourite lists
#[derive(Debug, Clone)]
pub struct PrivateChats {
    logs: BTreeMap<PeerId, MessageLog>,
    blocked: BTreeSet<PeerId>,
    favorites: BTreeSet<PeerId>,
    max_log_len: usize,
}

impl PrivateChats {
    pub fn new(max_log_len: usize) -> Self {
        Self {
            logs: BTreeMap::new(),
            blocked: BTreeSet::new(),
            favorites: BTreeSet::new(),
            max_log_len,
        }
    }

    /// Append to the conversation with `peer_id`
    pub fn record(&mut self, peer_id: PeerId, message: Message) {
        let max_log_len = self.max_log_len;
        self.logs
            .entry(peer_id)
            .or_insert_with(|| MessageLog::new(max_log_len))
            .push(message);
    }

    pub fn log(&self, peer_id: &PeerId) -> Option<&MessageLog> {
        self.logs.get(peer_id)
    }

    pub fn logs(&self) -> impl Iterator<Item = (&PeerId, &MessageLog)> {
        self.logs.iter()
    }

    /// Returns true if the peer was not blocked before
    pub fn block(&mut self, peer_id: PeerId) -> bool {
        self.blocked.insert(peer_id)
    }

    pub fn unblock(&mut self, peer_id: &PeerId) -> bool {
        self.blocked.remove(peer_id)
    }

    pub fn is_blocked(&self, peer_id: &PeerId) -> bool {
        self.blocked.contains(peer_id)
    }

    pub fn blocked(&self) -> &BTreeSet<PeerId> {
        &self.blocked
    }

    /// Flip favourite status; returns the new state
    pub fn toggle_favorite(&mut self, peer_id: PeerId) -> bool {
        if self.favorites.remove(&peer_id) {
            false
        } else {
            self.favorites.insert(peer_id);
            true
        }
    }

    pub fn is_favorite(&self, peer_id: &PeerId) -> bool {
        self.favorites.contains(peer_id)
    }

    pub fn favorites(&self) -> &BTreeSet<PeerId> {
        &self.favorites
    }
}
