//! Point-in-time snapshots for readers outside the router

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::sync::Arc;
use serde::Serialize;

use crate::dedup::DedupStats;
use crate::message::{DeliveryStatus, Message, MessageContent};
use crate::receipts::FocusState;
use crate::router::RouterStats;
use crate::types::{ChannelName, MessageId, PeerId};

/// A joined channel as seen at snapshot time
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelSnapshot {
    pub members: BTreeSet<PeerId>,
    pub log: Arc<Vec<Message>>,
}

/// Immutable copy of the router's reader-visible state.
///
/// Logs and the connected set are shared `Arc`s; the router replaces rather
/// than mutates them once a snapshot holds a reference.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MeshSnapshot {
    pub local_peer: Option<PeerId>,
    pub connected: Arc<BTreeSet<PeerId>>,
    pub public_log: Arc<Vec<Message>>,
    pub channels: BTreeMap<ChannelName, ChannelSnapshot>,
    pub private_chats: BTreeMap<PeerId, Arc<Vec<Message>>>,
    pub delivery: BTreeMap<MessageId, DeliveryStatus>,
    pub blocked: BTreeSet<PeerId>,
    pub favorites: BTreeSet<PeerId>,
    pub focus: FocusState,
    pub router_stats: RouterStats,
    pub dedup_stats: DedupStats,
    /// Text shown for content that could not be decrypted
    pub placeholder: String,
}

impl MeshSnapshot {
    pub fn is_connected(&self, peer_id: &PeerId) -> bool {
        self.connected.contains(peer_id)
    }

    pub fn channel_members(&self, channel: &ChannelName) -> Option<&BTreeSet<PeerId>> {
        self.channels.get(channel).map(|snapshot| &snapshot.members)
    }

    pub fn channel_log(&self, channel: &ChannelName) -> Option<&[Message]> {
        self.channels.get(channel).map(|snapshot| snapshot.log.as_slice())
    }

    pub fn private_log(&self, peer_id: &PeerId) -> Option<&[Message]> {
        self.private_chats.get(peer_id).map(|log| log.as_slice())
    }

    pub fn status(&self, message_id: &MessageId) -> Option<&DeliveryStatus> {
        self.delivery.get(message_id)
    }

    /// Text to render for a message body
    pub fn display_text<'a>(&'a self, message: &'a Message) -> &'a str {
        match &message.content {
            MessageContent::Text(text) => text,
            MessageContent::Encrypted(_) | MessageContent::Unavailable => &self.placeholder,
        }
    }
}
