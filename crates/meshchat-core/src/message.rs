//! Chat messages, delivery status and append-only message logs

use alloc::sync::Arc;
use core::fmt;
use serde::{Deserialize, Serialize};

use crate::types::{ChannelName, MessageId, PeerId, Timestamp};

/// Display name used for synthesized system messages
pub const SYSTEM_SENDER: &str = "system";

// ----------------------------------------------------------------------------
// Message Content
// ----------------------------------------------------------------------------

/// Body of a message as it sits in a log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageContent {
    /// Plaintext body
    Text(String),
    /// Channel ciphertext still awaiting the decrypt capability
    Encrypted(Vec<u8>),
    /// Ciphertext that could not be decrypted; rendered as a placeholder
    Unavailable,
}

impl MessageContent {
    pub fn text(text: impl Into<String>) -> Self {
        MessageContent::Text(text.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessageContent::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn is_encrypted(&self) -> bool {
        matches!(self, MessageContent::Encrypted(_))
    }

    /// Bytes that identify the content for fingerprinting
    pub(crate) fn fingerprint_bytes(&self) -> &[u8] {
        match self {
            MessageContent::Text(text) => text.as_bytes(),
            MessageContent::Encrypted(bytes) => bytes,
            MessageContent::Unavailable => &[],
        }
    }
}

// ----------------------------------------------------------------------------
// Visibility
// ----------------------------------------------------------------------------

/// Audience of a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Broadcast to every reachable peer
    Public,
    /// Posted to a named channel
    Channel(ChannelName),
    /// Addressed to a single peer
    Private { recipient: PeerId },
}

// ----------------------------------------------------------------------------
// Message
// ----------------------------------------------------------------------------

/// An immutable chat message.
///
/// Once a log accepts a message it is never modified; delivery progress lives
/// in the [`DeliveryTracker`](crate::delivery::DeliveryTracker) keyed by `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    /// Sender display name (nickname, or the peer id when none was announced)
    pub sender: String,
    pub sender_peer_id: Option<PeerId>,
    pub content: MessageContent,
    pub timestamp: Timestamp,
    pub visibility: Visibility,
}

impl Message {
    pub fn new(
        sender: impl Into<String>,
        sender_peer_id: Option<PeerId>,
        content: MessageContent,
        timestamp: Timestamp,
        visibility: Visibility,
    ) -> Self {
        Self {
            id: MessageId::new(),
            sender: sender.into(),
            sender_peer_id,
            content,
            timestamp,
            visibility,
        }
    }

    /// A public system line such as "<peer> connected"
    pub fn system(text: impl Into<String>, timestamp: Timestamp) -> Self {
        Self::new(
            SYSTEM_SENDER,
            None,
            MessageContent::Text(text.into()),
            timestamp,
            Visibility::Public,
        )
    }

    pub fn with_id(mut self, id: MessageId) -> Self {
        self.id = id;
        self
    }

    pub fn is_private(&self) -> bool {
        matches!(self.visibility, Visibility::Private { .. })
    }

    pub fn channel(&self) -> Option<&ChannelName> {
        match &self.visibility {
            Visibility::Channel(channel) => Some(channel),
            _ => None,
        }
    }

    /// Copy of this message carrying resolved content
    pub(crate) fn with_content(&self, content: MessageContent) -> Self {
        Self {
            content,
            ..self.clone()
        }
    }

    /// Name shown in notifications: the nickname unless it is just the peer id
    pub fn display_name(&self) -> String {
        match self.sender_peer_id {
            Some(peer_id) if self.sender == peer_id.to_string() || self.sender.is_empty() => {
                peer_id.to_string()
            }
            _ => self.sender.clone(),
        }
    }
}

// ----------------------------------------------------------------------------
// Delivery Status
// ----------------------------------------------------------------------------

/// Kind of acknowledgement received for a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckKind {
    Delivered,
    Read,
}

/// Delivery progress of a locally-sent message.
///
/// Ordered `Sent < Delivered < Read`; the tracker never moves a message
/// backwards along that order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Sent,
    Delivered { by: String, at: Timestamp },
    Read { by: String, at: Timestamp },
}

impl DeliveryStatus {
    /// Position in the Sent < Delivered < Read order
    pub fn rank(&self) -> u8 {
        match self {
            DeliveryStatus::Sent => 0,
            DeliveryStatus::Delivered { .. } => 1,
            DeliveryStatus::Read { .. } => 2,
        }
    }

    pub fn from_ack(kind: AckKind, by: String, at: Timestamp) -> Self {
        match kind {
            AckKind::Delivered => DeliveryStatus::Delivered { by, at },
            AckKind::Read => DeliveryStatus::Read { by, at },
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryStatus::Sent => write!(f, "sent"),
            DeliveryStatus::Delivered { by, .. } => write!(f, "delivered to {}", by),
            DeliveryStatus::Read { by, .. } => write!(f, "read by {}", by),
        }
    }
}

// ----------------------------------------------------------------------------
// Log Scope
// ----------------------------------------------------------------------------

/// Which log a message landed in
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogScope {
    Public,
    Channel(ChannelName),
    Private(PeerId),
}

// ----------------------------------------------------------------------------
// Message Log
// ----------------------------------------------------------------------------

/// Append-only, bounded message log with copy-on-write snapshots.
///
/// `snapshot` hands out the current `Arc`; a later `push` clones the backing
/// vector only while an older snapshot is still alive, so readers never see a
/// log change underneath them.
#[derive(Debug, Clone)]
pub struct MessageLog {
    entries: Arc<Vec<Message>>,
    max_len: usize,
}

impl MessageLog {
    pub fn new(max_len: usize) -> Self {
        Self {
            entries: Arc::new(Vec::new()),
            max_len: max_len.max(1),
        }
    }

    /// Append a message, dropping the oldest entries beyond capacity
    pub fn push(&mut self, message: Message) {
        let entries = Arc::make_mut(&mut self.entries);
        entries.push(message);
        if entries.len() > self.max_len {
            let excess = entries.len() - self.max_len;
            entries.drain(..excess);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.entries.iter()
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.entries.iter().any(|message| &message.id == id)
    }

    pub fn snapshot(&self) -> Arc<Vec<Message>> {
        Arc::clone(&self.entries)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn text_message(text: &str) -> Message {
        Message::new(
            "alice",
            None,
            MessageContent::text(text),
            Timestamp::new(1),
            Visibility::Public,
        )
    }

    #[test]
    fn test_status_ordering() {
        let delivered = DeliveryStatus::from_ack(AckKind::Delivered, "bob".into(), Timestamp::new(1));
        let read = DeliveryStatus::from_ack(AckKind::Read, "bob".into(), Timestamp::new(2));
        assert!(DeliveryStatus::Sent.rank() < delivered.rank());
        assert!(delivered.rank() < read.rank());
        assert_eq!(read.to_string(), "read by bob");
    }

    #[test]
    fn test_log_is_bounded() {
        let mut log = MessageLog::new(2);
        log.push(text_message("one"));
        log.push(text_message("two"));
        log.push(text_message("three"));

        let texts: Vec<_> = log.iter().filter_map(|m| m.content.as_text()).collect();
        assert_eq!(texts, vec!["two", "three"]);
    }

    #[test]
    fn test_snapshot_is_point_in_time() {
        let mut log = MessageLog::new(10);
        log.push(text_message("before"));
        let snapshot = log.snapshot();

        log.push(text_message("after"));
        assert_eq!(snapshot.len(), 1);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_display_name_falls_back_to_peer_id() {
        let peer = PeerId::new([1, 2, 3, 4, 5, 6, 7, 8]);
        let mut message = text_message("hi");
        message.sender_peer_id = Some(peer);
        assert_eq!(message.display_name(), "alice");

        message.sender = peer.to_string();
        assert_eq!(message.display_name(), peer.to_string());
    }
}
