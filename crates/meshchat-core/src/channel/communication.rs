//! CSP Channel Communication Protocol Types
//!
//! This module defines the typed communication protocol between the router
//! and its collaborators. All inter-task communication flows through these
//! channel message types.

use core::fmt;
use serde::{Deserialize, Serialize};

use crate::message::{DeliveryStatus, LogScope, Message};
use crate::receipts::FocusState;
use crate::types::{ChannelKey, ChannelName, MessageId, PeerId, Timestamp};

// ----------------------------------------------------------------------------
// Event: Transport → Router
// ----------------------------------------------------------------------------

/// Inbound protocol events delivered by the transport collaborator.
///
/// The same logical event may arrive more than once, over different links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Event {
    /// A chat message (public, channel or private)
    MessageReceived { message: Message },
    /// A link to a peer came up
    PeerConnected { peer_id: PeerId, timestamp: Timestamp },
    /// A link to a peer went down
    PeerDisconnected { peer_id: PeerId, timestamp: Timestamp },
    /// Wholesale replacement of the reachable peer list
    PeerListUpdated { peers: Vec<PeerId> },
    /// A peer announced it left a channel
    ChannelLeave {
        channel: ChannelName,
        from: PeerId,
        timestamp: Timestamp,
    },
    /// A peer confirmed delivery of one of our messages
    DeliveryAck {
        message_id: MessageId,
        from: PeerId,
        by: String,
        at: Timestamp,
    },
    /// A peer confirmed reading one of our messages
    ReadReceipt {
        message_id: MessageId,
        from: PeerId,
        by: String,
        at: Timestamp,
    },
}

/// Classification of inbound events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    ChatMessage,
    PeerConnect,
    PeerDisconnect,
    PeerList,
    ChannelLeave,
    DeliveryAck,
    ReadReceipt,
}

impl EventKind {
    /// Stable tag mixed into fingerprints
    pub fn tag(&self) -> u8 {
        match self {
            EventKind::ChatMessage => 1,
            EventKind::PeerConnect => 2,
            EventKind::PeerDisconnect => 3,
            EventKind::PeerList => 4,
            EventKind::ChannelLeave => 5,
            EventKind::DeliveryAck => 6,
            EventKind::ReadReceipt => 7,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::ChatMessage => "chat-message",
            EventKind::PeerConnect => "peer-connect",
            EventKind::PeerDisconnect => "peer-disconnect",
            EventKind::PeerList => "peer-list",
            EventKind::ChannelLeave => "channel-leave",
            EventKind::DeliveryAck => "delivery-ack",
            EventKind::ReadReceipt => "read-receipt",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::MessageReceived { .. } => EventKind::ChatMessage,
            Event::PeerConnected { .. } => EventKind::PeerConnect,
            Event::PeerDisconnected { .. } => EventKind::PeerDisconnect,
            Event::PeerListUpdated { .. } => EventKind::PeerList,
            Event::ChannelLeave { .. } => EventKind::ChannelLeave,
            Event::DeliveryAck { .. } => EventKind::DeliveryAck,
            Event::ReadReceipt { .. } => EventKind::ReadReceipt,
        }
    }
}

// ----------------------------------------------------------------------------
// Command: UI/External → Router
// ----------------------------------------------------------------------------

/// Commands sent from the UI to the router, serialized with inbound events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    /// Replace the externally owned focus state
    UpdateFocus { focus: FocusState },
    /// Join (or re-key) a channel
    JoinChannel {
        channel: ChannelName,
        key: Option<ChannelKey>,
    },
    /// Leave a channel and announce it to the mesh
    LeaveChannel { channel: ChannelName },
    BlockPeer { peer_id: PeerId },
    UnblockPeer { peer_id: PeerId },
    ToggleFavorite { peer_id: PeerId },
    /// Record and transmit a locally-authored message
    SendMessage { message: Message },
    /// Explicit "mark read": receipt every unreceipted message from the peer
    MarkConversationRead { peer_id: PeerId },
    /// Stop consuming events
    Shutdown,
}

// ----------------------------------------------------------------------------
// Effect: Router → External Boundaries (fire-and-forget)
// ----------------------------------------------------------------------------

/// Kind of user notification requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    PrivateMessage,
}

/// Payload handed to the notification boundary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub sender_peer_id: PeerId,
    pub sender_nickname: String,
    pub content: String,
}

/// Side effects requested by the router.
///
/// Effects are dispatched without waiting for a response; the router never
/// blocks on the collaborator that performs them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    /// Transport: tell `to` we read `message_id`
    SendReadReceipt { message_id: MessageId, to: PeerId },
    /// Transport: tell `to` we received `message_id`
    SendDeliveryAck { message_id: MessageId, to: PeerId },
    /// Transport: transmit a locally-authored message
    SendMessage { message: Message },
    /// Transport: announce that we left a channel
    SendChannelLeave { channel: ChannelName },
    /// Notification surface
    Notify(Notification),
    /// Haptic feedback for a newly accepted message
    Haptic,
    /// UI: the private chat with this peer must be closed
    ClosePrivateChat { peer_id: PeerId },
}

// ----------------------------------------------------------------------------
// AppEvent: Router → UI (State Changes Only)
// ----------------------------------------------------------------------------

/// State changes the UI may want to react to without polling snapshots
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppEvent {
    MessageAdded {
        scope: LogScope,
        message_id: MessageId,
    },
    DeliveryStatusChanged {
        message_id: MessageId,
        status: DeliveryStatus,
    },
    PeersChanged {
        connected: Vec<PeerId>,
        joined: Vec<PeerId>,
        left: Vec<PeerId>,
    },
    ChannelMembersChanged {
        channel: ChannelName,
        members: Vec<PeerId>,
    },
    ChannelJoined { channel: ChannelName },
    ChannelLeft { channel: ChannelName },
    PrivateChatClosed { peer_id: PeerId },
}
