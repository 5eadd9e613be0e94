//! MeshChat Routing Core
//!
//! Message routing and delivery-state core for a peer-to-peer mesh chat
//! client. Inbound protocol events are deduplicated, dispatched by kind to the
//! component that owns them, and turned into state changes plus fire-and-forget
//! effects. The core performs no I/O of its own: transport, notifications,
//! haptics and decryption are collaborators reached through [`Effect`]s and
//! the [`ports`] traits.

extern crate alloc;

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod channel;
pub mod config;
pub mod dedup;
pub mod delivery;
pub mod errors;
pub mod message;
pub mod ports;
pub mod presence;
pub mod private_chat;
pub mod receipts;
pub mod roster;
pub mod router;
pub mod snapshot;
pub mod types;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use channel::{AppEvent, Command, Effect, Event, EventKind, Notification, NotificationKind};
pub use config::MeshConfig;
pub use dedup::{DedupLedger, DedupStats, EventFingerprint};
pub use delivery::{AckOutcome, DeliveryTracker};
pub use errors::{CryptographicError, MeshError, MeshResult, Result};
pub use message::{AckKind, DeliveryStatus, LogScope, Message, MessageContent, MessageLog, Visibility};
pub use ports::{ChannelCipher, NoChannelCipher};
pub use presence::{ConnectedPeerSet, PresenceReconciler, PresenceReport};
pub use receipts::{FocusState, ReceiptDispatcher};
pub use roster::ChannelRoster;
pub use router::{EventRouter, RouteOutcome, Routed, RouterStats, SoftMiss};
pub use snapshot::MeshSnapshot;
pub use types::{ChannelKey, ChannelName, MessageId, PeerId, SystemTimeSource, TimeSource, Timestamp};
