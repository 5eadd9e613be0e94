//! Delivery status tracking for locally-sent messages
//!
//! Each tracked message walks the `Sent → Delivered → Read` order driven by
//! acknowledgement events. Acks may arrive late, twice, or out of order; the
//! tracker only ever moves a message forward.

use alloc::collections::{BTreeMap, VecDeque};
use hashbrown::HashMap;

use crate::config::DeliveryConfig;
use crate::message::{AckKind, DeliveryStatus};
use crate::types::{MessageId, Timestamp};

// ----------------------------------------------------------------------------
// Ack Outcome
// ----------------------------------------------------------------------------

/// Result of applying an acknowledgement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AckOutcome {
    /// Status moved forward
    Advanced {
        previous: DeliveryStatus,
        current: DeliveryStatus,
    },
    /// Ack was not later than the current status; nothing changed
    Stale { current: DeliveryStatus },
    /// No tracked message with this id (evicted or never sent locally)
    UnknownMessage,
}

impl AckOutcome {
    pub fn is_advanced(&self) -> bool {
        matches!(self, AckOutcome::Advanced { .. })
    }
}

// ----------------------------------------------------------------------------
// Delivery Tracker
// ----------------------------------------------------------------------------

/// Tracks delivery status of outgoing messages, keyed by message id
#[derive(Debug, Clone)]
pub struct DeliveryTracker {
    config: DeliveryConfig,
    statuses: HashMap<MessageId, DeliveryStatus>,
    /// Insertion order, for evicting the oldest entries
    order: VecDeque<MessageId>,
}

impl DeliveryTracker {
    pub fn new() -> Self {
        Self::with_config(DeliveryConfig::default())
    }

    pub fn with_config(config: DeliveryConfig) -> Self {
        Self {
            config,
            statuses: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    /// Start tracking a message at `Sent`. Returns false if already tracked.
    pub fn track(&mut self, message_id: MessageId) -> bool {
        if self.statuses.contains_key(&message_id) {
            return false;
        }

        while self.statuses.len() >= self.config.max_tracked.max(1) {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.statuses.remove(&oldest);
                }
                None => break,
            }
        }

        self.statuses.insert(message_id, DeliveryStatus::Sent);
        self.order.push_back(message_id);
        true
    }

    /// Apply a delivery ack or read receipt.
    ///
    /// The status changes only when the ack is strictly later in the
    /// `Sent < Delivered < Read` order; a `Read` may skip `Delivered`.
    pub fn record_ack(
        &mut self,
        message_id: &MessageId,
        kind: AckKind,
        by: impl Into<String>,
        at: Timestamp,
    ) -> AckOutcome {
        let Some(current) = self.statuses.get_mut(message_id) else {
            return AckOutcome::UnknownMessage;
        };

        let next = DeliveryStatus::from_ack(kind, by.into(), at);
        if next.rank() <= current.rank() {
            return AckOutcome::Stale {
                current: current.clone(),
            };
        }

        let previous = core::mem::replace(current, next.clone());
        AckOutcome::Advanced {
            previous,
            current: next,
        }
    }

    pub fn status(&self, message_id: &MessageId) -> Option<&DeliveryStatus> {
        self.statuses.get(message_id)
    }

    pub fn is_tracked(&self, message_id: &MessageId) -> bool {
        self.statuses.contains_key(message_id)
    }

    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }

    /// Point-in-time copy of every tracked status
    pub fn snapshot(&self) -> BTreeMap<MessageId, DeliveryStatus> {
        self.statuses
            .iter()
            .map(|(id, status)| (*id, status.clone()))
            .collect()
    }
}

impl Default for DeliveryTracker {
    fn default() -> Self {
        Self::new()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
