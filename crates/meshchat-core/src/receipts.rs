//! Reactive read receipts
//!
//! A private message gets an immediate read receipt only while the user is
//! looking at that conversation. Otherwise the receipt waits for an explicit
//! "mark read". The dispatcher remembers what it already receipted, so both
//! paths are idempotent.

use alloc::collections::VecDeque;
use hashbrown::HashSet;
use serde::{Deserialize, Serialize};

use crate::channel::communication::Effect;
use crate::config::ReceiptConfig;
use crate::message::MessageLog;
use crate::types::{MessageId, PeerId};

/// What the user is currently looking at. Owned by the UI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FocusState {
    /// Application is in the foreground
    pub foreground: bool,
    /// Private conversation currently open on screen
    pub open_private_chat: Option<PeerId>,
}

impl FocusState {
    pub fn viewing(peer_id: PeerId) -> Self {
        Self {
            foreground: true,
            open_private_chat: Some(peer_id),
        }
    }

    /// True when the conversation with `peer_id` is visible right now
    pub fn is_viewing(&self, peer_id: &PeerId) -> bool {
        self.foreground && self.open_private_chat.as_ref() == Some(peer_id)
    }
}

/// Pure focus check for a private message from `sender`
pub fn should_send_read_receipt(focus: &FocusState, sender: &PeerId) -> bool {
    focus.is_viewing(sender)
}

// ----------------------------------------------------------------------------
// Receipt Dispatcher
// ----------------------------------------------------------------------------

/// Decides when read receipts go out and remembers which were sent
#[derive(Debug, Clone)]
pub struct ReceiptDispatcher {
    config: ReceiptConfig,
    receipted: HashSet<MessageId>,
    /// Insertion order for bounding `receipted`
    order: VecDeque<MessageId>,
}

impl ReceiptDispatcher {
    pub fn new(config: ReceiptConfig) -> Self {
        Self {
            config,
            receipted: HashSet::new(),
            order: VecDeque::new(),
        }
    }

    /// Reactive path for a newly accepted private message
    pub fn on_private_message(
        &mut self,
        focus: &FocusState,
        message_id: MessageId,
        sender: PeerId,
    ) -> Option<Effect> {
        if !should_send_read_receipt(focus, &sender) {
            return None;
        }
        self.receipt(message_id, sender)
    }

    /// Explicit "mark read": one receipt per unreceipted message from `peer_id`
    pub fn mark_conversation_read(&mut self, peer_id: PeerId, log: &MessageLog) -> Vec<Effect> {
        let inbound: Vec<MessageId> = log
            .iter()
            .filter(|message| message.sender_peer_id == Some(peer_id))
            .map(|message| message.id)
            .collect();

        inbound
            .into_iter()
            .filter_map(|message_id| self.receipt(message_id, peer_id))
            .collect()
    }

    pub fn is_receipted(&self, message_id: &MessageId) -> bool {
        self.receipted.contains(message_id)
    }

    pub fn sends_delivery_acks(&self) -> bool {
        self.config.send_delivery_acks
    }

    fn receipt(&mut self, message_id: MessageId, to: PeerId) -> Option<Effect> {
        if !self.receipted.insert(message_id) {
            return None;
        }

        self.order.push_back(message_id);
        while self.order.len() > self.config.max_remembered.max(1) {
            if let Some(oldest) = self.order.pop_front() {
                self.receipted.remove(&oldest);
            }
        }

        Some(Effect::SendReadReceipt { message_id, to })
    }
}

impl Default for ReceiptDispatcher {
    fn default() -> Self {
        Self::new(ReceiptConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Message, MessageContent, Visibility};
    use crate::types::Timestamp;

    fn peer(n: u8) -> PeerId {
        PeerId::new([n; 8])
    }

    #[test]
    fn test_focus_gating() {
        let p = peer(1);
        assert!(should_send_read_receipt(&FocusState::viewing(p), &p));
        assert!(!should_send_read_receipt(&FocusState::viewing(peer(2)), &p));
        assert!(!should_send_read_receipt(
            &FocusState {
                foreground: false,
                open_private_chat: Some(p)
            },
            &p
        ));
        assert!(!should_send_read_receipt(&FocusState::default(), &p));
    }

    #[test]
    fn test_reactive_receipt_is_idempotent() {
        let mut dispatcher = ReceiptDispatcher::default();
        let p = peer(1);
        let id = MessageId::new();
        let focus = FocusState::viewing(p);

        assert_eq!(
            dispatcher.on_private_message(&focus, id, p),
            Some(Effect::SendReadReceipt { message_id: id, to: p })
        );
        assert_eq!(dispatcher.on_private_message(&focus, id, p), None);
    }

    #[test]
    fn test_mark_read_skips_receipted_and_own_messages() {
        let mut dispatcher = ReceiptDispatcher::default();
        let p = peer(1);
        let me = peer(9);
        let mut log = MessageLog::new(10);

        let inbound = |text: &str| {
            Message::new(
                "bob",
                Some(p),
                MessageContent::text(text),
                Timestamp::new(1),
                Visibility::Private { recipient: me },
            )
        };
        let first = inbound("one");
        let second = inbound("two");
        let mine = Message::new(
            "me",
            Some(me),
            MessageContent::text("reply"),
            Timestamp::new(2),
            Visibility::Private { recipient: p },
        );
        log.push(first.clone());
        log.push(second.clone());
        log.push(mine);

        dispatcher.on_private_message(&FocusState::viewing(p), first.id, p);
        let effects = dispatcher.mark_conversation_read(p, &log);
        assert_eq!(
            effects,
            vec![Effect::SendReadReceipt {
                message_id: second.id,
                to: p
            }]
        );
        assert!(dispatcher.mark_conversation_read(p, &log).is_empty());
    }

    #[test]
    fn test_remembered_ids_are_bounded() {
        let mut dispatcher = ReceiptDispatcher::new(ReceiptConfig {
            max_remembered: 2,
            ..ReceiptConfig::default()
        });
        let p = peer(1);
        let focus = FocusState::viewing(p);
        let ids: Vec<_> = (0..3).map(|_| MessageId::new()).collect();
        for id in &ids {
            dispatcher.on_private_message(&focus, *id, p);
        }

        assert!(!dispatcher.is_receipted(&ids[0]));
        assert!(dispatcher.is_receipted(&ids[2]));
    }
}
