//! Event Router
//!
//! The single entry point for inbound events and UI commands. Every event is
//! fingerprinted and admitted through the [`DedupLedger`] before anything else
//! happens, then dispatched by kind to the component that owns it. Handlers
//! never perform I/O: they return the effects and app events to dispatch.

use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::debug;

use crate::channel::communication::{
    AppEvent, Command, Effect, Event, EventKind, Notification, NotificationKind,
};
use crate::config::MeshConfig;
use crate::dedup::{DedupLedger, DedupStats, EventFingerprint, RetentionClass};
use crate::delivery::{AckOutcome, DeliveryTracker};
use crate::errors::Result;
use crate::message::{AckKind, DeliveryStatus, LogScope, Message, MessageContent, MessageLog, Visibility};
use crate::ports::ChannelCipher;
use crate::presence::{PresenceReconciler, PresenceReport};
use crate::private_chat::PrivateChats;
use crate::receipts::{FocusState, ReceiptDispatcher};
use crate::roster::{AddOutcome, ChannelRoster};
use crate::snapshot::{ChannelSnapshot, MeshSnapshot};
use crate::types::{ChannelName, MessageId, PeerId, TimeSource, Timestamp};

// ----------------------------------------------------------------------------
// Route Outcome
// ----------------------------------------------------------------------------

/// A reference to state the router does not have. Logged, never propagated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoftMiss {
    /// Ack for a message that is not tracked (never sent locally, or evicted)
    UnknownMessage { message_id: MessageId },
    /// Leave from a peer that is not a member of the channel
    UnknownMember { channel: ChannelName, peer_id: PeerId },
    /// Command referencing a channel that is not joined
    UnknownChannel { channel: ChannelName },
}

/// How the router disposed of an event or command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteOutcome {
    /// Admitted and applied
    Accepted,
    /// Fingerprint already admitted within its retention window
    Duplicate,
    /// Admitted, then discarded because the sender is blocked
    BlockedSender,
    /// Channel message for a channel that is not joined locally
    NotJoined,
    SoftMiss(SoftMiss),
}

/// Result of routing one event or command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Routed {
    pub outcome: RouteOutcome,
    pub effects: SmallVec<[Effect; 4]>,
    pub app_events: Vec<AppEvent>,
}

impl Routed {
    fn new(outcome: RouteOutcome) -> Self {
        Self {
            outcome,
            effects: SmallVec::new(),
            app_events: Vec::new(),
        }
    }

    fn accepted() -> Self {
        Self::new(RouteOutcome::Accepted)
    }

    fn soft_miss(miss: SoftMiss) -> Self {
        debug!(?miss, "soft miss");
        Self::new(RouteOutcome::SoftMiss(miss))
    }

    pub fn is_accepted(&self) -> bool {
        self.outcome == RouteOutcome::Accepted
    }
}

// ----------------------------------------------------------------------------
// Statistics
// ----------------------------------------------------------------------------

/// Counters for routing decisions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterStats {
    pub events_processed: u64,
    pub commands_processed: u64,
    pub duplicates: u64,
    pub blocked: u64,
    pub not_joined: u64,
    pub soft_misses: u64,
    pub effects_generated: u64,
    pub app_events_generated: u64,
}

impl RouterStats {
    fn record(&mut self, routed: &Routed) {
        match routed.outcome {
            RouteOutcome::Accepted => {}
            RouteOutcome::Duplicate => self.duplicates += 1,
            RouteOutcome::BlockedSender => self.blocked += 1,
            RouteOutcome::NotJoined => self.not_joined += 1,
            RouteOutcome::SoftMiss(_) => self.soft_misses += 1,
        }
        self.effects_generated += routed.effects.len() as u64;
        self.app_events_generated += routed.app_events.len() as u64;
    }
}

// ----------------------------------------------------------------------------
// Event Router
// ----------------------------------------------------------------------------

/// Owns every routing component for one local peer
pub struct EventRouter<T: TimeSource> {
    local_peer: PeerId,
    config: MeshConfig,
    ledger: DedupLedger<T>,
    delivery: DeliveryTracker,
    presence: PresenceReconciler,
    roster: ChannelRoster,
    receipts: ReceiptDispatcher,
    private_chats: PrivateChats,
    public_log: MessageLog,
    focus: FocusState,
    stats: RouterStats,
}

impl<T: TimeSource> EventRouter<T> {
    /// Build a router after validating `config`
    pub fn new(
        local_peer: PeerId,
        config: MeshConfig,
        time_source: T,
        cipher: Arc<dyn ChannelCipher>,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            local_peer,
            ledger: DedupLedger::new(config.dedup.clone(), time_source),
            delivery: DeliveryTracker::with_config(config.delivery.clone()),
            presence: PresenceReconciler::new(),
            roster: ChannelRoster::new(config.roster.clone(), cipher),
            receipts: ReceiptDispatcher::new(config.receipts.clone()),
            private_chats: PrivateChats::new(config.roster.max_log_len),
            public_log: MessageLog::new(config.roster.max_log_len),
            focus: FocusState::default(),
            stats: RouterStats::default(),
            config,
        })
    }

    // ---- Events ----

    /// Route one inbound event
    pub fn handle_event(&mut self, event: Event) -> Routed {
        self.stats.events_processed += 1;
        let kind = event.kind();

        let admitted = match EventFingerprint::for_event(&event, self.config.dedup.fingerprint_bucket_ms) {
            Some((fingerprint, class)) => {
                let admitted = self.ledger.admit_with(fingerprint, class);
                if !admitted {
                    debug!(%kind, %fingerprint, "duplicate event");
                }
                admitted
            }
            None => true,
        };

        // A gated presence event still reconciles the connected set; the gate
        // only decides whether the system line is posted
        let is_presence = matches!(kind, EventKind::PeerConnect | EventKind::PeerDisconnect);
        if !admitted && !is_presence {
            let routed = Routed::new(RouteOutcome::Duplicate);
            self.stats.record(&routed);
            return routed;
        }

        let routed = match event {
            Event::MessageReceived { message } => self.route_message(message),
            Event::PeerConnected { peer_id, timestamp } => {
                self.route_presence(peer_id, timestamp, true, admitted)
            }
            Event::PeerDisconnected { peer_id, timestamp } => {
                self.route_presence(peer_id, timestamp, false, admitted)
            }
            Event::PeerListUpdated { peers } => self.route_peer_list(peers),
            Event::ChannelLeave { channel, from, .. } => self.route_channel_leave(channel, from),
            Event::DeliveryAck {
                message_id, by, at, ..
            } => self.route_ack(message_id, AckKind::Delivered, by, at),
            Event::ReadReceipt {
                message_id, by, at, ..
            } => self.route_ack(message_id, AckKind::Read, by, at),
        };

        debug!(%kind, outcome = ?routed.outcome, effects = routed.effects.len(), "event routed");
        self.stats.record(&routed);
        routed
    }

    fn route_message(&mut self, message: Message) -> Routed {
        if let Some(sender) = message.sender_peer_id {
            if self.private_chats.is_blocked(&sender) {
                debug!(%sender, message_id = %message.id, "message from blocked peer discarded");
                return Routed::new(RouteOutcome::BlockedSender);
            }
        }

        let from_self = message.sender_peer_id == Some(self.local_peer);
        let mut routed = match message.visibility.clone() {
            Visibility::Private { recipient } => self.route_private_message(message, recipient),
            Visibility::Channel(channel) => self.route_channel_message(message, channel),
            Visibility::Public => {
                let message_id = message.id;
                self.public_log.push(message);
                let mut routed = Routed::accepted();
                routed.app_events.push(AppEvent::MessageAdded {
                    scope: LogScope::Public,
                    message_id,
                });
                routed
            }
        };

        if routed.is_accepted() && !from_self {
            routed.effects.push(Effect::Haptic);
        }
        routed
    }

    fn route_private_message(&mut self, message: Message, recipient: PeerId) -> Routed {
        let Some(sender) = message.sender_peer_id else {
            // Nobody to ack or notify about; keep it in the recipient's log
            debug!(message_id = %message.id, %recipient, "private message without sender peer id");
            let mut routed = Routed::accepted();
            routed.app_events.push(AppEvent::MessageAdded {
                scope: LogScope::Private(recipient),
                message_id: message.id,
            });
            self.private_chats.record(recipient, message);
            return routed;
        };

        // Our own messages echoed back by the mesh file under the recipient
        let peer_id = if sender == self.local_peer {
            recipient
        } else {
            sender
        };
        let message_id = message.id;

        let mut routed = Routed::accepted();
        routed.app_events.push(AppEvent::MessageAdded {
            scope: LogScope::Private(peer_id),
            message_id,
        });

        if sender == self.local_peer {
            self.private_chats.record(peer_id, message);
            return routed;
        }

        if self.receipts.sends_delivery_acks() {
            routed.effects.push(Effect::SendDeliveryAck {
                message_id,
                to: sender,
            });
        }

        if let Some(receipt) = self.receipts.on_private_message(&self.focus, message_id, sender) {
            routed.effects.push(receipt);
        }

        if !self.focus.is_viewing(&sender) {
            let content = match &message.content {
                MessageContent::Text(text) => text.clone(),
                _ => self.roster.placeholder().to_string(),
            };
            routed.effects.push(Effect::Notify(Notification {
                kind: NotificationKind::PrivateMessage,
                sender_peer_id: sender,
                sender_nickname: message.display_name(),
                content,
            }));
        }

        self.private_chats.record(peer_id, message);
        routed
    }

    fn route_channel_message(&mut self, message: Message, channel: ChannelName) -> Routed {
        let connected = self.presence.connected();
        match self
            .roster
            .add_message(&channel, &message, message.sender_peer_id, &connected)
        {
            AddOutcome::NotJoined => {
                debug!(%channel, message_id = %message.id, "message for unjoined channel discarded");
                Routed::new(RouteOutcome::NotJoined)
            }
            AddOutcome::Appended { new_member, .. } => {
                let mut routed = Routed::accepted();
                routed.app_events.push(AppEvent::MessageAdded {
                    scope: LogScope::Channel(channel.clone()),
                    message_id: message.id,
                });
                if new_member {
                    routed.app_events.push(self.members_changed(&channel));
                }
                routed
            }
        }
    }

    /// Explicit connect or disconnect. The connected set always follows the
    /// transport; `announce` is false when the (kind, peer) gate already saw
    /// this transition within the presence window.
    fn route_presence(
        &mut self,
        peer_id: PeerId,
        timestamp: Timestamp,
        connect: bool,
        announce: bool,
    ) -> Routed {
        let active_chat = self.focus.open_private_chat;
        let report = if connect {
            self.presence.connect(peer_id, &mut self.roster, active_chat)
        } else {
            self.presence.disconnect(peer_id, &mut self.roster, active_chat)
        };

        if !announce && report.is_unchanged() && report.teardown.is_none() {
            return Routed::new(RouteOutcome::Duplicate);
        }

        let mut routed = Routed::accepted();
        if announce {
            let verb = if connect { "connected" } else { "disconnected" };
            self.announce(peer_id, verb, timestamp, &mut routed);
        }
        self.apply_presence_report(report, Some(peer_id), timestamp, &mut routed);
        routed
    }

    fn route_peer_list(&mut self, peers: Vec<PeerId>) -> Routed {
        let mut routed = Routed::accepted();
        let now = self.ledger.time_source().now();

        let report = self
            .presence
            .apply_presence(peers, &mut self.roster, self.focus.open_private_chat);
        self.apply_presence_report(report, None, now, &mut routed);
        routed
    }

    /// Turn a presence diff into system messages, teardown and app events.
    ///
    /// Peers joining or leaving through a list diff go through the same
    /// (kind, peer) dedup gate as explicit connect/disconnect events. `origin`
    /// is the peer of an explicit event, already gated by the caller.
    fn apply_presence_report(
        &mut self,
        report: PresenceReport,
        origin: Option<PeerId>,
        at: Timestamp,
        routed: &mut Routed,
    ) {
        for peer_id in &report.joined {
            if Some(*peer_id) != origin
                && self.admit_presence(EventKind::PeerConnect, *peer_id)
            {
                self.announce(*peer_id, "connected", at, routed);
            }
        }
        for peer_id in &report.left {
            if Some(*peer_id) != origin
                && self.admit_presence(EventKind::PeerDisconnect, *peer_id)
            {
                self.announce(*peer_id, "disconnected", at, routed);
            }
        }

        let mut pruned_channels: Vec<&ChannelName> =
            report.pruned.iter().map(|(channel, _)| channel).collect();
        pruned_channels.dedup();
        for channel in pruned_channels {
            routed.app_events.push(self.members_changed(channel));
        }

        if let Some(peer_id) = report.teardown {
            debug!(%peer_id, "private chat partner left, tearing down");
            routed.effects.push(Effect::ClosePrivateChat { peer_id });
            routed.app_events.push(AppEvent::PrivateChatClosed { peer_id });
        }

        if !report.joined.is_empty() || !report.left.is_empty() {
            routed.app_events.push(AppEvent::PeersChanged {
                connected: self.presence.connected().iter().copied().collect(),
                joined: report.joined,
                left: report.left,
            });
        }
    }

    fn admit_presence(&mut self, kind: EventKind, peer_id: PeerId) -> bool {
        self.ledger
            .admit_with(EventFingerprint::presence(kind, peer_id), RetentionClass::Presence)
    }

    /// Post "<peer> <verb>" to the public log
    fn announce(&mut self, peer_id: PeerId, verb: &str, at: Timestamp, routed: &mut Routed) {
        let message = Message::system(format!("{} {}", peer_id, verb), at);
        routed.app_events.push(AppEvent::MessageAdded {
            scope: LogScope::Public,
            message_id: message.id,
        });
        self.public_log.push(message);
    }

    fn route_channel_leave(&mut self, channel: ChannelName, from: PeerId) -> Routed {
        if !self.roster.remove_member(&channel, &from) {
            return Routed::soft_miss(SoftMiss::UnknownMember {
                channel,
                peer_id: from,
            });
        }

        let mut routed = Routed::accepted();
        routed.app_events.push(self.members_changed(&channel));
        routed
    }

    fn route_ack(&mut self, message_id: MessageId, kind: AckKind, by: String, at: Timestamp) -> Routed {
        match self.delivery.record_ack(&message_id, kind, by, at) {
            AckOutcome::Advanced { current, .. } => {
                let mut routed = Routed::accepted();
                routed.app_events.push(AppEvent::DeliveryStatusChanged {
                    message_id,
                    status: current,
                });
                routed
            }
            AckOutcome::Stale { current } => {
                debug!(%message_id, %current, ?kind, "stale ack ignored");
                Routed::accepted()
            }
            AckOutcome::UnknownMessage => Routed::soft_miss(SoftMiss::UnknownMessage { message_id }),
        }
    }

    fn members_changed(&self, channel: &ChannelName) -> AppEvent {
        AppEvent::ChannelMembersChanged {
            channel: channel.clone(),
            members: self
                .roster
                .members(channel)
                .map(|members| members.iter().copied().collect())
                .unwrap_or_default(),
        }
    }

    // ---- Commands ----

    /// Apply one UI command
    pub fn handle_command(&mut self, command: Command) -> Routed {
        self.stats.commands_processed += 1;

        let routed = match command {
            Command::UpdateFocus { focus } => {
                self.focus = focus;
                Routed::accepted()
            }
            Command::JoinChannel { channel, key } => {
                let mut routed = Routed::accepted();
                if self.roster.join(channel.clone(), key) {
                    routed.app_events.push(AppEvent::ChannelJoined { channel });
                }
                routed
            }
            Command::LeaveChannel { channel } => match self.roster.leave(&channel) {
                Some(_) => {
                    let mut routed = Routed::accepted();
                    routed.effects.push(Effect::SendChannelLeave {
                        channel: channel.clone(),
                    });
                    routed.app_events.push(AppEvent::ChannelLeft { channel });
                    routed
                }
                None => Routed::soft_miss(SoftMiss::UnknownChannel { channel }),
            },
            Command::BlockPeer { peer_id } => {
                let mut routed = Routed::accepted();
                self.private_chats.block(peer_id);
                if self.focus.open_private_chat == Some(peer_id) {
                    routed.effects.push(Effect::ClosePrivateChat { peer_id });
                    routed.app_events.push(AppEvent::PrivateChatClosed { peer_id });
                }
                routed
            }
            Command::UnblockPeer { peer_id } => {
                self.private_chats.unblock(&peer_id);
                Routed::accepted()
            }
            Command::ToggleFavorite { peer_id } => {
                self.private_chats.toggle_favorite(peer_id);
                Routed::accepted()
            }
            Command::SendMessage { message } => self.send_message(message),
            Command::MarkConversationRead { peer_id } => {
                let mut routed = Routed::accepted();
                if let Some(log) = self.private_chats.log(&peer_id) {
                    routed
                        .effects
                        .extend(self.receipts.mark_conversation_read(peer_id, log));
                }
                routed
            }
            Command::Shutdown => Routed::accepted(),
        };

        self.stats.record(&routed);
        routed
    }

    /// Record a locally-authored message and hand it to the transport
    fn send_message(&mut self, message: Message) -> Routed {
        let message_id = message.id;
        let scope = match &message.visibility {
            Visibility::Public => {
                self.public_log.push(message.clone());
                LogScope::Public
            }
            Visibility::Channel(channel) => {
                let channel = channel.clone();
                let connected = self.presence.connected();
                if let AddOutcome::NotJoined =
                    self.roster.add_message(&channel, &message, None, &connected)
                {
                    return Routed::soft_miss(SoftMiss::UnknownChannel { channel });
                }
                LogScope::Channel(channel)
            }
            Visibility::Private { recipient } => {
                let recipient = *recipient;
                self.private_chats.record(recipient, message.clone());
                LogScope::Private(recipient)
            }
        };

        self.delivery.track(message_id);

        let mut routed = Routed::accepted();
        routed.effects.push(Effect::SendMessage { message });
        routed.app_events.push(AppEvent::MessageAdded { scope, message_id });
        routed.app_events.push(AppEvent::DeliveryStatusChanged {
            message_id,
            status: DeliveryStatus::Sent,
        });
        routed
    }

    // ---- Queries ----

    /// Immutable copy of everything readers may look at
    pub fn snapshot(&self) -> MeshSnapshot {
        let channels = self
            .roster
            .channels()
            .map(|channel| {
                (
                    channel.name.clone(),
                    ChannelSnapshot {
                        members: channel.members.clone(),
                        log: channel.log.snapshot(),
                    },
                )
            })
            .collect();

        let private_chats: BTreeMap<_, _> = self
            .private_chats
            .logs()
            .map(|(peer_id, log)| (*peer_id, log.snapshot()))
            .collect();

        MeshSnapshot {
            local_peer: Some(self.local_peer),
            connected: self.presence.connected(),
            public_log: self.public_log.snapshot(),
            channels,
            private_chats,
            delivery: self.delivery.snapshot(),
            blocked: self.private_chats.blocked().clone(),
            favorites: self.private_chats.favorites().clone(),
            focus: self.focus.clone(),
            router_stats: self.stats.clone(),
            dedup_stats: self.ledger.stats().clone(),
            placeholder: self.roster.placeholder().to_string(),
        }
    }

    pub fn local_peer(&self) -> PeerId {
        self.local_peer
    }

    pub fn config(&self) -> &MeshConfig {
        &self.config
    }

    pub fn focus(&self) -> &FocusState {
        &self.focus
    }

    pub fn stats(&self) -> &RouterStats {
        &self.stats
    }

    pub fn dedup_stats(&self) -> &DedupStats {
        self.ledger.stats()
    }

    pub fn delivery_status(&self, message_id: &MessageId) -> Option<&DeliveryStatus> {
        self.delivery.status(message_id)
    }

    pub fn roster(&self) -> &ChannelRoster {
        &self.roster
    }

    pub fn private_chats(&self) -> &PrivateChats {
        &self.private_chats
    }

    pub fn public_log(&self) -> &MessageLog {
        &self.public_log
    }

    pub fn presence(&self) -> &PresenceReconciler {
        &self.presence
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::NoChannelCipher;
    use crate::types::SystemTimeSource;

    fn peer(n: u8) -> PeerId {
        PeerId::new([n; 8])
    }

    fn router() -> EventRouter<SystemTimeSource> {
        EventRouter::new(
            peer(0),
            MeshConfig::testing(),
            SystemTimeSource,
            Arc::new(NoChannelCipher),
        )
        .unwrap()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = MeshConfig::default();
        config.dedup.max_entries = 0;
        let result = EventRouter::new(peer(0), config, SystemTimeSource, Arc::new(NoChannelCipher));
        assert!(result.is_err());
    }

    #[test]
    fn test_public_message_logged_once() {
        let mut router = router();
        let message = Message::new(
            "alice",
            Some(peer(1)),
            MessageContent::text("hello"),
            Timestamp::new(1_000),
            Visibility::Public,
        );

        let first = router.handle_event(Event::MessageReceived {
            message: message.clone(),
        });
        let second = router.handle_event(Event::MessageReceived { message });

        assert!(first.is_accepted());
        assert!(first.effects.contains(&Effect::Haptic));
        assert_eq!(second.outcome, RouteOutcome::Duplicate);
        assert!(second.effects.is_empty());
        assert_eq!(router.public_log().len(), 1);
        assert_eq!(router.stats().duplicates, 1);
    }

    #[test]
    fn test_own_private_echo_files_under_recipient() {
        let mut router = router();
        let message = Message::new(
            "me",
            Some(peer(0)),
            MessageContent::text("hi bob"),
            Timestamp::new(1_000),
            Visibility::Private { recipient: peer(2) },
        );

        let routed = router.handle_event(Event::MessageReceived { message });
        assert!(routed.is_accepted());
        assert!(!routed
            .effects
            .iter()
            .any(|effect| matches!(effect, Effect::Notify(_) | Effect::SendDeliveryAck { .. })));
        assert_eq!(router.private_chats().log(&peer(2)).map(MessageLog::len), Some(1));
    }

    #[test]
    fn test_private_message_without_sender_still_recorded() {
        let mut router = router();
        let message = Message::new(
            "anonymous",
            None,
            MessageContent::text("who am i"),
            Timestamp::new(1_000),
            Visibility::Private { recipient: peer(3) },
        );

        let routed = router.handle_event(Event::MessageReceived { message });
        assert!(routed.is_accepted());
        assert!(!routed.effects.iter().any(|effect| matches!(
            effect,
            Effect::Notify(_) | Effect::SendDeliveryAck { .. } | Effect::SendReadReceipt { .. }
        )));
        assert_eq!(router.private_chats().log(&peer(3)).map(MessageLog::len), Some(1));
    }

    #[test]
    fn test_leave_unknown_channel_is_soft_miss() {
        let mut router = router();
        let routed = router.handle_command(Command::LeaveChannel {
            channel: ChannelName::new("nowhere"),
        });
        assert!(matches!(
            routed.outcome,
            RouteOutcome::SoftMiss(SoftMiss::UnknownChannel { .. })
        ));
        assert_eq!(router.stats().soft_misses, 1);
    }

    #[test]
    fn test_send_message_tracks_delivery() {
        let mut router = router();
        let message = Message::new(
            "me",
            Some(peer(0)),
            MessageContent::text("yo"),
            Timestamp::new(1),
            Visibility::Private { recipient: peer(3) },
        );
        let id = message.id;

        let routed = router.handle_command(Command::SendMessage { message });
        assert!(matches!(routed.effects.as_slice(), [Effect::SendMessage { .. }]));
        assert_eq!(router.delivery_status(&id), Some(&DeliveryStatus::Sent));
        assert_eq!(router.snapshot().status(&id), Some(&DeliveryStatus::Sent));
    }
}
