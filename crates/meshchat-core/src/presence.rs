//! Peer presence reconciliation
//!
//! The transport reports reachable peers as whole lists. The reconciler keeps
//! the authoritative [`ConnectedPeerSet`], diffs each new list against it and
//! applies the membership consequences of peers leaving.

use alloc::collections::BTreeSet;
use alloc::sync::Arc;

use crate::roster::ChannelRoster;
use crate::types::{ChannelName, PeerId};

/// The set of currently connected peers
pub type ConnectedPeerSet = BTreeSet<PeerId>;

/// What changed when a presence update was applied
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresenceReport {
    pub joined: Vec<PeerId>,
    pub left: Vec<PeerId>,
    /// Channel memberships removed because the member is no longer connected
    pub pruned: Vec<(ChannelName, PeerId)>,
    /// Peer whose private chat must be torn down
    pub teardown: Option<PeerId>,
}

impl PresenceReport {
    pub fn is_unchanged(&self) -> bool {
        self.joined.is_empty() && self.left.is_empty() && self.pruned.is_empty()
    }
}

/// Maintains the connected peer set and derives presence side effects
#[derive(Debug, Clone, Default)]
pub struct PresenceReconciler {
    /// Replaced wholesale on every update; readers hold their own `Arc`
    connected: Arc<ConnectedPeerSet>,
}

impl PresenceReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the connected set with `peers`.
    ///
    /// Every channel member not in the new set is removed from the roster,
    /// and if the active private chat partner left it is reported for
    /// teardown. The new set becomes visible to readers in a single swap.
    pub fn apply_presence<I>(
        &mut self,
        peers: I,
        roster: &mut ChannelRoster,
        active_private_chat: Option<PeerId>,
    ) -> PresenceReport
    where
        I: IntoIterator<Item = PeerId>,
    {
        let next: ConnectedPeerSet = peers.into_iter().collect();

        let joined: Vec<PeerId> = next.difference(&self.connected).copied().collect();
        let left: Vec<PeerId> = self.connected.difference(&next).copied().collect();

        let pruned = roster.retain_connected(&next);
        let teardown = active_private_chat.filter(|peer_id| left.contains(peer_id));

        self.connected = Arc::new(next);

        PresenceReport {
            joined,
            left,
            pruned,
            teardown,
        }
    }

    /// Add a single peer (a connect event)
    pub fn connect(
        &mut self,
        peer_id: PeerId,
        roster: &mut ChannelRoster,
        active_private_chat: Option<PeerId>,
    ) -> PresenceReport {
        let mut next = (*self.connected).clone();
        next.insert(peer_id);
        self.apply_presence(next, roster, active_private_chat)
    }

    /// Remove a single peer (a disconnect event)
    pub fn disconnect(
        &mut self,
        peer_id: PeerId,
        roster: &mut ChannelRoster,
        active_private_chat: Option<PeerId>,
    ) -> PresenceReport {
        let mut next = (*self.connected).clone();
        next.remove(&peer_id);
        self.apply_presence(next, roster, active_private_chat)
    }

    /// Point-in-time copy of the connected set
    pub fn connected(&self) -> Arc<ConnectedPeerSet> {
        Arc::clone(&self.connected)
    }

    pub fn is_connected(&self, peer_id: &PeerId) -> bool {
        self.connected.contains(peer_id)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RosterConfig;
    use crate::message::{Message, MessageContent, Visibility};
    use crate::ports::NoChannelCipher;
    use crate::types::Timestamp;

    fn peer(n: u8) -> PeerId {
        PeerId::new([n; 8])
    }

    fn roster_with_members(channel: &ChannelName, members: &[PeerId]) -> ChannelRoster {
        let mut roster = ChannelRoster::new(RosterConfig::default(), Arc::new(NoChannelCipher));
        roster.join(channel.clone(), None);
        let connected: ConnectedPeerSet = members.iter().copied().collect();
        for member in members {
            let message = Message::new(
                "x",
                Some(*member),
                MessageContent::text("hi"),
                Timestamp::new(1),
                Visibility::Channel(channel.clone()),
            );
            roster.add_message(channel, &message, Some(*member), &connected);
        }
        roster
    }

    #[test]
    fn test_diff_and_prune() {
        let general = ChannelName::new("general");
        let (a, b) = (peer(0xA), peer(0xB));
        let mut roster = roster_with_members(&general, &[a, b]);
        let mut reconciler = PresenceReconciler::new();

        let first = reconciler.apply_presence([a, b], &mut roster, None);
        assert_eq!(first.joined, vec![a, b]);
        assert!(first.left.is_empty());

        let second = reconciler.apply_presence([a], &mut roster, Some(b));
        assert!(second.joined.is_empty());
        assert_eq!(second.left, vec![b]);
        assert_eq!(second.pruned, vec![(general.clone(), b)]);
        assert_eq!(second.teardown, Some(b));

        let expected: ConnectedPeerSet = [a].into_iter().collect();
        assert_eq!(roster.members(&general), Some(&expected));
        assert_eq!(*reconciler.connected(), expected);
    }

    #[test]
    fn test_teardown_only_for_leaving_partner() {
        let general = ChannelName::new("general");
        let (a, b) = (peer(1), peer(2));
        let mut roster = roster_with_members(&general, &[]);
        let mut reconciler = PresenceReconciler::new();

        reconciler.apply_presence([a, b], &mut roster, Some(a));
        let report = reconciler.apply_presence([a], &mut roster, Some(a));
        assert_eq!(report.teardown, None);

        // Already gone: a repeated list does not tear down again
        let report = reconciler.apply_presence([a], &mut roster, Some(b));
        assert_eq!(report.teardown, None);
        assert!(report.is_unchanged());
    }

    #[test]
    fn test_snapshot_not_affected_by_later_update() {
        let mut roster = roster_with_members(&ChannelName::new("general"), &[]);
        let mut reconciler = PresenceReconciler::new();

        reconciler.apply_presence([peer(1), peer(2)], &mut roster, None);
        let snapshot = reconciler.connected();
        reconciler.apply_presence([peer(3)], &mut roster, None);

        assert_eq!(snapshot.len(), 2);
        assert!(reconciler.is_connected(&peer(3)));
        assert!(!reconciler.is_connected(&peer(1)));
    }

    #[test]
    fn test_connect_and_disconnect_single_peer() {
        let mut roster = roster_with_members(&ChannelName::new("general"), &[]);
        let mut reconciler = PresenceReconciler::new();

        let report = reconciler.connect(peer(1), &mut roster, None);
        assert_eq!(report.joined, vec![peer(1)]);
        let report = reconciler.connect(peer(1), &mut roster, None);
        assert!(report.is_unchanged());

        let report = reconciler.disconnect(peer(1), &mut roster, Some(peer(1)));
        assert_eq!(report.left, vec![peer(1)]);
        assert_eq!(report.teardown, Some(peer(1)));
    }
}
