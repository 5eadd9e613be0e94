//! Property-based tests for delivery monotonicity, presence reconciliation
//! and dedup idempotence

use meshchat_core::{
    AckKind, ChannelName, Command, DeliveryStatus, DeliveryTracker, MessageContent, MessageId,
    PeerId, RouteOutcome, Timestamp,
};
use proptest::prelude::*;
use std::collections::BTreeSet;

use test_utils::*;

/// Generate arbitrary PeerId from a small pool so lists overlap
fn arb_peer_id() -> impl Strategy<Value = PeerId> {
    (0u8..12).prop_map(|n| PeerId::new([n; 8]))
}

fn arb_peer_list() -> impl Strategy<Value = Vec<PeerId>> {
    prop::collection::vec(arb_peer_id(), 0..8)
}

fn arb_ack() -> impl Strategy<Value = (AckKind, u64)> {
    (
        prop_oneof![Just(AckKind::Delivered), Just(AckKind::Read)],
        0u64..1_000,
    )
}

proptest! {
    /// Property: delivery status rank never decreases, whatever the ack order
    #[test]
    fn delivery_status_never_regresses(acks in prop::collection::vec(arb_ack(), 1..20)) {
        let mut tracker = DeliveryTracker::new();
        let id = MessageId::new();
        tracker.track(id);

        let mut last_rank = 0;
        for (kind, at) in acks {
            tracker.record_ack(&id, kind, "peer", Timestamp::new(at));
            let rank = tracker.status(&id).map(DeliveryStatus::rank).unwrap_or_default();
            prop_assert!(rank >= last_rank);
            last_rank = rank;
        }
    }

    /// Property: once any Read ack is applied the status stays Read
    #[test]
    fn read_is_terminal(
        before in prop::collection::vec(arb_ack(), 0..10),
        after in prop::collection::vec(arb_ack(), 0..10),
    ) {
        let mut tracker = DeliveryTracker::new();
        let id = MessageId::new();
        tracker.track(id);

        for (kind, at) in before {
            tracker.record_ack(&id, kind, "peer", Timestamp::new(at));
        }
        tracker.record_ack(&id, AckKind::Read, "reader", Timestamp::new(5_000));
        let read = tracker.status(&id).cloned();
        prop_assert_eq!(read.as_ref().map(DeliveryStatus::rank), Some(2));

        for (kind, at) in after {
            tracker.record_ack(&id, kind, "peer", Timestamp::new(at));
        }
        prop_assert_eq!(tracker.status(&id).cloned(), read);
    }

    /// Property: applying L1 then L2 leaves the connected set equal to L2 and
    /// no channel member outside L2
    #[test]
    fn presence_converges_to_latest_list(first in arb_peer_list(), second in arb_peer_list()) {
        let (mut router, _clock) = create_test_router();
        let general = ChannelName::new("general");
        router.handle_command(Command::JoinChannel { channel: general.clone(), key: None });

        router.handle_event(peer_list(&first));
        for sender in &first {
            router.handle_event(received(channel_message(
                *sender,
                &general,
                MessageContent::text("hello"),
            )));
        }
        router.handle_event(peer_list(&second));

        let expected: BTreeSet<PeerId> = second.iter().copied().collect();
        let connected = router.presence().connected();
        prop_assert_eq!(&*connected, &expected);

        let members = router.roster().members(&general).cloned().unwrap_or_default();
        prop_assert!(members.is_subset(&expected));
        let snapshot = router.snapshot();
        prop_assert!(snapshot
            .channel_members(&general)
            .map(|m| m.is_subset(&snapshot.connected))
            .unwrap_or(true));
    }

    /// Property: replaying any message is a duplicate with no effects
    #[test]
    fn replayed_message_has_no_effects(
        sender in arb_peer_id(),
        text in "[a-z ]{1,40}",
        repeats in 1usize..5,
    ) {
        let (mut router, _clock) = create_test_router();
        let message = private_message(sender, "someone", &text);

        let first = router.handle_event(received(message.clone()));
        prop_assert!(first.is_accepted());
        for _ in 0..repeats {
            let again = router.handle_event(received(message.clone()));
            prop_assert_eq!(again.outcome, RouteOutcome::Duplicate);
            prop_assert!(again.effects.is_empty());
        }
        prop_assert_eq!(router.private_chats().log(&sender).map(|log| log.len()), Some(1));
    }
}
