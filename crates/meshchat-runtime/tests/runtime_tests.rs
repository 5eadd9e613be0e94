//! Integration tests for the serialized router runtime

use std::time::Duration;

use futures::future::join_all;
use meshchat_core::receipts::FocusState;
use meshchat_core::{
    ChannelName, Message, MessageContent, PeerId, Timestamp, Visibility,
};
use meshchat_runtime::{
    AppEvent, Command, Effect, EffectReceiver, Event, MeshConfig, RuntimeBuilder, RuntimeHandle,
};
use tokio::time::timeout;
use tokio_test::assert_ok;

const WAIT: Duration = Duration::from_secs(5);

fn local_peer() -> PeerId {
    PeerId::new([0xEE; 8])
}

fn peer(n: u8) -> PeerId {
    PeerId::new([n; 8])
}

fn private_message(from: PeerId, text: &str) -> Message {
    Message::new(
        "bob",
        Some(from),
        MessageContent::text(text),
        Timestamp::new(1_000),
        Visibility::Private {
            recipient: local_peer(),
        },
    )
}

async fn start() -> RuntimeHandle {
    RuntimeBuilder::new(local_peer())
        .with_config(MeshConfig::testing())
        .build_and_start()
        .await
        .expect("runtime starts")
}

fn drain(receiver: &mut EffectReceiver) -> Vec<Effect> {
    let mut effects = Vec::new();
    while let Ok(effect) = receiver.try_recv() {
        effects.push(effect);
    }
    effects
}

#[tokio::test]
async fn test_concurrent_producers_admit_once() {
    let mut runtime = start().await;
    let mut effects = runtime.subscribe_effects();
    let message = private_message(peer(1), "raced");

    const PRODUCERS: u64 = 16;
    let sends = (0..PRODUCERS).map(|_| {
        let sender = runtime.event_sender();
        let event = Event::MessageReceived {
            message: message.clone(),
        };
        tokio::spawn(async move { sender.send(event).await })
    });
    for result in join_all(sends).await {
        assert!(matches!(result, Ok(Ok(()))));
    }

    let snapshot = assert_ok!(runtime.wait_for_processed(PRODUCERS, WAIT).await);
    assert_eq!(snapshot.private_log(&peer(1)).map(<[Message]>::len), Some(1));
    assert_eq!(snapshot.router_stats.duplicates, PRODUCERS - 1);

    let notifications = drain(&mut effects)
        .into_iter()
        .filter(|effect| matches!(effect, Effect::Notify(_)))
        .count();
    assert_eq!(notifications, 1);

    assert_ok!(runtime.shutdown().await);
}

#[tokio::test]
async fn test_focused_message_receipted_over_effect_stream() {
    let mut runtime = start().await;
    let mut effects = runtime.subscribe_effects();
    let p = peer(2);

    assert_ok!(
        runtime
            .send_command(Command::UpdateFocus {
                focus: FocusState::viewing(p),
            })
            .await
    );
    assert_ok!(runtime.wait_for_processed(1, WAIT).await);

    let message = private_message(p, "you there?");
    let id = message.id;
    assert_ok!(runtime.send_event(Event::MessageReceived { message }).await);
    assert_ok!(runtime.wait_for_processed(2, WAIT).await);

    let effects = drain(&mut effects);
    assert!(effects.contains(&Effect::SendReadReceipt {
        message_id: id,
        to: p
    }));
    assert!(!effects.iter().any(|effect| matches!(effect, Effect::Notify(_))));

    assert_ok!(runtime.shutdown().await);
}

#[tokio::test]
async fn test_app_events_reach_ui() {
    let mut runtime = start().await;
    let mut app_events = runtime.take_app_event_receiver().expect("first take");

    assert_ok!(
        runtime
            .send_event(Event::PeerConnected {
                peer_id: peer(3),
                timestamp: Timestamp::new(1_000),
            })
            .await
    );

    let mut saw_peers_changed = false;
    while let Ok(Some(app_event)) = timeout(WAIT, app_events.recv()).await {
        if let AppEvent::PeersChanged { connected, .. } = app_event {
            assert_eq!(connected, vec![peer(3)]);
            saw_peers_changed = true;
            break;
        }
    }
    assert!(saw_peers_changed);

    assert_ok!(runtime.shutdown().await);
}

#[tokio::test]
async fn test_commands_and_events_share_one_stream() {
    let mut runtime = start().await;
    let general = ChannelName::new("general");

    assert_ok!(
        runtime
            .send_command(Command::JoinChannel {
                channel: general.clone(),
                key: None,
            })
            .await
    );
    assert_ok!(runtime.wait_for_processed(1, WAIT).await);

    let message = Message::new(
        "alice",
        Some(peer(4)),
        MessageContent::text("hello channel"),
        Timestamp::new(1_000),
        Visibility::Channel(general.clone()),
    );
    assert_ok!(runtime.send_event(Event::MessageReceived { message }).await);

    let snapshot = assert_ok!(runtime.wait_for_processed(2, WAIT).await);
    assert_eq!(snapshot.channel_log(&general).map(<[Message]>::len), Some(1));

    assert_ok!(runtime.shutdown().await);
}

#[tokio::test]
async fn test_snapshot_unchanged_by_later_events() {
    let mut runtime = start().await;

    assert_ok!(
        runtime
            .send_event(Event::PeerListUpdated {
                peers: vec![peer(1), peer(2)],
            })
            .await
    );
    let before = assert_ok!(runtime.wait_for_processed(1, WAIT).await);

    assert_ok!(
        runtime
            .send_event(Event::PeerListUpdated {
                peers: vec![peer(3)],
            })
            .await
    );
    let after = assert_ok!(runtime.wait_for_processed(2, WAIT).await);

    assert_eq!(before.connected.len(), 2);
    assert!(before.is_connected(&peer(1)));
    assert!(after.is_connected(&peer(3)));
    assert!(!after.is_connected(&peer(1)));

    assert_ok!(runtime.shutdown().await);
}

#[tokio::test]
async fn test_shutdown_stops_consuming() {
    let mut runtime = start().await;
    assert_ok!(runtime.shutdown().await);
    assert!(!runtime.is_running());

    // The task dropped its receivers; further sends fail
    let result = runtime
        .send_event(Event::PeerListUpdated { peers: vec![] })
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_queued_burst_published_together() {
    let mut runtime = start().await;
    let sender = runtime.event_sender();

    // Current-thread runtime: the router cannot run until we await
    const BURST: u64 = 50;
    for n in 0..BURST {
        let message = private_message(peer(5), &format!("burst {}", n));
        assert_ok!(sender.try_send(Event::MessageReceived { message }));
    }

    let snapshot = assert_ok!(runtime.wait_for_processed(BURST, WAIT).await);
    assert_eq!(snapshot.router_stats.events_processed, BURST);
    assert_eq!(
        snapshot.private_log(&peer(5)).map(<[Message]>::len),
        Some(BURST as usize)
    );

    assert_ok!(runtime.shutdown().await);
}
