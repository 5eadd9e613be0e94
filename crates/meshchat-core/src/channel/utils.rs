//! Channel Utilities for CSP Communication
//!
//! Tokio-backed channel aliases and constructors used by the runtime:
//! - mpsc for events, commands and app events (many producers, one router)
//! - broadcast for effects (one router, many external boundaries)
//! - watch for snapshots (latest point-in-time copy for readers)

use crate::channel::communication::{AppEvent, Command, Effect, Event};
use crate::config::ChannelConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel buffer is full")]
    ChannelFull,
    #[error("Channel is closed")]
    ChannelClosed,
    #[error("Channel has no receivers")]
    NoReceivers,
}

impl From<ChannelError> for crate::MeshError {
    fn from(err: ChannelError) -> Self {
        crate::MeshError::channel_error(err.to_string())
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "std")] {
        use alloc::sync::Arc;
        use crate::snapshot::MeshSnapshot;

        pub type CommandSender = tokio::sync::mpsc::Sender<Command>;
        pub type CommandReceiver = tokio::sync::mpsc::Receiver<Command>;
        pub type EventSender = tokio::sync::mpsc::Sender<Event>;
        pub type EventReceiver = tokio::sync::mpsc::Receiver<Event>;
        pub type EffectSender = tokio::sync::broadcast::Sender<Effect>;
        pub type EffectReceiver = tokio::sync::broadcast::Receiver<Effect>;
        pub type AppEventSender = tokio::sync::mpsc::Sender<AppEvent>;
        pub type AppEventReceiver = tokio::sync::mpsc::Receiver<AppEvent>;
        pub type SnapshotSender = tokio::sync::watch::Sender<Arc<MeshSnapshot>>;
        pub type SnapshotReceiver = tokio::sync::watch::Receiver<Arc<MeshSnapshot>>;

        // --------------------------------------------------------------------
        // Channel Creation Utilities
        // --------------------------------------------------------------------

        /// Create bounded command channel (UI → Router)
        pub fn create_command_channel(config: &ChannelConfig) -> (CommandSender, CommandReceiver) {
            tokio::sync::mpsc::channel(config.command_buffer_size)
        }

        /// Create bounded event channel (Transport → Router)
        pub fn create_event_channel(config: &ChannelConfig) -> (EventSender, EventReceiver) {
            tokio::sync::mpsc::channel(config.event_buffer_size)
        }

        /// Create broadcast effect channel (Router → external boundaries).
        /// Additional receivers are created with [`create_effect_receiver`].
        pub fn create_effect_channel(config: &ChannelConfig) -> (EffectSender, EffectReceiver) {
            tokio::sync::broadcast::channel(config.effect_buffer_size)
        }

        /// Subscribe a new boundary to the effect stream
        pub fn create_effect_receiver(effect_sender: &EffectSender) -> EffectReceiver {
            effect_sender.subscribe()
        }

        /// Create bounded app event channel (Router → UI)
        pub fn create_app_event_channel(config: &ChannelConfig) -> (AppEventSender, AppEventReceiver) {
            tokio::sync::mpsc::channel(config.app_event_buffer_size)
        }

        /// Create the snapshot channel seeded with an initial snapshot
        pub fn create_snapshot_channel(initial: MeshSnapshot) -> (SnapshotSender, SnapshotReceiver) {
            tokio::sync::watch::channel(Arc::new(initial))
        }

        // --------------------------------------------------------------------
        // Non-Blocking Send
        // --------------------------------------------------------------------

        /// Send without awaiting; used for every router output so a slow
        /// consumer can never stall event processing.
        pub trait NonBlockingSend<T> {
            fn try_send_non_blocking(&self, message: T) -> Result<(), ChannelError>;
        }

        impl NonBlockingSend<AppEvent> for AppEventSender {
            fn try_send_non_blocking(&self, event: AppEvent) -> Result<(), ChannelError> {
                self.try_send(event).map_err(|e| match e {
                    tokio::sync::mpsc::error::TrySendError::Full(_) => ChannelError::ChannelFull,
                    tokio::sync::mpsc::error::TrySendError::Closed(_) => ChannelError::ChannelClosed,
                })
            }
        }

        impl NonBlockingSend<Effect> for EffectSender {
            fn try_send_non_blocking(&self, effect: Effect) -> Result<(), ChannelError> {
                // Broadcast never blocks; lagging receivers lose the oldest effects
                self.send(effect).map(|_| ()).map_err(|_| ChannelError::NoReceivers)
            }
        }
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use crate::types::PeerId;

    #[tokio::test]
    async fn test_app_event_channel_reports_full() {
        let config = ChannelConfig {
            app_event_buffer_size: 1,
            ..ChannelConfig::default()
        };
        let (sender, _receiver) = create_app_event_channel(&config);
        let event = AppEvent::PrivateChatClosed {
            peer_id: PeerId::new([1; 8]),
        };

        assert!(sender.try_send_non_blocking(event.clone()).is_ok());
        assert_eq!(
            sender.try_send_non_blocking(event),
            Err(ChannelError::ChannelFull)
        );
    }

    #[tokio::test]
    async fn test_effect_channel_fans_out() {
        let (sender, mut first) = create_effect_channel(&ChannelConfig::testing());
        let mut second = create_effect_receiver(&sender);

        sender.try_send_non_blocking(Effect::Haptic).unwrap();
        assert_eq!(first.recv().await.unwrap(), Effect::Haptic);
        assert_eq!(second.recv().await.unwrap(), Effect::Haptic);
    }

    #[test]
    fn test_effect_without_receivers() {
        let (sender, receiver) = create_effect_channel(&ChannelConfig::testing());
        drop(receiver);
        assert_eq!(
            sender.try_send_non_blocking(Effect::Haptic),
            Err(ChannelError::NoReceivers)
        );
    }
}
