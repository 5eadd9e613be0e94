//! Runtime Builder API
//!
//! Provides a builder-style API for consumers (CLI/tests) to start the router
//! task and get event, command, effect and snapshot handles.

use std::sync::Arc;

use meshchat_core::channel::{
    create_app_event_channel, create_command_channel, create_effect_channel,
    create_effect_receiver, create_event_channel, create_snapshot_channel, AppEventReceiver,
    CommandSender, EffectReceiver, EffectSender, EventSender, SnapshotReceiver,
};
use meshchat_core::{
    ChannelCipher, Command, Event, EventRouter, MeshConfig, MeshError, MeshResult, MeshSnapshot,
    NoChannelCipher, PeerId, SystemTimeSource, TimeSource,
};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::info;

use crate::logic::RouterTask;

// ----------------------------------------------------------------------------
// Runtime Builder
// ----------------------------------------------------------------------------

/// Builder for a MeshChat runtime
pub struct RuntimeBuilder<T: TimeSource = SystemTimeSource> {
    peer_id: PeerId,
    config: MeshConfig,
    cipher: Arc<dyn ChannelCipher>,
    time_source: T,
}

impl RuntimeBuilder<SystemTimeSource> {
    /// Create a new runtime builder for the given local peer
    pub fn new(peer_id: PeerId) -> Self {
        Self {
            peer_id,
            config: MeshConfig::default(),
            cipher: Arc::new(NoChannelCipher),
            time_source: SystemTimeSource,
        }
    }
}

impl<T: TimeSource + Send + 'static> RuntimeBuilder<T> {
    /// Set the routing configuration
    pub fn with_config(mut self, config: MeshConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the channel decrypt capability
    pub fn with_cipher(mut self, cipher: Arc<dyn ChannelCipher>) -> Self {
        self.cipher = cipher;
        self
    }

    /// Replace the clock used for dedup retention
    pub fn with_time_source<U: TimeSource + Send + 'static>(self, time_source: U) -> RuntimeBuilder<U> {
        RuntimeBuilder {
            peer_id: self.peer_id,
            config: self.config,
            cipher: self.cipher,
            time_source,
        }
    }

    /// Build the router and spawn its task
    pub async fn build_and_start(self) -> MeshResult<RuntimeHandle> {
        info!("Building MeshChat runtime");

        let channel_config = self.config.channels.clone();
        let router = EventRouter::new(self.peer_id, self.config, self.time_source, self.cipher)?;

        let (command_sender, command_receiver) = create_command_channel(&channel_config);
        let (event_sender, event_receiver) = create_event_channel(&channel_config);
        let (effect_sender, _effect_receiver) = create_effect_channel(&channel_config);
        let (app_event_sender, app_event_receiver) = create_app_event_channel(&channel_config);
        let (snapshot_sender, snapshot_receiver) = create_snapshot_channel(router.snapshot());

        let mut task = RouterTask::new(
            router,
            command_receiver,
            event_receiver,
            effect_sender.clone(),
            app_event_sender,
            snapshot_sender,
        );
        let router_handle = tokio::spawn(async move { task.run().await });

        info!("MeshChat runtime started successfully");

        Ok(RuntimeHandle {
            peer_id: self.peer_id,
            command_sender,
            event_sender,
            effect_sender,
            app_event_receiver: Some(app_event_receiver),
            snapshot_receiver,
            router_handle: Some(router_handle),
            running: true,
        })
    }
}

// ----------------------------------------------------------------------------
// Runtime Handle
// ----------------------------------------------------------------------------

/// Handle to a running router task
pub struct RuntimeHandle {
    peer_id: PeerId,
    command_sender: CommandSender,
    event_sender: EventSender,
    effect_sender: EffectSender,
    app_event_receiver: Option<AppEventReceiver>,
    snapshot_receiver: SnapshotReceiver,
    router_handle: Option<JoinHandle<MeshResult<()>>>,
    running: bool,
}

impl RuntimeHandle {
    /// Get the local peer ID
    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    /// Sender for the transport; clone freely for concurrent producers
    pub fn event_sender(&self) -> EventSender {
        self.event_sender.clone()
    }

    /// Get a command sender for sending commands to the runtime
    pub fn command_sender(&self) -> CommandSender {
        self.command_sender.clone()
    }

    /// Subscribe a new boundary to the effect stream. Only effects produced
    /// after subscribing are received.
    pub fn subscribe_effects(&self) -> EffectReceiver {
        create_effect_receiver(&self.effect_sender)
    }

    /// Take the app event receiver (can only be called once)
    pub fn take_app_event_receiver(&mut self) -> Option<AppEventReceiver> {
        self.app_event_receiver.take()
    }

    /// Send an inbound event to the runtime
    pub async fn send_event(&self, event: Event) -> MeshResult<()> {
        self.event_sender
            .send(event)
            .await
            .map_err(|_| MeshError::channel_error("Failed to send event to runtime"))
    }

    /// Send a command to the runtime
    pub async fn send_command(&self, command: Command) -> MeshResult<()> {
        self.command_sender
            .send(command)
            .await
            .map_err(|_| MeshError::channel_error("Failed to send command to runtime"))
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> Arc<MeshSnapshot> {
        self.snapshot_receiver.borrow().clone()
    }

    /// A receiver that observes every snapshot publication
    pub fn snapshot_receiver(&self) -> SnapshotReceiver {
        self.snapshot_receiver.clone()
    }

    /// Wait until the router has processed at least `count` events and
    /// commands in total, then return that snapshot
    pub async fn wait_for_processed(&self, count: u64, timeout: Duration) -> MeshResult<Arc<MeshSnapshot>> {
        let mut receiver = self.snapshot_receiver.clone();
        let wait = async {
            loop {
                let snapshot = receiver.borrow_and_update().clone();
                let stats = &snapshot.router_stats;
                if stats.events_processed + stats.commands_processed >= count {
                    return Ok(snapshot);
                }
                if receiver.changed().await.is_err() {
                    return Err(MeshError::channel_error("Router task stopped"));
                }
            }
        };

        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| MeshError::channel_error("Timed out waiting for router"))?
    }

    /// Check if the runtime is still running
    pub fn is_running(&self) -> bool {
        self.running
            && self
                .router_handle
                .as_ref()
                .is_some_and(|h| !h.is_finished())
    }

    /// Wait for the router task to complete
    pub async fn wait(&mut self) -> MeshResult<()> {
        if let Some(handle) = self.router_handle.take() {
            match handle.await {
                Ok(result) => result,
                Err(e) => Err(MeshError::channel_error(format!(
                    "Router task panicked: {}",
                    e
                ))),
            }
        } else {
            Ok(())
        }
    }

    /// Shutdown the runtime gracefully
    pub async fn shutdown(&mut self) -> MeshResult<()> {
        info!("Shutting down MeshChat runtime");

        let _ = self.send_command(Command::Shutdown).await;

        if let Some(handle) = self.router_handle.take() {
            let _ = tokio::time::timeout(Duration::from_secs(10), handle).await;
        }

        self.running = false;
        info!("MeshChat runtime shut down");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_runtime_builder() {
        let peer_id = PeerId::new([1, 2, 3, 4, 5, 6, 7, 8]);

        let mut runtime = RuntimeBuilder::new(peer_id)
            .with_config(MeshConfig::testing())
            .build_and_start()
            .await
            .expect("Failed to build runtime");

        assert_eq!(runtime.peer_id(), peer_id);
        assert!(runtime.is_running());
        assert_eq!(runtime.snapshot().local_peer, Some(peer_id));
        assert!(runtime.take_app_event_receiver().is_some());
        assert!(runtime.take_app_event_receiver().is_none());

        runtime.shutdown().await.expect("Failed to shutdown");
        assert!(!runtime.is_running());
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let mut config = MeshConfig::testing();
        config.dedup.presence_window_ms = config.dedup.retention_ms + 1;

        let result = RuntimeBuilder::new(PeerId::new([1; 8]))
            .with_config(config)
            .build_and_start()
            .await;
        assert!(matches!(result, Err(MeshError::Config(_))));
    }
}
