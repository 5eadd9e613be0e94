//! Router Task Implementation
//!
//! Contains the RouterTask struct and its coordination logic.

use std::sync::Arc;

use meshchat_core::channel::{
    AppEventSender, ChannelError, CommandReceiver, EffectSender, EventReceiver, NonBlockingSend,
    SnapshotSender,
};
use meshchat_core::{
    AppEvent, Command, Effect, Event, EventRouter, MeshError, MeshResult, Routed, TimeSource,
};
use tracing::{debug, error, info, warn};

// ----------------------------------------------------------------------------
// Router Task
// ----------------------------------------------------------------------------

/// Most queued items handled between two snapshot publications
const MAX_BATCH: usize = 64;

/// The task that processes all events and commands for one local peer
pub struct RouterTask<T: TimeSource> {
    router: EventRouter<T>,
    /// Channel for receiving commands from the UI
    command_receiver: CommandReceiver,
    /// Channel for receiving events from the transport
    event_receiver: EventReceiver,
    /// Fire-and-forget effects for external boundaries
    effect_sender: EffectSender,
    /// State changes for the UI
    app_event_sender: AppEventSender,
    /// Latest point-in-time snapshot for readers
    snapshot_sender: SnapshotSender,
    events_open: bool,
    running: bool,
}

impl<T: TimeSource> RouterTask<T> {
    pub fn new(
        router: EventRouter<T>,
        command_receiver: CommandReceiver,
        event_receiver: EventReceiver,
        effect_sender: EffectSender,
        app_event_sender: AppEventSender,
        snapshot_sender: SnapshotSender,
    ) -> Self {
        Self {
            router,
            command_receiver,
            event_receiver,
            effect_sender,
            app_event_sender,
            snapshot_sender,
            events_open: true,
            running: true,
        }
    }

    /// Run the router loop until shutdown or a fatal error
    pub async fn run(&mut self) -> MeshResult<()> {
        info!(peer_id = %self.router.local_peer(), "Router task starting");

        while self.running {
            tokio::select! {
                command = self.command_receiver.recv() => {
                    match command {
                        Some(Command::Shutdown) => {
                            info!("Shutdown requested");
                            self.running = false;
                        }
                        Some(cmd) => self.process_command(cmd)?,
                        None => {
                            info!("Command channel closed, shutting down");
                            break;
                        }
                    }
                }

                event = self.event_receiver.recv(), if self.events_open => {
                    match event {
                        Some(evt) => self.process_event(evt)?,
                        None => {
                            info!("Event channel closed");
                            // Commands may still arrive
                            self.events_open = false;
                        }
                    }
                }
            }

            if self.running {
                self.process_ready()?;
            }
            self.publish_snapshot();
        }

        info!("Router task stopped");
        Ok(())
    }

    /// Stop after the current iteration
    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn router(&self) -> &EventRouter<T> {
        &self.router
    }

    /// Handle whatever is already queued, up to one batch, so a burst costs a
    /// single snapshot publication
    fn process_ready(&mut self) -> MeshResult<()> {
        for _ in 0..MAX_BATCH {
            if let Ok(command) = self.command_receiver.try_recv() {
                if matches!(command, Command::Shutdown) {
                    info!("Shutdown requested");
                    self.running = false;
                    break;
                }
                self.process_command(command)?;
                continue;
            }
            if self.events_open {
                if let Ok(event) = self.event_receiver.try_recv() {
                    self.process_event(event)?;
                    continue;
                }
            }
            break;
        }
        Ok(())
    }

    fn process_command(&mut self, command: Command) -> MeshResult<()> {
        let routed = self.router.handle_command(command);
        match self.dispatch(routed) {
            Err(e) if e.is_fatal() => {
                error!("Unrecoverable error processing command, shutting down RouterTask: {}", e);
                Err(e)
            }
            Err(e) => {
                warn!("Error processing command: {}", e);
                Ok(())
            }
            Ok(()) => Ok(()),
        }
    }

    fn process_event(&mut self, event: Event) -> MeshResult<()> {
        let routed = self.router.handle_event(event);
        match self.dispatch(routed) {
            Err(e) if e.is_fatal() => {
                error!("Unrecoverable error processing event, shutting down RouterTask: {}", e);
                Err(e)
            }
            Err(e) => {
                warn!("Error processing event: {}", e);
                Ok(())
            }
            Ok(()) => Ok(()),
        }
    }

    /// Hand the router's outputs to their channels without waiting
    fn dispatch(&mut self, routed: Routed) -> MeshResult<()> {
        for effect in routed.effects {
            self.send_effect(effect);
        }
        for app_event in routed.app_events {
            self.send_app_event(app_event)?;
        }
        Ok(())
    }

    /// Readers keep the previous `Arc` until they look again; logs only copy
    /// their backing vector on the first append after a publication
    fn publish_snapshot(&mut self) {
        self.snapshot_sender
            .send_replace(Arc::new(self.router.snapshot()));
    }

    fn send_effect(&self, effect: Effect) {
        if let Err(e) = self.effect_sender.try_send_non_blocking(effect) {
            // No boundary subscribed yet; effects are fire-and-forget
            debug!("Effect dropped: {}", e);
        }
    }

    fn send_app_event(&self, app_event: AppEvent) -> MeshResult<()> {
        match self.app_event_sender.try_send_non_blocking(app_event) {
            Ok(()) => Ok(()),
            Err(ChannelError::ChannelFull) => {
                warn!("App event channel full, dropping app event");
                Ok(())
            }
            Err(e) => Err(MeshError::from(e)),
        }
    }
}
