//! Channel Module
//!
//! CSP (Communicating Sequential Processes) infrastructure between the router
//! and its collaborators:
//! - `communication`: events, commands, effects and app events
//! - `utils`: channel aliases, constructors and non-blocking sends

pub mod communication;
pub mod utils;

pub use communication::{
    AppEvent, Command, Effect, Event, EventKind, Notification, NotificationKind,
};

pub use crate::config::ChannelConfig;

pub use utils::ChannelError;

#[cfg(feature = "std")]
pub use utils::{
    create_app_event_channel, create_command_channel, create_effect_channel,
    create_effect_receiver, create_event_channel, create_snapshot_channel, AppEventReceiver,
    AppEventSender, CommandReceiver, CommandSender, EffectReceiver, EffectSender, EventReceiver,
    EventSender, NonBlockingSend, SnapshotReceiver, SnapshotSender,
};
