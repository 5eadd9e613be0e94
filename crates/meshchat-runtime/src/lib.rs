//! MeshChat Runtime
//!
//! Runs the routing core as a single tokio task:
//! - `RouterTask`: the loop that serializes every event and command through
//!   one [`EventRouter`](meshchat_core::EventRouter)
//! - `RuntimeBuilder` / `RuntimeHandle`: start the task and talk to it
//!
//! `meshchat-core` defines what happens to an event; this crate decides when.

pub mod builder;
pub mod logic;

pub use builder::{RuntimeBuilder, RuntimeHandle};
pub use logic::RouterTask;

// Re-export core types for convenience
pub use meshchat_core::{
    channel::{
        AppEventReceiver, AppEventSender, ChannelError, CommandReceiver, CommandSender,
        EffectReceiver, EffectSender, EventReceiver, EventSender, NonBlockingSend,
        SnapshotReceiver, SnapshotSender,
    },
    AppEvent, Command, Effect, Event, MeshConfig, MeshError, MeshResult, MeshSnapshot, PeerId,
};
