//! Router Logic Module
//!
//! - `task`: the `RouterTask` event loop that owns the [`EventRouter`]
//!
//! ## Serialization Point
//!
//! Every inbound event and UI command is processed by one task, one at a
//! time, regardless of how many producers feed it. Dedup admission and the
//! state change it guards happen inside a single `&mut` call on the router,
//! so two producers racing on the same fingerprint cannot both be admitted.
//! Outputs leave through non-blocking sends; the only suspension point in the
//! loop is waiting for the next input.
//!
//! [`EventRouter`]: meshchat_core::EventRouter

pub mod task;

pub use task::RouterTask;
