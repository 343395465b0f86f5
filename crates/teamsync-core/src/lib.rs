//! Core state machines for the teamsync realtime synchronization layer.
//!
//! Everything in this crate is sans-IO: state machines consume events and
//! the current time as plain inputs and return actions for a driver to
//! execute. Time is never read from the system clock inside protocol
//! logic, and no component here blocks or performs I/O, which keeps the
//! whole layer testable with a virtual clock.
//!
//! # Components
//!
//! - [`ConnectionManager`]: lifecycle of the single physical connection,
//!   reconnection backoff, desired room membership and join replay
//! - [`EventBus`]: fans one inbound event stream out to independent
//!   per-kind subscribers
//! - [`PresenceReconciler`]: authoritative online set with flap
//!   suppression
//! - [`TypingSender`] / [`TypingView`]: keystroke debouncing and decaying
//!   "who is typing" state
//! - [`ReadReceipts`]: monotonic per-user read watermarks
//!
//! All "concurrency" is interleaving of callbacks on one thread; the
//! machines tolerate re-entry from timer paths by being idempotent rather
//! than by locking.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod conn;
pub mod env;
mod mux;
mod presence;
mod receipts;
mod typing;

pub use conn::{
    BackoffConfig, ConnAction, ConnState, ConnectionManager, DEFAULT_BASE_DELAY,
    DEFAULT_JITTER_BOUND, DEFAULT_MAX_DELAY, Membership,
};
pub use env::Environment;
pub use mux::{EventBus, EventHandler, HandlerError, Subscription};
pub use presence::{DEFAULT_SUPPRESSION_WINDOW, PresenceReconciler};
pub use receipts::ReadReceipts;
pub use typing::{
    TYPING_DEBOUNCE, TYPING_EXPIRY, TYPING_IDLE, TypingSender, TypingSignal, TypingView,
};
