//! Realtime sync client for teamsync.
//!
//! The client follows the action pattern: [`SyncClient::handle`] takes
//! a [`SyncEvent`] and returns [`SyncAction`]s for the driver to
//! execute. Protocol logic performs no I/O and reads no clocks, which
//! makes every reconnection and timer scenario testable under a virtual
//! clock.
//!
//! UI code talks to the narrower [`ChannelSocket`] façade. The optional
//! `transport` feature supplies a QUIC driver that executes the actions
//! against a real server.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod channel;
mod client;
mod event;
#[cfg(feature = "transport")]
pub mod transport;

pub use channel::{ChannelSocket, SocketStatus};
pub use client::SyncClient;
pub use event::{SyncAction, SyncEvent};
