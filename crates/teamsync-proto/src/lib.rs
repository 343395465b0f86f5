//! Protocol shapes for the teamsync realtime layer.
//!
//! Defines the closed set of events the server pushes to clients
//! ([`ServerEvent`]) and the commands clients emit ([`ClientCommand`]),
//! plus the length-delimited CBOR wire codec used to move them over a
//! single duplex connection.
//!
//! Event kinds are a closed enum ([`EventKind`]) rather than free-form
//! strings, so the multiplexer's registry keys are checked at compile
//! time. All identifiers are normalized at the deserialization boundary
//! (see [`UserId`]); nothing above this crate ever sees a numeral-as-text
//! identifier.
//!
//! # Validation policy
//!
//! Malformed input is rejected here with a [`ProtocolError`] and dropped
//! by the ingestion layer (logged, never propagated). Unknown event
//! variants fail CBOR decoding rather than being silently ignored.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod command;
mod errors;
mod event;
mod ids;
pub mod wire;

pub use command::{ClientCommand, ReactionOp};
pub use errors::ProtocolError;
pub use event::{EventKind, PresenceOrigin, PresenceStatus, ServerEvent};
pub use ids::{MessageId, RoomId, UserId};
