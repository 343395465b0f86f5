//! Client inputs and outputs.
//!
//! The client is driven entirely through [`SyncEvent`] values and
//! responds with [`SyncAction`] values for the driver to execute. UI
//! callbacks, transport callbacks, and the periodic timer all funnel
//! into the same `handle` entry point, which is what makes interleaving
//! tolerable: every path goes through the same state machines.

use teamsync_proto::{MessageId, RoomId, ServerEvent, UserId};

pub use teamsync_core::ConnAction as SyncAction;

/// Input to [`SyncClient::handle`](crate::SyncClient::handle).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// A credential became available; connect.
    Login {
        /// Opaque auth token.
        token: String,
    },

    /// Tear everything down.
    Logout,

    /// The user wants membership in a room.
    JoinRoom(RoomId),

    /// The user no longer wants membership in a room.
    LeaveRoom(RoomId),

    /// Read watermarks fetched with a room's history on entry.
    ///
    /// Replaces the room's tracked watermarks wholesale; live receipt
    /// updates merge monotonically on top.
    SeedReceipts {
        /// Room being entered.
        room_id: RoomId,
        /// Per-user watermarks from the history fetch.
        receipts: Vec<(UserId, MessageId)>,
    },

    /// The user typed in a room's composer.
    Keystroke(RoomId),

    /// A room's composer was emptied (message sent or input wiped).
    InputCleared(RoomId),

    /// The user asked for an immediate reconnection attempt.
    RetryNow,

    /// The transport finished its handshake.
    TransportUp,

    /// The transport closed, for any reason.
    TransportDown,

    /// A decoded event arrived from the server.
    EventReceived(ServerEvent),

    /// Periodic timer. Drives retries, typing idle, and typing expiry.
    Tick,
}
