//! Outbound client command taxonomy.

use serde::{Deserialize, Serialize};

use crate::ids::{MessageId, RoomId};

/// Adding or removing a reaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReactionOp {
    /// Attach the emoji to the message.
    Add,
    /// Remove a previously attached emoji.
    Remove,
}

/// Commands the client sends to the server.
///
/// All sends are fire-and-forget: results arrive later as
/// [`crate::ServerEvent`]s, never as awaited replies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientCommand {
    /// Authentication handshake, sent once per physical connection.
    Auth {
        /// Opaque credential supplied by the credential provider.
        token: String,
    },

    /// Request membership in a room.
    JoinRoom {
        /// Room to join.
        room_id: RoomId,
    },

    /// Drop membership in a room.
    LeaveRoom {
        /// Room to leave.
        room_id: RoomId,
    },

    /// Send a chat message.
    Send {
        /// Destination room.
        room_id: RoomId,
        /// Message body.
        content: String,
        /// Client-side timestamp in Unix milliseconds.
        timestamp: u64,
    },

    /// Signal that the local user started typing.
    TypingStart {
        /// Room being typed in.
        room_id: RoomId,
    },

    /// Signal that the local user stopped typing.
    TypingStop {
        /// Room no longer being typed in.
        room_id: RoomId,
    },

    /// Add or remove an emoji reaction on a message.
    Reaction {
        /// Room containing the message.
        room_id: RoomId,
        /// Message being reacted to.
        message_id: MessageId,
        /// Emoji identifier.
        emoji: String,
        /// Add or remove.
        op: ReactionOp,
    },
}

impl ClientCommand {
    /// Room this command targets. `None` for connection-wide commands.
    #[must_use]
    pub const fn room_id(&self) -> Option<RoomId> {
        match self {
            Self::JoinRoom { room_id }
            | Self::LeaveRoom { room_id }
            | Self::Send { room_id, .. }
            | Self::TypingStart { room_id }
            | Self::TypingStop { room_id }
            | Self::Reaction { room_id, .. } => Some(*room_id),
            Self::Auth { .. } => None,
        }
    }
}
