//! Inbound server event taxonomy.
//!
//! [`ServerEvent`] is the closed union of everything the server pushes
//! over the duplex connection. Each variant maps to exactly one
//! [`EventKind`], the key the multiplexer fans out on. Adding a variant
//! without a kind is a compile error (exhaustive match in
//! [`ServerEvent::kind`]).

use serde::{Deserialize, Serialize};

use crate::ids::{MessageId, RoomId, UserId};

/// Online/offline status carried by presence updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PresenceStatus {
    /// User is online.
    Online,
    /// User is offline.
    Offline,
}

/// Where a presence update came from.
///
/// Full roster snapshots replace client state unconditionally;
/// incremental updates go through duplicate and flap suppression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PresenceOrigin {
    /// Part of a full roster snapshot.
    Snapshot,
    /// Single-user incremental update.
    Incremental,
}

/// Events pushed by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerEvent {
    /// Full online-roster snapshot. Replaces all presence state.
    Snapshot {
        /// Every user currently online.
        user_ids: Vec<UserId>,
    },

    /// Incremental presence update for one user.
    Presence {
        /// Affected user.
        user_id: UserId,
        /// New status.
        status: PresenceStatus,
        /// Server-side timestamp in Unix milliseconds.
        timestamp: u64,
        /// Snapshot or incremental origin tag.
        origin: PresenceOrigin,
    },

    /// A user started typing in a room.
    TypingStart {
        /// Room the user is typing in.
        room_id: RoomId,
        /// Typing user.
        user_id: UserId,
        /// Display name for the indicator.
        username: String,
    },

    /// A user stopped typing in a room.
    TypingStop {
        /// Room the user was typing in.
        room_id: RoomId,
        /// User who stopped.
        user_id: UserId,
    },

    /// Chat message delivered to a room.
    Message {
        /// Destination room.
        room_id: RoomId,
        /// Room-scoped message identifier.
        message_id: MessageId,
        /// Author of the message.
        sender_id: UserId,
        /// Message body.
        content: String,
        /// Server-side timestamp in Unix milliseconds.
        timestamp: u64,
    },

    /// A user's read watermark advanced.
    ReceiptUpdate {
        /// Room the receipt applies to.
        room_id: RoomId,
        /// User whose watermark moved.
        user_id: UserId,
        /// Furthest message the user has read.
        last_read: MessageId,
    },

    /// Server confirmed room membership.
    RoomJoined {
        /// Room that was joined.
        room_id: RoomId,
    },

    /// Server-reported error.
    Error {
        /// Machine-readable error code.
        code: u16,
        /// Human-readable description.
        message: String,
    },
}

impl ServerEvent {
    /// Kind tag used as the multiplexer registry key.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Snapshot { .. } => EventKind::Snapshot,
            Self::Presence { .. } => EventKind::Presence,
            Self::TypingStart { .. } => EventKind::TypingStart,
            Self::TypingStop { .. } => EventKind::TypingStop,
            Self::Message { .. } => EventKind::Message,
            Self::ReceiptUpdate { .. } => EventKind::ReceiptUpdate,
            Self::RoomJoined { .. } => EventKind::RoomJoined,
            Self::Error { .. } => EventKind::Error,
        }
    }

    /// Room this event is scoped to. `None` for connection-wide events.
    #[must_use]
    pub const fn room_id(&self) -> Option<RoomId> {
        match self {
            Self::TypingStart { room_id, .. }
            | Self::TypingStop { room_id, .. }
            | Self::Message { room_id, .. }
            | Self::ReceiptUpdate { room_id, .. }
            | Self::RoomJoined { room_id } => Some(*room_id),
            Self::Snapshot { .. } | Self::Presence { .. } | Self::Error { .. } => None,
        }
    }
}

/// Discriminant of [`ServerEvent`], used to key subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Full presence roster snapshot.
    Snapshot,
    /// Incremental presence update.
    Presence,
    /// Typing started.
    TypingStart,
    /// Typing stopped.
    TypingStop,
    /// Chat message.
    Message,
    /// Read-receipt watermark update.
    ReceiptUpdate,
    /// Room membership confirmation.
    RoomJoined,
    /// Server error.
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_variant() {
        let event = ServerEvent::RoomJoined { room_id: RoomId(3) };
        assert_eq!(event.kind(), EventKind::RoomJoined);

        let event = ServerEvent::Snapshot { user_ids: vec![] };
        assert_eq!(event.kind(), EventKind::Snapshot);
    }

    #[test]
    fn room_scoped_events_expose_room() {
        let event = ServerEvent::Message {
            room_id: RoomId(9),
            message_id: MessageId(1),
            sender_id: UserId(2),
            content: "hi".to_string(),
            timestamp: 0,
        };
        assert_eq!(event.room_id(), Some(RoomId(9)));

        let event = ServerEvent::Presence {
            user_id: UserId(2),
            status: PresenceStatus::Online,
            timestamp: 0,
            origin: PresenceOrigin::Incremental,
        };
        assert_eq!(event.room_id(), None);
    }
}
