//! Read-receipt watermarks.
//!
//! Tracks, per room and per user, the newest message that user has
//! read. Watermarks only advance: receipts arrive over an unordered
//! network path, so an older receipt landing after a newer one must not
//! regress the stored position. With inputs `[5, 3, 9, 7]` the stored
//! watermark ends at 9.

use std::collections::HashMap;

use teamsync_proto::{MessageId, RoomId, UserId};

/// Per-room, per-user monotonic read watermarks.
#[derive(Debug, Clone, Default)]
pub struct ReadReceipts {
    rooms: HashMap<RoomId, HashMap<UserId, MessageId>>,
}

impl ReadReceipts {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed watermarks from room history, bypassing the monotonic check.
    ///
    /// Used when (re)joining a room: the server's state is authoritative
    /// and replaces whatever was tracked before.
    pub fn set_initial(&mut self, room_id: RoomId, receipts: &[(UserId, MessageId)]) {
        let room = self.rooms.entry(room_id).or_default();
        room.clear();
        for &(user_id, message_id) in receipts {
            room.insert(user_id, message_id);
        }
    }

    /// Merge one receipt update.
    ///
    /// Returns `true` when the watermark advanced. Equal or older
    /// positions are ignored, which also makes redelivered receipts
    /// harmless.
    pub fn update(&mut self, room_id: RoomId, user_id: UserId, last_read: MessageId) -> bool {
        let room = self.rooms.entry(room_id).or_default();
        match room.get(&user_id) {
            Some(&current) if last_read <= current => false,
            _ => {
                room.insert(user_id, last_read);
                true
            },
        }
    }

    /// Current watermark for a user in a room.
    #[must_use]
    pub fn watermark(&self, room_id: RoomId, user_id: UserId) -> Option<MessageId> {
        self.rooms.get(&room_id)?.get(&user_id).copied()
    }

    /// Users whose watermark covers a message, sorted by id.
    ///
    /// `excluding` filters one user out, typically the message sender,
    /// who should not appear in their own read roster.
    #[must_use]
    pub fn users_who_read(
        &self,
        room_id: RoomId,
        message_id: MessageId,
        excluding: Option<UserId>,
    ) -> Vec<UserId> {
        let Some(room) = self.rooms.get(&room_id) else {
            return vec![];
        };
        let mut users: Vec<UserId> = room
            .iter()
            .filter(|&(&user_id, &watermark)| {
                watermark >= message_id && Some(user_id) != excluding
            })
            .map(|(&user_id, _)| user_id)
            .collect();
        users.sort_unstable();
        users
    }

    /// Drop all state for a room.
    pub fn forget_room(&mut self, room_id: RoomId) {
        self.rooms.remove(&room_id);
    }
}
