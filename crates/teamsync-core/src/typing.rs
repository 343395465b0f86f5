//! Typing indicators.
//!
//! Two halves. [`TypingSender`] debounces the local user's keystrokes
//! into start/stop signals so the server sees one start per burst, not
//! one per keypress. [`TypingView`] holds the decaying "who is typing"
//! state for remote users, expiring entries whose stop signal was lost.
//!
//! The inbound expiry (3s) is deliberately longer than the outbound
//! re-send interval (2s): a continuously typing peer refreshes its entry
//! before it decays, so the indicator never blinks.

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use teamsync_proto::{RoomId, UserId};

/// Minimum interval between outbound typing-start signals per room.
pub const TYPING_DEBOUNCE: Duration = Duration::from_secs(2);

/// Keystroke silence after which an outbound typing-stop is sent.
pub const TYPING_IDLE: Duration = Duration::from_millis(2500);

/// Age at which a remote typing entry expires without an explicit stop.
pub const TYPING_EXPIRY: Duration = Duration::from_secs(3);

/// Outbound typing signal produced by [`TypingSender`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypingSignal {
    /// Tell the server the local user started (or is still) typing.
    Start(RoomId),
    /// Tell the server the local user stopped typing.
    Stop(RoomId),
}

#[derive(Debug, Clone, Copy)]
struct OutboundState<I> {
    last_start_sent: I,
    last_keystroke: I,
}

/// Debounces local keystrokes into typing signals.
///
/// Tracks each room independently; composing in two rooms at once
/// produces independent signal streams.
#[derive(Debug, Clone, Default)]
pub struct TypingSender<I = Instant>
where
    I: Copy + Ord + Send + Sync + std::ops::Sub<Output = Duration>,
{
    rooms: HashMap<RoomId, OutboundState<I>>,
}

impl<I> TypingSender<I>
where
    I: Copy + Ord + Send + Sync + std::ops::Sub<Output = Duration>,
{
    /// Create a sender with no active rooms.
    #[must_use]
    pub fn new() -> Self {
        Self { rooms: HashMap::new() }
    }

    /// Record a keystroke in a room's composer.
    ///
    /// Emits a start signal for the first keystroke of a burst and then
    /// at most once per [`TYPING_DEBOUNCE`] while typing continues.
    pub fn keystroke(&mut self, room_id: RoomId, now: I) -> Option<TypingSignal> {
        match self.rooms.get_mut(&room_id) {
            Some(state) => {
                state.last_keystroke = now;
                if now - state.last_start_sent >= TYPING_DEBOUNCE {
                    state.last_start_sent = now;
                    Some(TypingSignal::Start(room_id))
                } else {
                    None
                }
            },
            None => {
                self.rooms.insert(
                    room_id,
                    OutboundState { last_start_sent: now, last_keystroke: now },
                );
                Some(TypingSignal::Start(room_id))
            },
        }
    }

    /// The composer was cleared (message sent or input wiped).
    ///
    /// Emits an immediate stop without waiting for the idle timeout.
    pub fn input_cleared(&mut self, room_id: RoomId) -> Option<TypingSignal> {
        self.rooms.remove(&room_id).map(|_| TypingSignal::Stop(room_id))
    }

    /// Emit stop signals for rooms whose composer has gone idle.
    ///
    /// Called from the periodic tick path. Safe at any cadence; each
    /// idle room produces exactly one stop.
    pub fn tick(&mut self, now: I) -> Vec<TypingSignal> {
        let idle: Vec<RoomId> = self
            .rooms
            .iter()
            .filter(|(_, state)| now - state.last_keystroke >= TYPING_IDLE)
            .map(|(&room_id, _)| room_id)
            .collect();

        idle.iter().for_each(|room_id| {
            self.rooms.remove(room_id);
        });
        idle.into_iter().map(TypingSignal::Stop).collect()
    }

    /// Whether the local user is considered typing in a room.
    #[must_use]
    pub fn is_typing(&self, room_id: RoomId) -> bool {
        self.rooms.contains_key(&room_id)
    }
}

#[derive(Debug, Clone)]
struct InboundEntry<I> {
    username: String,
    last_start: I,
}

/// Decaying "who is typing" state for remote users.
#[derive(Debug, Clone, Default)]
pub struct TypingView<I = Instant>
where
    I: Copy + Ord + Send + Sync + std::ops::Sub<Output = Duration>,
{
    entries: HashMap<(RoomId, UserId), InboundEntry<I>>,
}

impl<I> TypingView<I>
where
    I: Copy + Ord + Send + Sync + std::ops::Sub<Output = Duration>,
{
    /// Create an empty view.
    #[must_use]
    pub fn new() -> Self {
        Self { entries: HashMap::new() }
    }

    /// A remote user started typing. Repeats refresh the expiry clock.
    pub fn apply_start(&mut self, room_id: RoomId, user_id: UserId, username: String, now: I) {
        self.entries
            .insert((room_id, user_id), InboundEntry { username, last_start: now });
    }

    /// A remote user stopped typing. Unknown entries are ignored.
    pub fn apply_stop(&mut self, room_id: RoomId, user_id: UserId) {
        self.entries.remove(&(room_id, user_id));
    }

    /// Drop entries older than [`TYPING_EXPIRY`].
    ///
    /// Returns the expired (room, user) pairs so the caller can refresh
    /// the affected rosters.
    pub fn tick(&mut self, now: I) -> Vec<(RoomId, UserId)> {
        let expired: Vec<(RoomId, UserId)> = self
            .entries
            .iter()
            .filter(|(_, entry)| now - entry.last_start >= TYPING_EXPIRY)
            .map(|(&key, _)| key)
            .collect();

        expired.iter().for_each(|key| {
            self.entries.remove(key);
        });
        expired
    }

    /// Usernames currently typing in a room, sorted by user id.
    #[must_use]
    pub fn typing_users(&self, room_id: RoomId) -> Vec<String> {
        let mut users: Vec<(UserId, &str)> = self
            .entries
            .iter()
            .filter(|((room, _), _)| *room == room_id)
            .map(|(&(_, user_id), entry)| (user_id, entry.username.as_str()))
            .collect();
        users.sort_by_key(|&(user_id, _)| user_id);
        users.into_iter().map(|(_, name)| name.to_string()).collect()
    }
}
