//! Transport connection manager.
//!
//! Owns the lifecycle of the single physical connection and guarantees
//! that desired room membership is eventually reflected server-side.
//! Uses the action pattern: methods take time as input and return actions
//! for the driver to execute, which keeps the state machine pure (no I/O)
//! and makes testing straightforward.
//!
//! # State Machine
//!
//! ```text
//! ┌──────┐ connect  ┌────────────┐  opened   ┌───────────┐
//! │ Idle │─────────>│ Connecting │──────────>│ Connected │
//! └──────┘          └────────────┘           └───────────┘
//!                        ^    │ closed            │ closed
//!                        │    ↓                   ↓
//!                 retry  │  ┌──────────────────────┐
//!                 due    └──│     Disconnected     │
//!                           └──────────────────────┘
//!
//! any state ──logout──> Closed (terminal until a new credential arrives)
//! ```
//!
//! Transport failures are never fatal: handshake failures and mid-session
//! closures both land in `Disconnected` and schedule a retry with
//! exponential backoff and jitter. Only logout tears the manager down.

use std::{
    collections::BTreeMap,
    time::{Duration, Instant},
};

use teamsync_proto::{ClientCommand, RoomId};

use crate::env::Environment;

/// First retry delay.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(500);

/// Cap on the computed backoff delay (before jitter).
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Upper bound of the random jitter added to every retry delay.
pub const DEFAULT_JITTER_BOUND: Duration = Duration::from_millis(1000);

/// Reconnection backoff configuration.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Cap applied to the exponential delay.
    pub max_delay: Duration,
    /// Jitter is drawn uniformly from `[0, jitter_bound)`.
    pub jitter_bound: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            jitter_bound: DEFAULT_JITTER_BOUND,
        }
    }
}

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    /// No connection and no attempt in flight.
    Idle,
    /// Dial issued, waiting for the transport to open.
    Connecting,
    /// Transport open and authenticated.
    Connected,
    /// Transport lost; a retry is scheduled.
    Disconnected,
    /// Torn down by logout. Terminal until a new credential arrives.
    Closed,
}

/// Membership state of a desired room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    /// Join requested (or queued for the next connection).
    Pending,
    /// Join confirmed by the server.
    Joined,
}

/// Actions returned by the connection manager.
///
/// The driver executes these: `Dial` opens the physical transport,
/// `SendCommand` writes a frame, `CloseTransport` releases the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnAction {
    /// Open the physical connection using this credential.
    Dial {
        /// Opaque auth token for the handshake.
        token: String,
    },

    /// Send this command to the server.
    SendCommand(ClientCommand),

    /// Release the physical connection.
    CloseTransport,
}

/// Connection manager state machine.
///
/// Generic over `Instant` to support virtual time in tests. There is
/// exactly one instance per running client; it is constructed by the
/// composition root and injected, never reached through a global.
#[derive(Debug, Clone)]
pub struct ConnectionManager<I = Instant>
where
    I: Copy + Ord + Send + Sync + std::ops::Sub<Output = Duration>,
{
    state: ConnState,
    config: BackoffConfig,
    credential: Option<String>,
    /// Rooms the client intends to be a member of, independent of
    /// connection state. Ordered so join replay is deterministic.
    desired: BTreeMap<RoomId, Membership>,
    /// Consecutive failed attempts since the last successful connect.
    attempt: u32,
    /// Scheduled retry: when the transport closed and how long to wait.
    /// `None` when no retry is pending.
    retry: Option<(I, Duration)>,
}

impl<I> ConnectionManager<I>
where
    I: Copy + Ord + Send + Sync + std::ops::Sub<Output = Duration>,
{
    /// Create a manager in [`ConnState::Idle`] with no credential.
    #[must_use]
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            state: ConnState::Idle,
            config,
            credential: None,
            desired: BTreeMap::new(),
            attempt: 0,
            retry: None,
        }
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnState {
        self.state
    }

    /// Consecutive failed attempts since the last successful connect.
    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Delay of the pending retry, if one is scheduled.
    #[must_use]
    pub fn retry_delay(&self) -> Option<Duration> {
        self.retry.map(|(_, delay)| delay)
    }

    /// Rooms in desired membership, in replay order.
    pub fn desired_rooms(&self) -> impl Iterator<Item = RoomId> + '_ {
        self.desired.keys().copied()
    }

    /// Membership state for a room. `None` if the room is not desired.
    #[must_use]
    pub fn membership(&self, room_id: RoomId) -> Option<Membership> {
        self.desired.get(&room_id).copied()
    }

    /// Install a credential. A `Closed` manager returns to `Idle` so a
    /// new login starts fresh.
    pub fn set_credential(&mut self, token: String) {
        self.credential = Some(token);
        if self.state == ConnState::Closed {
            self.state = ConnState::Idle;
        }
    }

    /// Whether a credential is currently installed.
    #[must_use]
    pub fn has_credential(&self) -> bool {
        self.credential.is_some()
    }

    /// Request a connection attempt.
    ///
    /// Fails closed: without a credential this is a no-op, never a
    /// network error. Concurrent triggers collapse into the in-flight
    /// attempt; calling this while `Connecting` or `Connected` does
    /// nothing.
    pub fn connect(&mut self) -> Vec<ConnAction> {
        let Some(token) = self.credential.clone() else {
            return vec![];
        };

        match self.state {
            ConnState::Idle | ConnState::Disconnected => {
                self.state = ConnState::Connecting;
                self.retry = None;
                vec![ConnAction::Dial { token }]
            },
            ConnState::Connecting | ConnState::Connected | ConnState::Closed => vec![],
        }
    }

    /// Manual "retry now" affordance.
    ///
    /// Collapses into the automatic schedule: an immediate attempt is
    /// made and, if it fails, backoff continues from the current attempt
    /// counter.
    pub fn retry_now(&mut self) -> Vec<ConnAction> {
        self.connect()
    }

    /// The transport completed its handshake.
    ///
    /// Resets the retry counter and replays every desired room as a join
    /// request. Stale callbacks (arriving after logout or a state change)
    /// are ignored.
    pub fn transport_opened(&mut self) -> Vec<ConnAction> {
        if self.state != ConnState::Connecting {
            return vec![];
        }

        self.state = ConnState::Connected;
        self.attempt = 0;
        self.retry = None;

        let mut actions = Vec::with_capacity(self.desired.len());
        for (&room_id, membership) in &mut self.desired {
            *membership = Membership::Pending;
            actions.push(ConnAction::SendCommand(ClientCommand::JoinRoom { room_id }));
        }
        actions
    }

    /// The transport closed (handshake failure or mid-session loss).
    ///
    /// Routes to `Disconnected` and schedules the next retry at
    /// `min(base * 2^attempt, max) + jitter`. Never fatal; retries
    /// continue for as long as a credential remains installed.
    pub fn transport_closed<E>(&mut self, env: &E, now: I)
    where
        E: Environment,
    {
        if matches!(self.state, ConnState::Closed | ConnState::Idle) {
            return;
        }

        self.state = ConnState::Disconnected;
        for membership in self.desired.values_mut() {
            *membership = Membership::Pending;
        }

        let delay = self.next_delay(env);
        self.retry = Some((now, delay));
        self.attempt = self.attempt.saturating_add(1);
    }

    /// Fire the scheduled retry if its deadline has passed.
    ///
    /// Called from the single periodic tick path; safe to call at any
    /// cadence. Fails closed if the credential disappeared meanwhile.
    pub fn tick(&mut self, now: I) -> Vec<ConnAction> {
        if self.state != ConnState::Disconnected {
            return vec![];
        }
        match self.retry {
            Some((closed_at, delay)) if now - closed_at >= delay => self.connect(),
            _ => vec![],
        }
    }

    /// Add a room to desired membership.
    ///
    /// Idempotent: a room already desired produces no second join. While
    /// not connected the room is only buffered; it is replayed on the
    /// next `transport_opened`.
    pub fn join_room(&mut self, room_id: RoomId) -> Vec<ConnAction> {
        if self.state == ConnState::Closed {
            return vec![];
        }
        if self.desired.contains_key(&room_id) {
            return vec![];
        }

        self.desired.insert(room_id, Membership::Pending);
        if self.state == ConnState::Connected {
            vec![ConnAction::SendCommand(ClientCommand::JoinRoom { room_id })]
        } else {
            vec![]
        }
    }

    /// Remove a room from desired membership.
    ///
    /// Always removes locally regardless of connection state; the leave
    /// command is only sent when connected.
    pub fn leave_room(&mut self, room_id: RoomId) -> Vec<ConnAction> {
        let was_desired = self.desired.remove(&room_id).is_some();
        if was_desired && self.state == ConnState::Connected {
            vec![ConnAction::SendCommand(ClientCommand::LeaveRoom { room_id })]
        } else {
            vec![]
        }
    }

    /// Server confirmed membership in a room.
    ///
    /// Ignored if the room was left while the confirmation was in flight.
    pub fn room_joined(&mut self, room_id: RoomId) {
        if let Some(membership) = self.desired.get_mut(&room_id) {
            *membership = Membership::Joined;
        }
    }

    /// Tear the connection down on logout.
    ///
    /// Clears the credential and desired membership, cancels the pending
    /// retry, and releases the transport. A stray retry timer firing
    /// after this is harmless: `tick` no-ops in `Closed`.
    pub fn logout(&mut self) -> Vec<ConnAction> {
        let had_transport =
            matches!(self.state, ConnState::Connecting | ConnState::Connected);

        self.state = ConnState::Closed;
        self.credential = None;
        self.desired.clear();
        self.retry = None;
        self.attempt = 0;

        if had_transport { vec![ConnAction::CloseTransport] } else { vec![] }
    }

    /// Backoff delay for the current attempt: exponential, capped, plus
    /// uniform jitter.
    fn next_delay<E: Environment>(&self, env: &E) -> Duration {
        let shift = self.attempt.min(20);
        let exponential = self
            .config
            .base_delay
            .saturating_mul(1u32.checked_shl(shift).unwrap_or(u32::MAX));
        let capped = exponential.min(self.config.max_delay);

        let jitter_bound_ms = u64::try_from(self.config.jitter_bound.as_millis()).unwrap_or(u64::MAX);
        let jitter = if jitter_bound_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(env.random_u64() % jitter_bound_ms)
        };

        capped + jitter
    }

    /// Backoff delay (without jitter) that would be used for a given
    /// attempt number, for observability and tests.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let shift = attempt.min(20);
        let exponential = self
            .config
            .base_delay
            .saturating_mul(1u32.checked_shl(shift).unwrap_or(u32::MAX));
        exponential.min(self.config.max_delay)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::env::test_utils::MockEnv;

    fn manager() -> ConnectionManager<Instant> {
        let mut m = ConnectionManager::new(BackoffConfig::default());
        m.set_credential("token".to_string());
        m
    }

    fn connected_manager() -> ConnectionManager<Instant> {
        let mut m = manager();
        let _ = m.connect();
        let _ = m.transport_opened();
        m
    }

    #[test]
    fn connect_without_credential_fails_closed() {
        let mut m: ConnectionManager<Instant> = ConnectionManager::new(BackoffConfig::default());
        let actions = m.connect();
        assert!(actions.is_empty());
        assert_eq!(m.state(), ConnState::Idle);
    }

    #[test]
    fn connect_dials_once() {
        let mut m = manager();
        let actions = m.connect();
        assert_eq!(actions.len(), 1);
        assert!(matches!(actions[0], ConnAction::Dial { .. }));
        assert_eq!(m.state(), ConnState::Connecting);

        // Concurrent trigger collapses into the in-flight attempt
        assert!(m.connect().is_empty());
    }

    #[test]
    fn join_while_connected_is_idempotent() {
        let mut m = connected_manager();
        let room = RoomId(7);

        let first = m.join_room(room);
        assert_eq!(first, vec![ConnAction::SendCommand(ClientCommand::JoinRoom { room_id: room })]);

        // N repeat joins produce zero additional commands
        for _ in 0..5 {
            assert!(m.join_room(room).is_empty());
        }
        assert_eq!(m.desired_rooms().count(), 1);
    }

    #[test]
    fn join_while_disconnected_is_buffered() {
        let mut m = manager();
        let actions = m.join_room(RoomId(1));
        assert!(actions.is_empty());
        assert_eq!(m.membership(RoomId(1)), Some(Membership::Pending));
    }

    #[test]
    fn replay_on_reconnect() {
        let env = MockEnv::new();
        let mut m = connected_manager();
        let _ = m.join_room(RoomId(1));
        let _ = m.join_room(RoomId(2));
        m.room_joined(RoomId(1));
        m.room_joined(RoomId(2));

        m.transport_closed(&env, env.now());
        assert_eq!(m.state(), ConnState::Disconnected);

        // No join is sent while disconnected
        assert!(m.join_room(RoomId(3)).is_empty());

        let _ = m.connect();
        let actions = m.transport_opened();

        let joins: Vec<RoomId> = actions
            .iter()
            .filter_map(|a| match a {
                ConnAction::SendCommand(ClientCommand::JoinRoom { room_id }) => Some(*room_id),
                _ => None,
            })
            .collect();
        assert_eq!(joins, vec![RoomId(1), RoomId(2), RoomId(3)]);

        // Exactly one join per room
        assert_eq!(actions.len(), 3);
    }

    #[test]
    fn leave_always_removes_from_desired() {
        let env = MockEnv::new();
        let mut m = connected_manager();
        let _ = m.join_room(RoomId(1));

        m.transport_closed(&env, env.now());
        let actions = m.leave_room(RoomId(1));
        // No command while disconnected, but membership is gone
        assert!(actions.is_empty());
        assert_eq!(m.membership(RoomId(1)), None);

        let _ = m.connect();
        let actions = m.transport_opened();
        assert!(actions.is_empty(), "left room must not be replayed");
    }

    #[test]
    fn leave_while_connected_sends_command() {
        let mut m = connected_manager();
        let _ = m.join_room(RoomId(1));
        let actions = m.leave_room(RoomId(1));
        assert_eq!(
            actions,
            vec![ConnAction::SendCommand(ClientCommand::LeaveRoom { room_id: RoomId(1) })]
        );
    }

    #[test]
    fn backoff_delay_grows_and_caps() {
        let m = manager();
        let mut previous = Duration::ZERO;
        for attempt in 0..12 {
            let delay = m.delay_for_attempt(attempt);
            assert!(delay >= previous, "delay must be non-decreasing");
            assert!(delay <= DEFAULT_MAX_DELAY);
            previous = delay;
        }
        assert_eq!(m.delay_for_attempt(11), DEFAULT_MAX_DELAY);
    }

    #[test]
    fn attempt_counter_resets_after_connect() {
        let env = MockEnv::new();
        let mut m = manager();

        for _ in 0..4 {
            let _ = m.connect();
            m.transport_closed(&env, env.now());
        }
        assert_eq!(m.attempt(), 4);

        let _ = m.connect();
        let _ = m.transport_opened();
        assert_eq!(m.attempt(), 0);
        assert_eq!(m.delay_for_attempt(m.attempt()), DEFAULT_BASE_DELAY);
    }

    #[test]
    fn tick_fires_due_retry() {
        let env = MockEnv::new();
        let mut m = manager();
        let _ = m.connect();
        m.transport_closed(&env, env.now());
        assert!(m.retry_delay().is_some());

        env.advance(Duration::from_secs(60));
        let actions = m.tick(env.now());
        assert_eq!(actions.len(), 1);
        assert!(matches!(actions[0], ConnAction::Dial { .. }));
        assert_eq!(m.state(), ConnState::Connecting);
    }

    #[test]
    fn logout_clears_everything() {
        let mut m = connected_manager();
        let _ = m.join_room(RoomId(1));

        let actions = m.logout();
        assert_eq!(actions, vec![ConnAction::CloseTransport]);
        assert_eq!(m.state(), ConnState::Closed);
        assert_eq!(m.desired_rooms().count(), 0);
        assert!(m.retry_delay().is_none());
        assert!(!m.has_credential());

        // A stray retry tick after teardown is harmless
        assert!(m.tick(Instant::now()).is_empty());
        // Joining after logout is rejected until a new login
        assert!(m.join_room(RoomId(2)).is_empty());
    }

    #[test]
    fn new_login_starts_fresh_from_idle() {
        let mut m = connected_manager();
        let _ = m.logout();
        assert_eq!(m.state(), ConnState::Closed);

        m.set_credential("new-token".to_string());
        assert_eq!(m.state(), ConnState::Idle);
        let actions = m.connect();
        assert_eq!(actions, vec![ConnAction::Dial { token: "new-token".to_string() }]);
    }

    #[test]
    fn handshake_failure_schedules_retry() {
        let env = MockEnv::new();
        let mut m = manager();
        let _ = m.connect();
        assert_eq!(m.state(), ConnState::Connecting);

        m.transport_closed(&env, env.now());
        assert_eq!(m.state(), ConnState::Disconnected);
        assert!(m.retry_delay().is_some());
        assert_eq!(m.attempt(), 1);
    }

    #[test]
    fn stale_transport_opened_is_ignored() {
        let mut m = connected_manager();
        let _ = m.logout();
        assert!(m.transport_opened().is_empty());
        assert_eq!(m.state(), ConnState::Closed);
    }

    proptest::proptest! {
        #[test]
        fn backoff_is_monotonic_and_capped(a in 0u32..64, b in 0u32..64) {
            let m = manager();
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            proptest::prop_assert!(m.delay_for_attempt(lo) <= m.delay_for_attempt(hi));
            proptest::prop_assert!(m.delay_for_attempt(hi) <= DEFAULT_MAX_DELAY);
        }
    }
}
