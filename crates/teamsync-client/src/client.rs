//! Sans-IO sync client.
//!
//! [`SyncClient`] composes the core state machines behind one `handle`
//! entry point. It owns no sockets and spawns no tasks: a driver feeds
//! it [`SyncEvent`]s and executes the [`SyncAction`]s it returns. The
//! environment supplies time, so the whole client runs under a virtual
//! clock in tests.

use teamsync_core::{
    BackoffConfig, ConnState, ConnectionManager, Environment, EventBus, EventHandler,
    PresenceReconciler, ReadReceipts, Subscription, TypingSender, TypingSignal, TypingView,
};
use teamsync_proto::{
    ClientCommand, EventKind, MessageId, RoomId, ServerEvent, UserId,
};

use crate::event::{SyncAction, SyncEvent};

/// Realtime sync client state machine.
///
/// One instance per logged-in session. Single-threaded: callbacks from
/// the bus may re-enter queries but never mutate concurrently.
pub struct SyncClient<E: Environment> {
    env: E,
    conn: ConnectionManager<E::Instant>,
    bus: EventBus,
    presence: PresenceReconciler<E::Instant>,
    typing_out: TypingSender<E::Instant>,
    typing_in: TypingView<E::Instant>,
    receipts: ReadReceipts,
    /// Set when the server reports a session-level error; cleared by a
    /// successful handshake or a fresh login.
    last_error: Option<String>,
}

impl<E: Environment> SyncClient<E> {
    /// Create a client with default backoff configuration.
    #[must_use]
    pub fn new(env: E) -> Self {
        Self::with_backoff(env, BackoffConfig::default())
    }

    /// Create a client with explicit backoff configuration.
    #[must_use]
    pub fn with_backoff(env: E, backoff: BackoffConfig) -> Self {
        Self {
            env,
            conn: ConnectionManager::new(backoff),
            bus: EventBus::new(),
            presence: PresenceReconciler::default(),
            typing_out: TypingSender::new(),
            typing_in: TypingView::new(),
            receipts: ReadReceipts::new(),
            last_error: None,
        }
    }

    /// Process one input and return the actions for the driver.
    pub fn handle(&mut self, event: SyncEvent) -> Vec<SyncAction> {
        match event {
            SyncEvent::Login { token } => {
                self.last_error = None;
                self.conn.set_credential(token);
                self.conn.connect()
            },
            SyncEvent::Logout => {
                self.presence = PresenceReconciler::default();
                self.typing_out = TypingSender::new();
                self.typing_in = TypingView::new();
                self.receipts = ReadReceipts::new();
                self.conn.logout()
            },
            SyncEvent::JoinRoom(room_id) => self.conn.join_room(room_id),
            SyncEvent::LeaveRoom(room_id) => {
                self.receipts.forget_room(room_id);
                self.conn.leave_room(room_id)
            },
            SyncEvent::SeedReceipts { room_id, receipts } => {
                self.receipts.set_initial(room_id, &receipts);
                vec![]
            },
            SyncEvent::Keystroke(room_id) => {
                if self.conn.state() != ConnState::Connected {
                    return vec![];
                }
                let now = self.env.now();
                self.typing_out
                    .keystroke(room_id, now)
                    .map(signal_to_action)
                    .into_iter()
                    .collect()
            },
            SyncEvent::InputCleared(room_id) => {
                let signal = self.typing_out.input_cleared(room_id);
                if self.conn.state() != ConnState::Connected {
                    return vec![];
                }
                signal.map(signal_to_action).into_iter().collect()
            },
            SyncEvent::RetryNow => self.conn.retry_now(),
            SyncEvent::TransportUp => {
                self.last_error = None;
                self.conn.transport_opened()
            },
            SyncEvent::TransportDown => {
                let env = self.env.clone();
                self.conn.transport_closed(&env, env.now());
                vec![]
            },
            SyncEvent::EventReceived(event) => {
                self.ingest(&event);
                vec![]
            },
            SyncEvent::Tick => self.tick(),
        }
    }

    /// Send a command if the connection is up.
    ///
    /// Returns `None` while not connected; the caller surfaces this as
    /// a refused send rather than queuing.
    pub fn send_command(&mut self, command: ClientCommand) -> Option<SyncAction> {
        if self.conn.state() == ConnState::Connected {
            Some(SyncAction::SendCommand(command))
        } else {
            None
        }
    }

    /// Route a server event through the reconcilers, then fan it out.
    ///
    /// Reconcilers run first so subscribers observe post-update state
    /// when they query back into the client.
    fn ingest(&mut self, event: &ServerEvent) {
        let now = self.env.now();
        match event {
            ServerEvent::Snapshot { user_ids } => self.presence.apply_snapshot(user_ids),
            ServerEvent::Presence { user_id, status, timestamp, origin } => {
                let _ = self.presence.apply_update(*user_id, *status, *timestamp, *origin, now);
            },
            ServerEvent::TypingStart { room_id, user_id, username } => {
                self.typing_in.apply_start(*room_id, *user_id, username.clone(), now);
            },
            ServerEvent::TypingStop { room_id, user_id } => {
                self.typing_in.apply_stop(*room_id, *user_id);
            },
            ServerEvent::ReceiptUpdate { room_id, user_id, last_read } => {
                let _ = self.receipts.update(*room_id, *user_id, *last_read);
            },
            ServerEvent::RoomJoined { room_id } => self.conn.room_joined(*room_id),
            ServerEvent::Error { code, message } => {
                tracing::warn!(code, message, "server reported error");
                self.last_error = Some(message.clone());
            },
            ServerEvent::Message { .. } => {},
        }
        self.bus.dispatch(event);
    }

    /// Advance all timers.
    fn tick(&mut self) -> Vec<SyncAction> {
        let now = self.env.now();
        let mut actions = self.conn.tick(now);

        let connected = self.conn.state() == ConnState::Connected;
        for signal in self.typing_out.tick(now) {
            if connected {
                actions.push(signal_to_action(signal));
            }
        }

        // Expired remote typists get a synthesized stop so subscribers
        // refresh their rosters without waiting for a server event that
        // may never come.
        for (room_id, user_id) in self.typing_in.tick(now) {
            self.bus.dispatch(&ServerEvent::TypingStop { room_id, user_id });
        }
        actions
    }

    /// Register a handler for one event kind.
    pub fn subscribe(&self, kind: EventKind, handler: EventHandler) -> Subscription {
        self.bus.subscribe(kind, handler)
    }

    /// Remove a subscription. Idempotent.
    pub fn unsubscribe(&self, subscription: Subscription) {
        self.bus.unsubscribe(subscription);
    }

    /// Current connection state.
    #[must_use]
    pub fn connection_state(&self) -> ConnState {
        self.conn.state()
    }

    /// Whether the server reported a session-level error that has not
    /// been cleared by a reconnect or fresh login.
    #[must_use]
    pub fn has_error(&self) -> bool {
        self.last_error.is_some()
    }

    /// Whether a user is currently online.
    #[must_use]
    pub fn is_online(&self, user_id: UserId) -> bool {
        self.presence.is_online(user_id)
    }

    /// All online users, in stable order.
    #[must_use]
    pub fn online_users(&self) -> Vec<UserId> {
        self.presence.online_user_ids().into_iter().collect()
    }

    /// Usernames currently typing in a room.
    #[must_use]
    pub fn typing_users(&self, room_id: RoomId) -> Vec<String> {
        self.typing_in.typing_users(room_id)
    }

    /// Current read watermark for a user in a room.
    #[must_use]
    pub fn read_watermark(&self, room_id: RoomId, user_id: UserId) -> Option<MessageId> {
        self.receipts.watermark(room_id, user_id)
    }

    /// Users whose watermark covers a message, excluding the sender.
    #[must_use]
    pub fn users_who_read(
        &self,
        room_id: RoomId,
        message_id: MessageId,
        excluding: Option<UserId>,
    ) -> Vec<UserId> {
        self.receipts.users_who_read(room_id, message_id, excluding)
    }
}

fn signal_to_action(signal: TypingSignal) -> SyncAction {
    match signal {
        TypingSignal::Start(room_id) => {
            SyncAction::SendCommand(ClientCommand::TypingStart { room_id })
        },
        TypingSignal::Stop(room_id) => {
            SyncAction::SendCommand(ClientCommand::TypingStop { room_id })
        },
    }
}
