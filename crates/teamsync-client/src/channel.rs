//! Channel socket façade.
//!
//! Narrow surface handed to UI code: send a command, read the status,
//! subscribe to events. The full [`SyncClient`] stays private to the
//! driver so UI modules cannot reach into connection management.
//!
//! `send` reports truthfully: it returns `false` when the connection is
//! down instead of buffering, so callers decide their own retry or
//! discard policy per message.

use std::{cell::RefCell, collections::VecDeque, fmt};

use teamsync_core::{ConnState, Environment, EventHandler, Subscription};
use teamsync_proto::{ClientCommand, EventKind};

use crate::{
    client::SyncClient,
    event::{SyncAction, SyncEvent},
};

/// Coarse connection status for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketStatus {
    /// A connection attempt is in flight.
    Connecting,
    /// Connected and authenticated.
    Connected,
    /// No connection. Covers idle, retrying, and logged out.
    Disconnected,
    /// The server reported a session-level error.
    Error,
}

impl fmt::Display for SocketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// Shared façade over a [`SyncClient`].
///
/// Interior mutability lets UI callbacks and the driver share one
/// handle on a single thread. Actions produced by any entry point are
/// queued; the driver drains them with [`take_actions`](Self::take_actions).
pub struct ChannelSocket<E: Environment> {
    client: RefCell<SyncClient<E>>,
    actions: RefCell<VecDeque<SyncAction>>,
}

impl<E: Environment> ChannelSocket<E> {
    /// Wrap a client.
    #[must_use]
    pub fn new(client: SyncClient<E>) -> Self {
        Self { client: RefCell::new(client), actions: RefCell::new(VecDeque::new()) }
    }

    /// Feed one input through the client, queuing resulting actions.
    pub fn handle(&self, event: SyncEvent) {
        let actions = self.client.borrow_mut().handle(event);
        self.actions.borrow_mut().extend(actions);
    }

    /// Send a command over the live connection.
    ///
    /// Returns `false` without side effects when disconnected. Nothing
    /// is queued for later delivery.
    pub fn send(&self, command: ClientCommand) -> bool {
        match self.client.borrow_mut().send_command(command) {
            Some(action) => {
                self.actions.borrow_mut().push_back(action);
                true
            },
            None => false,
        }
    }

    /// Current display status.
    #[must_use]
    pub fn status(&self) -> SocketStatus {
        let client = self.client.borrow();
        match client.connection_state() {
            ConnState::Connected => SocketStatus::Connected,
            ConnState::Connecting => SocketStatus::Connecting,
            ConnState::Idle | ConnState::Disconnected | ConnState::Closed => {
                if client.has_error() {
                    SocketStatus::Error
                } else {
                    SocketStatus::Disconnected
                }
            },
        }
    }

    /// Register an event handler.
    pub fn subscribe(&self, kind: EventKind, handler: EventHandler) -> Subscription {
        self.client.borrow().subscribe(kind, handler)
    }

    /// Remove an event handler. Idempotent.
    pub fn unsubscribe(&self, subscription: Subscription) {
        self.client.borrow().unsubscribe(subscription);
    }

    /// Drain all queued actions for the driver to execute.
    #[must_use]
    pub fn take_actions(&self) -> Vec<SyncAction> {
        self.actions.borrow_mut().drain(..).collect()
    }

    /// Run a read-only query against the client.
    pub fn with_client<R>(&self, f: impl FnOnce(&SyncClient<E>) -> R) -> R {
        f(&self.client.borrow())
    }
}
