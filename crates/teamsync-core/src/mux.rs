//! Per-kind event fan-out.
//!
//! One inbound event stream from the transport is distributed to
//! independent subscribers keyed by [`EventKind`]. Subscribers are UI
//! surfaces and reconcilers that come and go; the bus itself lives for
//! the whole session and is never torn down by connection churn.
//!
//! Dispatch snapshots the subscriber list before invoking anyone, so a
//! handler that subscribes or unsubscribes during dispatch never affects
//! the in-flight delivery. A handler error is logged and isolated; the
//! remaining handlers for the same event still run.

use std::{cell::RefCell, collections::HashMap, rc::Rc};

use teamsync_proto::{EventKind, ServerEvent};

/// Error a subscriber may surface from its callback.
///
/// Carries a description only; the bus logs it and moves on. Dispatch
/// never propagates subscriber failures to the transport layer.
#[derive(Debug, Clone, thiserror::Error)]
#[error("event handler failed: {0}")]
pub struct HandlerError(pub String);

/// Subscriber callback.
///
/// `Rc` rather than `Box` so dispatch can clone the subscriber list
/// cheaply and release the registry borrow before invoking anyone.
pub type EventHandler = Rc<dyn Fn(&ServerEvent) -> Result<(), HandlerError>>;

/// Handle returned by [`EventBus::subscribe`], used to cancel.
///
/// Copyable token: cancelling twice, or cancelling a subscription that
/// was already removed, is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription {
    kind: EventKind,
    id: u64,
}

struct Slot {
    id: u64,
    handler: EventHandler,
}

#[derive(Default)]
struct Registry {
    slots: HashMap<EventKind, Vec<Slot>>,
    next_id: u64,
}

/// Event multiplexer.
///
/// Single-threaded by design: handlers run on the caller's thread and
/// may re-enter the bus. Interior mutability is scoped so no `RefCell`
/// borrow is held across a handler invocation.
#[derive(Default)]
pub struct EventBus {
    inner: RefCell<Registry>,
}

impl EventBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for one event kind.
    ///
    /// Multiple handlers may subscribe to the same kind; each receives
    /// every matching event. Events of kinds with no subscriber are
    /// dropped silently.
    pub fn subscribe(&self, kind: EventKind, handler: EventHandler) -> Subscription {
        let mut registry = self.inner.borrow_mut();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.slots.entry(kind).or_default().push(Slot { id, handler });
        Subscription { kind, id }
    }

    /// Remove a subscription. Idempotent.
    ///
    /// The kind's slot stays registered even when its last subscriber
    /// leaves, so churn in subscribers never disturbs other kinds.
    pub fn unsubscribe(&self, subscription: Subscription) {
        let mut registry = self.inner.borrow_mut();
        if let Some(slot) = registry.slots.get_mut(&subscription.kind) {
            slot.retain(|s| s.id != subscription.id);
        }
    }

    /// Deliver an event to every subscriber of its kind.
    ///
    /// The subscriber set is snapshotted before the first handler runs:
    /// handlers added during dispatch see only later events, handlers
    /// removed during dispatch still receive this one. Handler errors
    /// are logged and do not stop delivery to the rest.
    pub fn dispatch(&self, event: &ServerEvent) {
        let kind = event.kind();
        let snapshot: Vec<EventHandler> = {
            let registry = self.inner.borrow();
            match registry.slots.get(&kind) {
                Some(slots) => slots.iter().map(|s| Rc::clone(&s.handler)).collect(),
                None => return,
            }
        };

        for handler in snapshot {
            if let Err(error) = handler(event) {
                tracing::warn!(kind = ?kind, %error, "event handler failed");
            }
        }
    }

    /// Number of live subscribers for a kind.
    #[must_use]
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.inner.borrow().slots.get(&kind).map_or(0, Vec::len)
    }
}
