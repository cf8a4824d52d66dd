//! # Local Result Events
//!
//! Results of remote execution surface here, for application code to observe.
//!
//! Listeners are keyed by a sequence number and stored in a concurrent map, so
//! subscribing and cancelling never contend with emission. An event is handed
//! to every listener of its kind that is registered when it is emitted; an
//! event nobody listens to is simply not observed.

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::Weak;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use dashmap::DashMap;
use meshrpc::Command;
use meshrpc::Outcome;
use meshrpc::PeerId;
use meshrpc::Val;
use tokio::sync::mpsc;
use tracing::warn;

#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
pub enum EventKind {
    BroadcastResult,
    BroadcastCustomResult,
    UnicastResult,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// An `rpc` delivered by broadcast was run locally.
    BroadcastResult { result: Outcome, command: Command },
    /// A `custom-response` arrived by broadcast.
    BroadcastCustomResult { value: BTreeMap<String, Val>, command: Command },
    /// An `rpc` delivered by unicast from `sender` was run locally.
    UnicastResult { result: Outcome, sender: PeerId, command: Command },
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::BroadcastResult { .. } => EventKind::BroadcastResult,
            Event::BroadcastCustomResult { .. } => EventKind::BroadcastCustomResult,
            Event::UnicastResult { .. } => EventKind::UnicastResult,
        }
    }

    pub fn command(&self) -> &Command {
        match self {
            Event::BroadcastResult { command, .. }
            | Event::BroadcastCustomResult { command, .. }
            | Event::UnicastResult { command, .. } => command,
        }
    }
}

pub type Listener = Arc<dyn Fn(&Event) + Send + Sync>;

struct Registered {
    kind: EventKind,
    listener: Listener,
}

#[derive(Default)]
struct EventsInner {
    listeners: DashMap<u64, Registered>,
    seq_gen: AtomicU64,
}

/// Event hub. Clones share the same listeners.
#[derive(Clone, Default)]
pub struct Events {
    inner: Arc<EventsInner>,
}

impl Events {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls `listener` for every future event of `kind` until the subscription ends.
    pub fn on<F>(&self, kind: EventKind, listener: F) -> Subscription
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let id = self.inner.seq_gen.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners.insert(id, Registered {
            kind,
            listener: Arc::new(listener),
        });
        Subscription {
            id,
            events: Arc::downgrade(&self.inner),
        }
    }

    /// Forwards every future event of `kind` into a channel.
    pub fn channel(&self, kind: EventKind) -> (Subscription, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sub = self.on(kind, move |event| {
            let _ = tx.send(event.clone());
        });
        (sub, rx)
    }

    /// Delivers `event` to the listeners of its kind, in subscription order.
    pub fn emit(&self, event: Event) {
        let kind = event.kind();

        // Snapshot first so listeners may subscribe or cancel while being called.
        let mut targets: Vec<(u64, Listener)> = self.inner.listeners
            .iter()
            .filter(|e| e.value().kind == kind)
            .map(|e| (*e.key(), e.value().listener.clone()))
            .collect();
        targets.sort_unstable_by_key(|(id, _)| *id);

        for (id, listener) in targets {
            if std::panic::catch_unwind(AssertUnwindSafe(|| listener(&event))).is_err() {
                warn!(listener = id, ?kind, "event listener panicked");
            }
        }
    }

    /// Number of live listeners across all kinds.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }
}

/// A live listener registration. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes its listener"]
pub struct Subscription {
    id: u64,
    events: Weak<EventsInner>,
}

impl Subscription {
    pub fn cancel(self) {
        // Drop does the work.
    }

    /// Keeps the listener registered for the life of the event hub.
    pub fn detach(self) {
        let mut this = std::mem::ManuallyDrop::new(self);
        this.events = Weak::new();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(events) = self.events.upgrade() {
            events.listeners.remove(&self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
