//! # Interpreter Builder
//!
//! Provides a fluent API for assembling an interpreter from its collaborators.
//!
//! Only the two transports are required. Everything else has a default:
//! protocol `"interpreter"`, a 1 MiB payload limit, a fresh `VersionVector`
//! clock, and an empty registry, store and mapper table.

use std::sync::Arc;
use std::sync::Mutex;

use meshrpc::PeerId;
use tokio::sync::mpsc;
use tracing::debug;

use crate::clock::Clock;
use crate::clock::VersionVector;
use crate::events::Events;
use crate::id::JobIds;
use crate::interpreter::Error;
use crate::interpreter::Interpreter;
use crate::interpreter::Result;
use crate::mapper::Mappers;
use crate::registry::Registry;
use crate::store::Membership;
use crate::store::Store;
use crate::transport::Broadcast;
use crate::transport::Unicast;

pub const DEFAULT_PROTOCOL: &str = "interpreter";
pub const DEFAULT_MAX_PAYLOAD: usize = 1024 * 1024;

/// Fluent builder for an `Interpreter`.
pub struct Builder {
    peer: PeerId,
    protocol: String,
    max_payload: usize,
    registry: Registry,
    store: Store,
    mappers: Mappers,
    events: Events,
    membership: Option<Arc<dyn Membership>>,
    clock: Option<Arc<dyn Clock>>,
    job_ids: Option<JobIds>,
    broadcast: Option<Arc<dyn Broadcast>>,
    unicast: Option<Arc<dyn Unicast>>,
}

impl Builder {
    pub fn new(peer: PeerId) -> Self {
        Self {
            peer,
            protocol: DEFAULT_PROTOCOL.to_string(),
            max_payload: DEFAULT_MAX_PAYLOAD,
            registry: Registry::default(),
            store: Store::new(),
            mappers: Mappers::default(),
            events: Events::new(),
            membership: None,
            clock: None,
            job_ids: None,
            broadcast: None,
            unicast: None,
        }
    }

    /// Name used in logs to tell interpreters on the same peer apart.
    pub fn protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = protocol.into();
        self
    }

    /// Largest encoded command accepted in either direction.
    pub fn max_payload(mut self, bytes: usize) -> Self {
        self.max_payload = bytes;
        self
    }

    pub fn registry(mut self, registry: Registry) -> Self {
        self.registry = registry;
        self
    }

    /// Store to expose; `views` and `jobs` are added unless already present.
    pub fn store(mut self, store: Store) -> Self {
        self.store = store;
        self
    }

    pub fn mappers(mut self, mappers: Mappers) -> Self {
        self.mappers = mappers;
        self
    }

    /// Share an event hub with other components.
    pub fn events(mut self, events: Events) -> Self {
        self.events = events;
        self
    }

    /// Source of the `views` entry.
    pub fn membership(mut self, membership: impl Membership) -> Self {
        self.membership = Some(Arc::new(membership));
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn job_ids(mut self, job_ids: JobIds) -> Self {
        self.job_ids = Some(job_ids);
        self
    }

    pub fn broadcast(mut self, broadcast: impl Broadcast) -> Self {
        self.broadcast = Some(Arc::new(broadcast));
        self
    }

    pub fn unicast(mut self, unicast: impl Unicast) -> Self {
        self.unicast = Some(Arc::new(unicast));
        self
    }

    pub fn build(self) -> Result<Arc<Interpreter>> {
        let broadcast = self.broadcast.ok_or(Error::MissingTransport("broadcast"))?;
        let unicast = self.unicast.ok_or(Error::MissingTransport("unicast"))?;

        self.store.install_defaults(self.membership);
        let clock = self.clock
            .unwrap_or_else(|| Arc::new(VersionVector::new(self.peer.clone())));
        let (outbox_tx, outbox_rx) = mpsc::unbounded_channel();

        debug!(
            peer = %self.peer,
            protocol = %self.protocol,
            operations = ?self.registry.names(),
            mappers = ?self.mappers.names(),
            "interpreter built"
        );

        Ok(Arc::new(Interpreter {
            peer: self.peer,
            protocol: self.protocol,
            registry: self.registry,
            store: self.store,
            mappers: self.mappers,
            events: self.events,
            clock,
            job_ids: self.job_ids.unwrap_or_default(),
            max_payload: self.max_payload,
            broadcast,
            unicast,
            outbox_tx,
            outbox_rx: Mutex::new(Some(outbox_rx)),
            send_lock: tokio::sync::Mutex::new(()),
        }))
    }
}
