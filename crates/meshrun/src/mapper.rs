//! # Mappers
//!
//! Handlers a peer is willing to run on behalf of remote custom commands.
//!
//! A custom command names a mapper; it never carries one. Each peer registers
//! its own mappers up front, so the behavior run on a peer is always the
//! behavior that peer chose to expose.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use meshrpc::Command;
use meshrpc::JobId;
use meshrpc::PeerId;
use meshrpc::ResponseShape;
use meshrpc::Val;
use tokio::sync::mpsc;
use tracing::debug;

use crate::registry::Registry;
use crate::store::Store;

/// What a mapper can see of the peer it runs on.
#[derive(Clone, Debug)]
pub struct Context {
    pub peer: PeerId,
    pub store: Store,
    pub registry: Registry,
}

/// Sends values back to the peer that issued a custom job.
///
/// Emitting queues a `custom-response` for broadcast and returns at once.
/// Clones share state, so an emitter moved into a spawned task still honors
/// the job's response shape.
#[derive(Clone, Debug)]
pub struct Emitter {
    shape: ResponseShape,
    fired: Arc<AtomicBool>,
    outbox: mpsc::UnboundedSender<Command>,
}

impl Emitter {
    pub(crate) fn new(shape: ResponseShape, outbox: mpsc::UnboundedSender<Command>) -> Self {
        Self {
            shape,
            fired: Arc::new(AtomicBool::new(false)),
            outbox,
        }
    }

    /// Queues `{jobId, [key]: val}` as a response to `job`.
    ///
    /// Returns false if nothing was queued: the shape is `Once` and a response
    /// was already sent, or the interpreter has shut down.
    pub fn emit(&self, job: &JobId, key: &str, val: impl Into<Val>) -> bool {
        if self.shape == ResponseShape::Once && self.fired.swap(true, Ordering::AcqRel) {
            debug!(%job, key, "suppressing repeat response for once-shaped job");
            return false;
        }

        self.outbox
            .send(Command::custom_response(job.clone(), key, val.into()))
            .is_ok()
    }
}

/// The body of a mapper: `(job, context, resolved value, emitter)`.
pub type MapperFn = Arc<dyn Fn(&JobId, &Context, Val, &Emitter) -> Result<(), String> + Send + Sync>;

/// Mappers by name. Cheap to clone; immutable once built.
#[derive(Clone, Default)]
pub struct Mappers {
    table: Arc<HashMap<String, MapperFn>>,
}

impl Mappers {
    pub fn builder() -> MappersBuilder {
        MappersBuilder::default()
    }

    pub fn get(&self, name: &str) -> Option<MapperFn> {
        self.table.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.table.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for Mappers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}

#[derive(Default)]
pub struct MappersBuilder {
    table: HashMap<String, MapperFn>,
}

impl MappersBuilder {
    pub fn mapper<F>(mut self, name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&JobId, &Context, Val, &Emitter) -> Result<(), String> + Send + Sync + 'static,
    {
        self.table.insert(name.into(), Arc::new(func));
        self
    }

    pub fn build(self) -> Mappers {
        Mappers { table: Arc::new(self.table) }
    }
}
