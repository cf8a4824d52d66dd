//! # Remote Store
//!
//! Named local state that custom commands may reference by key.
//!
//! An entry is either a plain value or a thunk that produces one on demand.
//! Thunks are how live views (such as the current neighbour list) are exposed
//! without copying them on every change.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use meshrpc::JobId;
use meshrpc::PeerId;
use meshrpc::Val;

/// Key of the built-in neighbour view.
pub const VIEWS_KEY: &str = "views";
/// Key of the built-in job bookkeeping map.
pub const JOBS_KEY: &str = "jobs";

/// Which peers this peer can currently reach.
pub trait Membership: Send + Sync + 'static {
    fn neighbours(&self) -> Vec<PeerId>;
}

pub type Thunk = Arc<dyn Fn() -> Val + Send + Sync>;

#[derive(Clone)]
pub enum Entry {
    Value(Val),
    Thunk(Thunk),
}

impl Entry {
    /// Produces the concrete value, invoking a thunk with no arguments.
    pub fn resolve(&self) -> Val {
        match self {
            Entry::Value(val) => val.clone(),
            Entry::Thunk(thunk) => thunk(),
        }
    }
}

impl std::fmt::Debug for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Entry::Value(val) => f.debug_tuple("Value").field(val).finish(),
            Entry::Thunk(_) => f.write_str("Thunk"),
        }
    }
}

/// Key-value store of entries. Clones share the same underlying map.
#[derive(Clone, Debug, Default)]
pub struct Store {
    entries: Arc<DashMap<String, Entry>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store holding the built-in `views` and `jobs` entries.
    pub fn with_defaults(membership: Option<Arc<dyn Membership>>) -> Self {
        let store = Self::new();
        store.install_defaults(membership);
        store
    }

    /// Installs `views` and `jobs`, leaving any existing entries under those keys alone.
    pub fn install_defaults(&self, membership: Option<Arc<dyn Membership>>) {
        self.entries.entry(VIEWS_KEY.to_string()).or_insert_with(|| {
            Entry::Thunk(Arc::new(move || {
                let peers = membership
                    .as_ref()
                    .map(|m| m.neighbours())
                    .unwrap_or_default();
                Val::List(peers.into_iter().map(|p| Val::String(p.0)).collect())
            }))
        });
        self.entries
            .entry(JOBS_KEY.to_string())
            .or_insert_with(|| Entry::Value(Val::Map(BTreeMap::new())));
    }

    pub fn insert_value(&self, key: impl Into<String>, val: impl Into<Val>) {
        self.entries.insert(key.into(), Entry::Value(val.into()));
    }

    pub fn insert_thunk<F>(&self, key: impl Into<String>, thunk: F)
    where
        F: Fn() -> Val + Send + Sync + 'static,
    {
        self.entries.insert(key.into(), Entry::Thunk(Arc::new(thunk)));
    }

    pub fn remove(&self, key: &str) -> Option<Entry> {
        self.entries.remove(key).map(|(_, entry)| entry)
    }

    pub fn get(&self, key: &str) -> Option<Entry> {
        self.entries.get(key).map(|e| e.value().clone())
    }

    /// Looks up `key` and produces its concrete value. `None` if absent.
    pub fn resolve(&self, key: &str) -> Option<Val> {
        // Clone the entry out first so a thunk may itself read the store.
        self.get(key).map(|entry| entry.resolve())
    }

    /// Records that this peer issued `job` against `key` in the `jobs` map.
    pub fn record_job(&self, job: &JobId, key: &str) {
        let mut entry = self.entries
            .entry(JOBS_KEY.to_string())
            .or_insert_with(|| Entry::Value(Val::Map(BTreeMap::new())));

        if let Entry::Value(Val::Map(jobs)) = entry.value_mut() {
            jobs.insert(job.0.clone(), Val::String(key.to_string()));
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
