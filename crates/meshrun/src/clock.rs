//! # Causal Clock
//!
//! The version-vector collaborator. The interpreter asks it for the next token
//! before a broadcast and commits that token once the transport accepted the
//! payload, so a failed send leaves no gap in the sequence. Merging and
//! comparison belong to whoever implements causal delivery.
//!
//! `peek` and `commit` are not atomic together; the interpreter serializes
//! its broadcasts around them.

use dashmap::DashMap;
use meshrpc::CausalToken;
use meshrpc::PeerId;

/// Issues causal-order tokens for outbound broadcasts.
pub trait Clock: Send + Sync + 'static {
    /// The token the next broadcast will carry. Does not advance the clock.
    fn peek(&self) -> CausalToken;

    /// Advances this peer's component to `token`.
    fn commit(&self, token: &CausalToken);

    /// Advances this peer's component and returns the token it now stands at.
    fn increment(&self) -> CausalToken {
        let token = self.peek();
        self.commit(&token);
        token
    }
}

/// A version vector: one monotonic counter per peer.
#[derive(Debug)]
pub struct VersionVector {
    local: PeerId,
    entries: DashMap<PeerId, u64>,
}

impl VersionVector {
    pub fn new(local: PeerId) -> Self {
        Self {
            local,
            entries: DashMap::new(),
        }
    }

    /// Reads the counter for `peer` (zero if never seen).
    pub fn get(&self, peer: &PeerId) -> u64 {
        self.entries.get(peer).map(|v| *v).unwrap_or(0)
    }

    /// Merges a remote token: the entry for its origin becomes the max of both.
    pub fn observe(&self, token: &CausalToken) {
        let mut entry = self.entries.entry(token.origin.clone()).or_insert(0);
        if token.counter > *entry {
            *entry = token.counter;
        }
    }

    pub fn local(&self) -> &PeerId {
        &self.local
    }
}

impl Clock for VersionVector {
    fn peek(&self) -> CausalToken {
        CausalToken {
            origin: self.local.clone(),
            counter: self.get(&self.local) + 1,
        }
    }

    fn commit(&self, token: &CausalToken) {
        self.observe(token);
    }
}
