//! # Job Identifiers
//!
//! Each generator draws a random prefix once and then counts. Identifiers are
//! unique for the lifetime of the generator, and collisions across peers are
//! improbable without any coordination.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use meshrpc::JobId;

#[derive(Debug)]
pub struct JobIds {
    prefix: String,
    seq_gen: AtomicU64,
}

impl JobIds {
    pub fn new() -> Self {
        let prefix: u64 = rand::random();
        Self::with_prefix(format!("{:016x}", prefix))
    }

    /// A generator with a fixed prefix, for reproducible identifiers.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            seq_gen: AtomicU64::new(1),
        }
    }

    pub fn next(&self) -> JobId {
        let seq = self.seq_gen.fetch_add(1, Ordering::Relaxed);
        JobId(format!("{}-{}", self.prefix, seq))
    }
}

impl Default for JobIds {
    fn default() -> Self {
        Self::new()
    }
}
