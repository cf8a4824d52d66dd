//! # Commands
//!
//! The unit of remote work exchanged between peers.
//!
//! ## Invariants
//! - A command is built once by one of the constructors below and never mutated.
//! - `Custom` and `CustomResponse` always carry a `JobId`; `Rpc` never does.
//! - A `CustomResponse` value map always contains the `jobId` field.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::val::Val;

/// The field under which a custom response repeats its job identifier.
pub const JOB_ID_FIELD: &str = "jobId";

/// Opaque job identifier correlating a custom request with its responses.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// Strong type for peer identifiers.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(pub String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "peer-{}", self.0)
    }
}

/// A causal-order token issued by the sender's clock for one broadcast.
#[derive(Clone, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct CausalToken {
    pub origin: PeerId,
    pub counter: u64,
}

/// How many responses a receiving peer forwards for one custom job.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResponseShape {
    /// Every emitter call produces a response.
    #[default]
    Stream,
    /// Only the first emitter call produces a response.
    Once,
}

/// The message kind, without its payload.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CommandKind {
    Rpc,
    Custom,
    CustomResponse,
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rpc => write!(f, "rpc"),
            Self::Custom => write!(f, "custom"),
            Self::CustomResponse => write!(f, "custom-response"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Command {
    /// Invoke a registered operation by name.
    Rpc {
        name: String,
        args: Vec<Val>,
    },
    /// Resolve `key` in the receiver's store and run the receiver's own
    /// mapper registered under `mapper` on the result.
    Custom {
        job: JobId,
        key: String,
        mapper: String,
        #[serde(default)]
        shape: ResponseShape,
    },
    /// A value emitted by a mapper, addressed back to the job that asked for it.
    CustomResponse {
        job: JobId,
        value: BTreeMap<String, Val>,
    },
}

impl Command {
    pub fn rpc(name: impl Into<String>, args: Vec<Val>) -> Self {
        Command::Rpc { name: name.into(), args }
    }

    pub fn custom(job: JobId, key: impl Into<String>, mapper: impl Into<String>, shape: ResponseShape) -> Self {
        Command::Custom {
            job,
            key: key.into(),
            mapper: mapper.into(),
            shape,
        }
    }

    /// Builds the response `{jobId, [key]: val}` for `job`.
    pub fn custom_response(job: JobId, key: impl Into<String>, val: Val) -> Self {
        let mut value = BTreeMap::new();
        value.insert(JOB_ID_FIELD.to_string(), Val::String(job.0.clone()));
        value.insert(key.into(), val);
        Command::CustomResponse { job, value }
    }

    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Rpc { .. } => CommandKind::Rpc,
            Command::Custom { .. } => CommandKind::Custom,
            Command::CustomResponse { .. } => CommandKind::CustomResponse,
        }
    }

    /// The job this command belongs to, if any.
    pub fn job(&self) -> Option<&JobId> {
        match self {
            Command::Rpc { .. } => None,
            Command::Custom { job, .. } | Command::CustomResponse { job, .. } => Some(job),
        }
    }
}
