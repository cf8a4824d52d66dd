//! # Error Definitions
//!
//! Codec failures, and the tagged reasons a remote execution can fail.

use serde::Deserialize;
use serde::Serialize;

use crate::val::Val;

/// Failures while moving a command to or from bytes.
#[derive(Debug, Clone)]
pub enum Error {
    /// The bytes were not a well-formed envelope.
    Malformed(String),
    /// The command could not be serialized.
    Serialization(String),
    /// The envelope was produced by an incompatible protocol version.
    UnsupportedVersion { expected: u16, found: u16 },
    /// The payload exceeded the configured limit.
    PayloadTooLarge { limit: usize, found: usize },
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed(msg) => write!(f, "Malformed envelope: {}", msg),
            Self::Serialization(msg) => write!(f, "Serialization failed: {}", msg),
            Self::UnsupportedVersion { expected, found } => {
                write!(f, "Unsupported protocol version: expected {}, found {}", expected, found)
            }
            Self::PayloadTooLarge { limit, found } => {
                write!(f, "Payload of {} bytes exceeds limit of {} bytes", found, limit)
            }
        }
    }
}

impl std::error::Error for Error {}

/// A specialized Result type for codec operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Reasons a remote execution failed (the "Err" side of an `Outcome`).
///
/// These are distinct from `Error`; these represent the *operation* failing,
/// whereas `Error` represents the *encoding* failing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureReason {
    /// The operation ran and returned an error.
    OperationFailed(String),
    /// The operation panicked while running.
    Panicked(String),
    /// The operation is not exposed by the registry.
    MethodNotFound(String),
    /// Arguments provided did not match the declared arity.
    BadArgumentCount { expected: usize, found: usize },
    /// A store key did not resolve to a value.
    NotFound(String),
    /// The named mapper is not registered on this peer.
    UnknownMapper(String),
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OperationFailed(msg) => write!(f, "operation failed: {}", msg),
            Self::Panicked(msg) => write!(f, "operation panicked: {}", msg),
            Self::MethodNotFound(name) => write!(f, "method not found: {}", name),
            Self::BadArgumentCount { expected, found } => {
                write!(f, "bad argument count: expected {}, found {}", expected, found)
            }
            Self::NotFound(key) => write!(f, "key not found: {}", key),
            Self::UnknownMapper(name) => write!(f, "unknown mapper: {}", name),
        }
    }
}

impl std::error::Error for FailureReason {}

/// The result of running an operation: a value, or the reason there isn't one.
pub type Outcome = std::result::Result<Val, FailureReason>;
