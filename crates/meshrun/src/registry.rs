//! # Local Registry
//!
//! The operations a peer exposes to remote callers, and their declared arity.
//!
//! ## Philosophy
//!
//! - **Explicit Surface**: The registry is built once from a `name -> (arity, handler)`
//!   table. Nothing is discovered by introspection; what is registered is exactly what
//!   is callable.
//! - **Sender-Side Validation**: Outbound calls are checked against the *sender's* registry
//!   before they touch the network. A malformed call is a local failure value.
//! - **Contained Execution**: Running an operation never unwinds into the caller. Errors and
//!   panics both become a `FailureReason`.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use meshrpc::FailureReason;
use meshrpc::Outcome;
use meshrpc::Val;

/// Why an outbound call was refused before sending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The operation or mapper name was empty.
    EmptyName,
    /// The store key of a custom command was empty.
    EmptyKey,
    /// No operation with this name is registered.
    UnknownOperation(String),
    /// The argument count does not match the declared arity.
    ArityMismatch { name: String, expected: usize, found: usize },
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyName => write!(f, "operation name is empty"),
            Self::EmptyKey => write!(f, "store key is empty"),
            Self::UnknownOperation(name) => write!(f, "unknown operation '{}'", name),
            Self::ArityMismatch { name, expected, found } => write!(
                f,
                "operation '{}' expects {} argument(s), got {}",
                name, expected, found
            ),
        }
    }
}

impl std::error::Error for ValidationError {}

/// The body of a registered operation.
pub type OperationFn = Arc<dyn Fn(&[Val]) -> std::result::Result<Val, String> + Send + Sync>;

/// A registered operation: its declared arity and its body.
#[derive(Clone)]
pub struct Operation {
    pub arity: usize,
    func: OperationFn,
}

impl std::fmt::Debug for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Operation").field("arity", &self.arity).finish_non_exhaustive()
    }
}

/// The operations exposed by one peer. Cheap to clone; immutable once built.
#[derive(Clone, Debug, Default)]
pub struct Registry {
    ops: Arc<HashMap<String, Operation>>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Declared arity of `name`. Lookups never change the registry.
    pub fn arity(&self, name: &str) -> Option<usize> {
        self.ops.get(name).map(|op| op.arity)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.ops.contains_key(name)
    }

    /// All registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.ops.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Checks that `name(args...)` is a call this registry would accept.
    pub fn validate(&self, name: &str, args: &[Val]) -> Result<(), ValidationError> {
        if name.is_empty() {
            return Err(ValidationError::EmptyName);
        }

        let expected = self.arity(name)
            .ok_or_else(|| ValidationError::UnknownOperation(name.to_string()))?;

        if expected != args.len() {
            return Err(ValidationError::ArityMismatch {
                name: name.to_string(),
                expected,
                found: args.len(),
            });
        }

        Ok(())
    }

    /// Runs `name(args...)`. Failures of any kind come back as the `Err` side.
    pub fn invoke(&self, name: &str, args: &[Val]) -> Outcome {
        let op = self.ops
            .get(name)
            .ok_or_else(|| FailureReason::MethodNotFound(name.to_string()))?;

        if op.arity != args.len() {
            return Err(FailureReason::BadArgumentCount {
                expected: op.arity,
                found: args.len(),
            });
        }

        match std::panic::catch_unwind(AssertUnwindSafe(|| (op.func)(args))) {
            Ok(Ok(val)) => Ok(val),
            Ok(Err(msg)) => Err(FailureReason::OperationFailed(msg)),
            Err(payload) => Err(FailureReason::Panicked(panic_message(payload.as_ref()))),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Collects operations into a `Registry`.
#[derive(Default)]
pub struct RegistryBuilder {
    ops: HashMap<String, Operation>,
}

impl RegistryBuilder {
    /// Registers `name` with a fixed arity. A later registration under the same name wins.
    pub fn op<F>(mut self, name: impl Into<String>, arity: usize, func: F) -> Self
    where
        F: Fn(&[Val]) -> std::result::Result<Val, String> + Send + Sync + 'static,
    {
        self.ops.insert(name.into(), Operation { arity, func: Arc::new(func) });
        self
    }

    pub fn build(self) -> Registry {
        Registry { ops: Arc::new(self.ops) }
    }
}
