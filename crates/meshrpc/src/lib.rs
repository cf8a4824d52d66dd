//! # MeshRPC
//!
//! The wire layer for remote execution across a peer mesh.
//!
//! ## Architecture
//!
//! A `Command` is the unit of remote work. It is wrapped in a versioned
//! `Envelope` and encoded to opaque bytes before it is handed to a transport.
//! Commands carry data only: names of operations, names of mappers, and `Val`
//! arguments. Executable code never crosses the wire.

pub mod command;
pub mod error;
pub mod frame;
pub mod val;

pub use command::Command;
pub use command::CommandKind;
pub use command::CausalToken;
pub use command::JobId;
pub use command::PeerId;
pub use command::ResponseShape;
pub use command::JOB_ID_FIELD;
pub use error::Error;
pub use error::FailureReason;
pub use error::Outcome;
pub use error::Result;
pub use frame::Envelope;
pub use frame::PROTOCOL_VERSION;
pub use frame::decode;
pub use frame::decode_bounded;
pub use frame::encode;
pub use val::Val;

#[cfg(test)]
mod tests;
