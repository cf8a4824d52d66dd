//! # Envelope Framing
//!
//! Wraps a `Command` with the protocol version and moves it to and from bytes.
//!
//! ## Invariants
//! - **Panic Safety**: All decoding paths return `Result`, never panicking on unknown data.
//! - **Forward Compatibility**: Unknown envelope fields are skipped.
//! - **Version Gate**: An envelope from a different protocol version is rejected
//!   before its command is interpreted.
//! - **Lossless Encode**: A command that cannot be represented exactly (a NaN or
//!   infinite float) fails to encode instead of being written lossily.

use serde::Deserialize;
use serde::Serialize;

use crate::command::Command;
use crate::error::Error;
use crate::error::Result;
use crate::val::Val;

/// The version stamped on every outbound envelope.
pub const PROTOCOL_VERSION: u16 = 1;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub version: u16,
    pub command: Command,
}

impl Envelope {
    pub fn new(command: Command) -> Self {
        Self { version: PROTOCOL_VERSION, command }
    }
}

/// Encodes a command into a versioned envelope.
pub fn encode(command: &Command) -> Result<Vec<u8>> {
    #[derive(Serialize)]
    struct EnvelopeRef<'a> {
        version: u16,
        command: &'a Command,
    }

    let finite = match command {
        Command::Rpc { args, .. } => args.iter().all(Val::is_finite),
        Command::Custom { .. } => true,
        Command::CustomResponse { value, .. } => value.values().all(Val::is_finite),
    };
    if !finite {
        return Err(Error::Serialization(format!(
            "{} command carries a non-finite float",
            command.kind()
        )));
    }

    serde_json::to_vec(&EnvelopeRef { version: PROTOCOL_VERSION, command })
        .map_err(|e| Error::Serialization(e.to_string()))
}

/// Decodes a command, checking the envelope version.
pub fn decode(bytes: &[u8]) -> Result<Command> {
    // The command stays untyped until the version is known.
    #[derive(Deserialize)]
    struct RawEnvelope {
        version: u16,
        command: serde_json::Value,
    }

    let raw: RawEnvelope = serde_json::from_slice(bytes)
        .map_err(|e| Error::Malformed(e.to_string()))?;

    if raw.version != PROTOCOL_VERSION {
        return Err(Error::UnsupportedVersion {
            expected: PROTOCOL_VERSION,
            found: raw.version,
        });
    }

    serde_json::from_value(raw.command).map_err(|e| Error::Malformed(e.to_string()))
}

/// Like `decode`, but refuses payloads longer than `limit` without parsing them.
pub fn decode_bounded(bytes: &[u8], limit: usize) -> Result<Command> {
    if bytes.len() > limit {
        return Err(Error::PayloadTooLarge { limit, found: bytes.len() });
    }
    decode(bytes)
}
