//! # Transport Abstraction
//!
//! The two network primitives the interpreter sits on.
//!
//! ## Philosophy
//!
//! - **Byte-Oriented**: Transports know nothing about commands. They move opaque buffers.
//! - **Fire and Forget**: `send` hands a buffer to the network and returns; it never waits
//!   for delivery. Replies, if any, arrive later through `recv`.
//! - **Ordering is theirs**: Causal order on broadcast, and whatever order unicast provides,
//!   are the transport's responsibility.

use meshrpc::CausalToken;
use meshrpc::PeerId;

/// Errors that occur at the network/transport layer.
#[derive(Debug, Clone)]
pub enum Error {
    /// The peer is unreachable or the connection was dropped.
    ConnectionLost(String),
    /// No peer with this identifier is reachable.
    UnknownPeer(PeerId),
    /// The transport rejected the payload size.
    PayloadTooLarge,
    /// The causal token is not newer than one already delivered from its origin.
    StaleToken(CausalToken),
    /// Generic I/O error or internal transport failure.
    Io(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConnectionLost(msg) => write!(f, "Connection lost: {}", msg),
            Self::UnknownPeer(peer) => write!(f, "Unknown peer: {}", peer),
            Self::PayloadTooLarge => write!(f, "Payload too large for transport"),
            Self::StaleToken(token) => {
                write!(f, "Stale causal token {} from {}", token.counter, token.origin)
            }
            Self::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

/// A causally-ordered broadcast channel.
///
/// This trait is designed to be object-safe (`Arc<dyn Broadcast>`).
#[async_trait::async_trait]
pub trait Broadcast: Send + Sync + 'static {
    /// Sends a payload to every other participant.
    ///
    /// # invariants
    /// - `token` places the payload in causal order on delivery.
    /// - Must not deliver the payload back to the sender.
    async fn send(&self, payload: &[u8], token: CausalToken) -> Result<()>;

    /// Receives the next delivered payload. `Ok(None)` means the channel closed.
    async fn recv(&self) -> Result<Option<Vec<u8>>>;
}

/// A point-to-point channel to one addressed peer.
#[async_trait::async_trait]
pub trait Unicast: Send + Sync + 'static {
    /// Sends a payload to `peer` only.
    async fn send(&self, payload: &[u8], peer: &PeerId) -> Result<()>;

    /// Receives the next payload along with its sender. `Ok(None)` means the channel closed.
    async fn recv(&self) -> Result<Option<(PeerId, Vec<u8>)>>;
}
