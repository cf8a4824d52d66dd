//! # Meshrun
//!
//! A remote-execution interpreter for a peer mesh.
//!
//! A peer can invoke a registered operation on every other peer (broadcast) or
//! on one peer (unicast), or start a custom job that runs a named mapper against
//! a key in each peer's store and streams values back. Results surface locally
//! as events.

pub mod builder;
pub mod clock;
pub mod events;
pub mod id;
pub mod interpreter;
pub mod logging;
pub mod mapper;
pub mod mapreduce;
pub mod mesh;
pub mod registry;
pub mod store;
pub mod transport;

pub use builder::Builder;
pub use clock::Clock;
pub use clock::VersionVector;
pub use events::Event;
pub use events::EventKind;
pub use events::Events;
pub use events::Subscription;
pub use id::JobIds;
pub use interpreter::DispatchError;
pub use interpreter::Error;
pub use interpreter::Interpreter;
pub use interpreter::PumpHandle;
pub use interpreter::Result;
pub use interpreter::Sent;
pub use mapper::Context;
pub use mapper::Emitter;
pub use mapper::Mappers;
pub use mapreduce::MapReduce;
pub use mesh::Mesh;
pub use registry::Registry;
pub use registry::ValidationError;
pub use store::Membership;
pub use store::Store;

pub use meshrpc;

#[cfg(test)]
mod mock_transport;
