//! # postwire-core
//!
//! Shared contracts for the postwire messaging protocol.
//!
//! This crate provides the pieces both sides of a call agree on:
//!
//! - **Envelopes**: [`RequestEnvelope`] and [`ResponseEnvelope`], the only wire state
//! - **Codec**: [`MessageCodec`] with the default [`JsonCodec`]
//! - **Transport contract**: [`CallerTransport`] and [`ResponderTransport`]
//! - **Broadcast**: the unbounded fan-out channel behind every inbound stream
//! - **Ids and tasks**: [`IdGenerator`] implementations and [`TaskProvider`]
//! - **Memory transport**: a connected in-process pair for tests and demos

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]

mod broadcast;
mod codec;
mod envelope;
mod error;
mod id;
mod memory;
mod task;
mod transport;

// Envelope exports
pub use envelope::{Payload, RequestEnvelope, ResponseEnvelope};

// Codec and error exports
pub use codec::{CodecError, JsonCodec, MessageCodec};
pub use error::{RemoteError, TransportError};

// Transport exports
pub use broadcast::{Broadcast, Subscription};
pub use memory::MemoryTransport;
pub use transport::{CallerTransport, Frame, ResponderTransport};

// Runtime exports
pub use id::{IdGenerator, RandomIds, SequentialIds};
pub use task::{TaskProvider, TokioTaskProvider};
