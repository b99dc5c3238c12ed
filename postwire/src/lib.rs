//! # Postwire
//!
//! Transport-agnostic request/response messaging between two peers.
//!
//! A caller sends a request envelope carrying a path, a correlation id and a
//! body. The responder runs every handler registered on that path and streams
//! each produced value back, followed by exactly one completion or error.
//!
//! This crate provides:
//! - **Listener registry**: per-type handler tables with inheritance accumulation
//! - **Host**: dispatches inbound requests and streams responses back
//! - **Client**: issues requests and reassembles per-call result streams
//! - **Peer**: a host and a client sharing one transport
//!
//! Wire types, the transport contract and the in-memory transport come from
//! `postwire-core` and are re-exported here.
//!
//! Everything runs on a single thread: hosts spawn their work with
//! `tokio::task::spawn_local`, so drive them inside a `LocalSet`.

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]

// Re-export core types for convenience
pub use postwire_core::{
    Broadcast, CallerTransport, CodecError, Frame, IdGenerator, JsonCodec, MemoryTransport,
    MessageCodec, Payload, RandomIds, RemoteError, RequestEnvelope, ResponderTransport,
    ResponseEnvelope, SequentialIds, Subscription, TaskProvider, TokioTaskProvider,
    TransportError,
};

// =============================================================================
// Modules
// =============================================================================

/// Declarative macros for message types and typed callers.
#[macro_use]
mod macros;

/// Host configuration.
pub mod config;

/// Error types for hosts and clients.
pub mod error;

/// Handler tables and their resolution.
pub mod registry;

/// Inbound request dispatch.
pub mod host;

/// Outbound calls.
pub mod client;

/// Host and client over one transport.
pub mod peer;

// =============================================================================
// Public API Re-exports
// =============================================================================

// Config and error exports
pub use config::{CancelReply, HostConfig};
pub use error::{CallError, HostError};

// Registry exports
pub use registry::{
    listeners_of, resolve, BoundHandler, Handler, ListenerTable, ResolvedListeners, Responder,
    ResponseStream,
};

// Role exports
pub use client::{CallStream, MessageClient, TypedCallStream};
pub use host::{HostState, HostStats, MessageHost};
pub use peer::MessagePeer;
