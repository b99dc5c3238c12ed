//! Transport contract consumed by hosts and clients.
//!
//! A transport is whatever moves frames between two peers: a worker's
//! `postMessage`, an extension port, an iframe window, a broadcast channel.
//! The protocol core only needs the primitives below and never holds a
//! handle to the remote peer itself; the transport owns that.
//!
//! Both sides are best-effort and non-blocking. Demultiplexing responses by
//! correlation id is the client's job, not the transport's.

use std::rc::Rc;

use crate::broadcast::Subscription;
use crate::error::TransportError;

/// One encoded envelope.
pub type Frame = Vec<u8>;

/// Caller-side primitives.
pub trait CallerTransport {
    /// Deliver a request frame to the remote peer.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] when the frame could not be handed to the
    /// underlying channel. No retry is attempted by the caller.
    fn send(&self, frame: Frame) -> Result<(), TransportError>;

    /// Observe every response frame arriving from the remote peer.
    fn responses(&self) -> Subscription<Frame>;

    /// Produce a correlation id unique among this transport's in-flight calls.
    fn next_id(&self) -> String;
}

/// Responder-side primitives.
pub trait ResponderTransport {
    /// Observe every request frame arriving from the remote peer.
    fn requests(&self) -> Subscription<Frame>;

    /// Deliver a response frame back to the peer that made the request.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] when the frame could not be handed to the
    /// underlying channel.
    fn respond(&self, frame: Frame) -> Result<(), TransportError>;
}

impl<T: CallerTransport + ?Sized> CallerTransport for Rc<T> {
    fn send(&self, frame: Frame) -> Result<(), TransportError> {
        (**self).send(frame)
    }

    fn responses(&self) -> Subscription<Frame> {
        (**self).responses()
    }

    fn next_id(&self) -> String {
        (**self).next_id()
    }
}

impl<T: ResponderTransport + ?Sized> ResponderTransport for Rc<T> {
    fn requests(&self) -> Subscription<Frame> {
        (**self).requests()
    }

    fn respond(&self, frame: Frame) -> Result<(), TransportError> {
        (**self).respond(frame)
    }
}
