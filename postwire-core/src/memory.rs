//! In-memory paired transport.
//!
//! [`MemoryTransport::pair`] returns two connected ends, like the two sides
//! of a `MessageChannel`. Whatever one end sends arrives on the other end's
//! request stream; whatever one end responds arrives on the other end's
//! response stream. Delivery is immediate and in order.
//!
//! Used by the tests and the demo; real deployments plug in a transport over
//! their own channel.

use std::cell::Cell;
use std::rc::Rc;

use crate::broadcast::{Broadcast, Subscription};
use crate::error::TransportError;
use crate::id::{IdGenerator, SequentialIds};
use crate::transport::{CallerTransport, Frame, ResponderTransport};

/// Inbound streams of one end.
#[derive(Clone, Default)]
struct Inbox {
    requests: Broadcast<Frame>,
    responses: Broadcast<Frame>,
}

impl Inbox {
    fn close(&self) {
        self.requests.close();
        self.responses.close();
    }
}

/// One end of an in-memory channel.
///
/// Cheap to clone; clones share the same end.
#[derive(Clone)]
pub struct MemoryTransport {
    inbox: Inbox,
    peer: Inbox,
    open: Rc<Cell<bool>>,
    ids: Rc<dyn IdGenerator>,
    frames_sent: Rc<Cell<u64>>,
}

impl MemoryTransport {
    /// Two connected ends with `a-<n>` and `b-<n>` correlation ids.
    pub fn pair() -> (Self, Self) {
        Self::pair_with_ids(
            Rc::new(SequentialIds::with_prefix("a")),
            Rc::new(SequentialIds::with_prefix("b")),
        )
    }

    /// Two connected ends with the given id generators.
    pub fn pair_with_ids(a_ids: Rc<dyn IdGenerator>, b_ids: Rc<dyn IdGenerator>) -> (Self, Self) {
        let a_inbox = Inbox::default();
        let b_inbox = Inbox::default();
        let open = Rc::new(Cell::new(true));

        let a = Self {
            inbox: a_inbox.clone(),
            peer: b_inbox.clone(),
            open: Rc::clone(&open),
            ids: a_ids,
            frames_sent: Rc::new(Cell::new(0)),
        };
        let b = Self {
            inbox: b_inbox,
            peer: a_inbox,
            open,
            ids: b_ids,
            frames_sent: Rc::new(Cell::new(0)),
        };
        (a, b)
    }

    /// Disconnect both ends.
    ///
    /// Every stream of both ends finishes after draining, and further sends
    /// fail with [`TransportError::Closed`].
    pub fn close(&self) {
        if !self.open.replace(false) {
            return;
        }
        tracing::debug!("memory transport closed");
        self.inbox.close();
        self.peer.close();
    }

    /// Whether the pair is still connected.
    pub fn is_open(&self) -> bool {
        self.open.get()
    }

    /// Frames sent or responded from this end.
    pub fn frames_sent(&self) -> u64 {
        self.frames_sent.get()
    }

    /// Push a raw frame onto this end's request stream, as if the peer sent it.
    pub fn deliver_request(&self, frame: Frame) -> usize {
        self.inbox.requests.publish(frame)
    }

    /// Push a raw frame onto this end's response stream, as if the peer
    /// responded with it.
    pub fn deliver_response(&self, frame: Frame) -> usize {
        self.inbox.responses.publish(frame)
    }

    fn push(&self, target: &Broadcast<Frame>, frame: Frame) -> Result<(), TransportError> {
        if !self.open.get() {
            return Err(TransportError::Closed);
        }
        self.frames_sent.set(self.frames_sent.get() + 1);
        target.publish(frame);
        Ok(())
    }
}

impl CallerTransport for MemoryTransport {
    fn send(&self, frame: Frame) -> Result<(), TransportError> {
        self.push(&self.peer.requests, frame)
    }

    fn responses(&self) -> Subscription<Frame> {
        self.inbox.responses.subscribe()
    }

    fn next_id(&self) -> String {
        self.ids.next_id()
    }
}

impl ResponderTransport for MemoryTransport {
    fn requests(&self) -> Subscription<Frame> {
        self.inbox.requests.subscribe()
    }

    fn respond(&self, frame: Frame) -> Result<(), TransportError> {
        self.push(&self.peer.responses, frame)
    }
}
