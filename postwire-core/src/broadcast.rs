//! Broadcast: unbounded single-threaded fan-out channel.
//!
//! Every [`Subscription`] receives every item published after it was created,
//! in publish order. Publishing never blocks and never drops: each subscriber
//! owns its own queue, so a slow subscriber only grows its own backlog.
//!
//! Transports use it for their inbound request and response streams; hosts
//! use it for the termination signal.
//!
//! # Design
//!
//! - `Rc<RefCell<..>>` state for a single-threaded runtime (no locks)
//! - Subscribers are held weakly; dropping a subscription unsubscribes it
//! - Waker-based notification, one waker per subscriber

use std::cell::RefCell;
use std::collections::VecDeque;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll, Waker};

use futures::stream::{FusedStream, Stream};

/// Publishing side of a broadcast channel.
///
/// Cloning yields another handle to the same channel.
pub struct Broadcast<T> {
    inner: Rc<RefCell<BroadcastInner<T>>>,
}

struct BroadcastInner<T> {
    subscribers: Vec<Weak<RefCell<SubscriberState<T>>>>,
    closed: bool,
    published: u64,
}

struct SubscriberState<T> {
    queue: VecDeque<T>,
    waker: Option<Waker>,
    closed: bool,
}

impl<T> SubscriberState<T> {
    fn new(closed: bool) -> Self {
        Self {
            queue: VecDeque::new(),
            waker: None,
            closed,
        }
    }
}

impl<T> Clone for Broadcast<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> Default for Broadcast<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Broadcast<T> {
    /// Create an open channel with no subscribers.
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(BroadcastInner {
                subscribers: Vec::new(),
                closed: false,
                published: 0,
            })),
        }
    }

    /// Start observing the channel.
    ///
    /// Subscribing to a closed channel yields a subscription that ends
    /// immediately.
    pub fn subscribe(&self) -> Subscription<T> {
        let mut inner = self.inner.borrow_mut();
        let state = Rc::new(RefCell::new(SubscriberState::new(inner.closed)));
        if !inner.closed {
            // Channels that are only ever closed never reach `publish`.
            inner.subscribers.retain(|s| s.strong_count() > 0);
            inner.subscribers.push(Rc::downgrade(&state));
        }
        Subscription { state }
    }

    /// Close the channel. Subscribers drain what they have, then end.
    pub fn close(&self) {
        let subscribers = {
            let mut inner = self.inner.borrow_mut();
            if inner.closed {
                return;
            }
            inner.closed = true;
            std::mem::take(&mut inner.subscribers)
        };

        let mut wakers = Vec::new();
        for subscriber in subscribers.iter().filter_map(Weak::upgrade) {
            let mut state = subscriber.borrow_mut();
            state.closed = true;
            wakers.extend(state.waker.take());
        }
        for waker in wakers {
            waker.wake();
        }
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.borrow().closed
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .borrow()
            .subscribers
            .iter()
            .filter(|s| s.strong_count() > 0)
            .count()
    }

    /// Total number of items published so far.
    pub fn published(&self) -> u64 {
        self.inner.borrow().published
    }
}

impl<T: Clone> Broadcast<T> {
    /// Deliver `item` to every live subscriber.
    ///
    /// Returns how many subscribers received it. Publishing on a closed
    /// channel delivers to nobody.
    pub fn publish(&self, item: T) -> usize {
        let live: Vec<_> = {
            let mut inner = self.inner.borrow_mut();
            if inner.closed {
                return 0;
            }
            inner.published += 1;
            inner.subscribers.retain(|s| s.strong_count() > 0);
            inner.subscribers.iter().filter_map(Weak::upgrade).collect()
        };

        let mut wakers = Vec::with_capacity(live.len());
        for subscriber in &live {
            let mut state = subscriber.borrow_mut();
            state.queue.push_back(item.clone());
            wakers.extend(state.waker.take());
        }
        for waker in wakers {
            waker.wake();
        }
        live.len()
    }
}

/// Receiving side of a broadcast channel.
///
/// Implements [`Stream`]; ends once the channel is closed and the backlog is
/// drained. Dropping it unsubscribes.
pub struct Subscription<T> {
    state: Rc<RefCell<SubscriberState<T>>>,
}

impl<T> Subscription<T> {
    /// Take the next buffered item without waiting.
    pub fn try_recv(&self) -> Option<T> {
        self.state.borrow_mut().queue.pop_front()
    }

    /// Number of buffered items.
    pub fn len(&self) -> usize {
        self.state.borrow().queue.len()
    }

    /// Whether no item is buffered.
    pub fn is_empty(&self) -> bool {
        self.state.borrow().queue.is_empty()
    }

    /// Whether the channel behind this subscription has been closed.
    pub fn is_closed(&self) -> bool {
        self.state.borrow().closed
    }
}

impl<T> Stream for Subscription<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        let mut state = self.state.borrow_mut();

        if let Some(item) = state.queue.pop_front() {
            return Poll::Ready(Some(item));
        }
        if state.closed {
            return Poll::Ready(None);
        }

        state.waker = Some(cx.waker().clone());
        Poll::Pending
    }
}

impl<T> FusedStream for Subscription<T> {
    fn is_terminated(&self) -> bool {
        let state = self.state.borrow();
        state.closed && state.queue.is_empty()
    }
}
