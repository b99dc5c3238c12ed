//! Message host: dispatches inbound requests to listeners.
//!
//! A host subscribes to its transport's request stream and, for every
//! well-formed request, starts one execution per handler registered on the
//! request's path. Each execution streams its values back as `Data`
//! responses and ends with exactly one `Complete` or `Error` response,
//! unless it is cancelled through the termination signal.
//!
//! # Lifecycle
//!
//! ```text
//! Idle --listen()--> Listening --dispose()/drop--> Disposed
//! ```
//!
//! Disposing stops the dispatch loop and every running execution. No
//! further responses are sent afterwards.

use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use futures::{FutureExt, StreamExt};
use tokio::task::JoinHandle;

use crate::config::{CancelReply, HostConfig};
use crate::error::HostError;
use crate::registry::{resolve, BoundHandler, ResolvedListeners, Responder, ResponseStream};
use crate::{
    Broadcast, Frame, JsonCodec, MessageCodec, RemoteError, RequestEnvelope, ResponderTransport,
    ResponseEnvelope, Subscription, TaskProvider, TokioTaskProvider,
};

/// Lifecycle state of a [`MessageHost`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HostState {
    /// Created, not dispatching yet.
    Idle,
    /// Dispatching inbound requests.
    Listening,
    /// Stopped for good.
    Disposed,
}

/// Counters describing what a host has seen and done.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HostStats {
    /// Well-formed requests received.
    pub requests_received: u64,
    /// Handler executions started, failed starts included.
    pub executions_started: u64,
    /// Executions stopped by the termination signal.
    pub executions_cancelled: u64,
    /// Requests whose path had no handler.
    pub unmatched_paths: u64,
    /// Inbound frames that did not decode as a request.
    pub frames_dropped: u64,
    /// Responses that could not be encoded or handed to the transport.
    pub respond_failures: u64,
}

/// Serves requests arriving on a transport.
///
/// Not `Clone`: dropping the host disposes it.
pub struct MessageHost<T, C = JsonCodec, P = TokioTaskProvider>
where
    T: ResponderTransport + 'static,
    C: MessageCodec,
    P: TaskProvider,
{
    inner: Rc<HostInner<T, C, P>>,
}

struct HostInner<T, C, P> {
    transport: T,
    codec: C,
    tasks: P,
    config: HostConfig,
    listeners: ResolvedListeners,
    termination: Broadcast<String>,
    shutdown: Broadcast<()>,
    state: Cell<HostState>,
    dispatch: RefCell<Option<JoinHandle<()>>>,
    stats: RefCell<HostStats>,
}

impl<T: ResponderTransport + 'static> MessageHost<T> {
    /// Create a host serving `listeners` with the default codec and config.
    pub fn new(transport: T, listeners: ResolvedListeners) -> Self {
        Self::with_config(transport, listeners, HostConfig::default())
    }

    /// Create a host serving `listeners` with a custom config.
    pub fn with_config(transport: T, listeners: ResolvedListeners, config: HostConfig) -> Self {
        Self::with_parts(transport, listeners, JsonCodec, TokioTaskProvider, config)
    }

    /// Create a host serving every handler `responder` answers with.
    pub fn for_responder<S: Responder>(transport: T, responder: Rc<S>) -> Self {
        Self::new(transport, resolve(responder))
    }
}

impl<T, C, P> MessageHost<T, C, P>
where
    T: ResponderTransport + 'static,
    C: MessageCodec,
    P: TaskProvider,
{
    /// Create a host from explicit parts.
    pub fn with_parts(
        transport: T,
        listeners: ResolvedListeners,
        codec: C,
        tasks: P,
        config: HostConfig,
    ) -> Self {
        Self {
            inner: Rc::new(HostInner {
                transport,
                codec,
                tasks,
                config,
                listeners,
                termination: Broadcast::new(),
                shutdown: Broadcast::new(),
                state: Cell::new(HostState::Idle),
                dispatch: RefCell::new(None),
                stats: RefCell::new(HostStats::default()),
            }),
        }
    }

    /// Start dispatching inbound requests.
    ///
    /// Requests arriving before this call are not observed. Frames delivered
    /// once it returns are.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::AlreadyListening`] on a second call and
    /// [`HostError::Disposed`] after [`dispose`](Self::dispose).
    pub fn listen(&self) -> Result<(), HostError> {
        match self.inner.state.get() {
            HostState::Idle => {}
            HostState::Listening => return Err(HostError::AlreadyListening),
            HostState::Disposed => return Err(HostError::Disposed),
        }

        let requests = self.inner.transport.requests();
        let inner = Rc::clone(&self.inner);
        let name = format!("{}-dispatch", self.inner.config.task_name);
        let handle = self.inner.tasks.spawn_task(&name, inner.dispatch_loop(requests));

        *self.inner.dispatch.borrow_mut() = Some(handle);
        self.inner.state.set(HostState::Listening);

        tracing::debug!(
            paths = self.inner.listeners.paths().count(),
            handlers = self.inner.listeners.handler_count(),
            "host listening"
        );
        Ok(())
    }

    /// Cancel every running execution of the request with correlation `id`.
    ///
    /// Returns the number of executions that observed the signal. Unknown or
    /// finished ids are a no-op.
    pub fn terminate(&self, id: &str) -> usize {
        tracing::debug!(id = %id, "terminating executions");
        self.inner.termination.publish(id.to_string())
    }

    /// The termination signal this host's executions listen to.
    ///
    /// Publishing a correlation id on it has the same effect as
    /// [`terminate`](Self::terminate).
    pub fn termination_signal(&self) -> Broadcast<String> {
        self.inner.termination.clone()
    }

    /// Stop dispatching and cancel every running execution. Idempotent.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    /// Current lifecycle state.
    pub fn state(&self) -> HostState {
        self.inner.state.get()
    }

    /// Counters so far.
    pub fn stats(&self) -> HostStats {
        *self.inner.stats.borrow()
    }

    /// Handlers this host serves.
    pub fn listeners(&self) -> &ResolvedListeners {
        &self.inner.listeners
    }

    /// Host configuration.
    pub fn config(&self) -> &HostConfig {
        &self.inner.config
    }

    /// Underlying transport.
    pub fn transport(&self) -> &T {
        &self.inner.transport
    }
}

impl<T, C, P> Drop for MessageHost<T, C, P>
where
    T: ResponderTransport + 'static,
    C: MessageCodec,
    P: TaskProvider,
{
    fn drop(&mut self) {
        self.inner.dispose();
    }
}

impl<T, C, P> HostInner<T, C, P>
where
    T: ResponderTransport + 'static,
    C: MessageCodec,
    P: TaskProvider,
{
    async fn dispatch_loop(self: Rc<Self>, mut requests: Subscription<Frame>) {
        while let Some(frame) = requests.next().await {
            self.handle_frame(&frame);
        }
        tracing::debug!("request stream ended");
    }

    fn handle_frame(self: &Rc<Self>, frame: &[u8]) {
        let request: RequestEnvelope = match self.codec.decode(frame) {
            Ok(request) => request,
            Err(error) => {
                tracing::warn!(error = %error, len = frame.len(), "dropping malformed request frame");
                self.stats.borrow_mut().frames_dropped += 1;
                return;
            }
        };
        self.stats.borrow_mut().requests_received += 1;

        let handlers = self.listeners.handlers(&request.path);
        if handlers.is_empty() {
            tracing::debug!(path = %request.path, id = %request.id, "no listener for path");
            self.stats.borrow_mut().unmatched_paths += 1;
            return;
        }

        tracing::trace!(
            path = %request.path,
            id = %request.id,
            handlers = handlers.len(),
            "dispatching request"
        );
        for handler in handlers {
            self.start_execution(handler, &request);
        }
    }

    fn start_execution(self: &Rc<Self>, handler: &BoundHandler, request: &RequestEnvelope) {
        self.stats.borrow_mut().executions_started += 1;

        // Subscribe before invoking so a terminate issued meanwhile is seen.
        let cancel = self.termination.subscribe();
        let shutdown = self.shutdown.subscribe();

        let body = request.body.clone();
        let stream = match panic::catch_unwind(AssertUnwindSafe(|| handler(body))) {
            Ok(Ok(stream)) => stream,
            Ok(Err(error)) => {
                tracing::debug!(id = %request.id, error = %error, "handler failed to start");
                self.respond(&ResponseEnvelope::error(request.id.as_str(), error));
                return;
            }
            Err(payload) => {
                let error = RemoteError::panicked(panic_message(payload.as_ref()));
                tracing::warn!(id = %request.id, error = %error, "handler panicked");
                self.respond(&ResponseEnvelope::error(request.id.as_str(), error));
                return;
            }
        };

        let inner = Rc::clone(self);
        let id = request.id.clone();
        let name = format!("{}-exec-{}", self.config.task_name, id);
        self.tasks.spawn_task(&name, async move {
            let run = Rc::clone(&inner).run_execution(id.clone(), stream, cancel, shutdown);
            if let Err(payload) = AssertUnwindSafe(run).catch_unwind().await {
                let error = RemoteError::panicked(panic_message(payload.as_ref()));
                tracing::warn!(id = %id, error = %error, "handler stream panicked");
                if inner.state.get() != HostState::Disposed {
                    inner.respond(&ResponseEnvelope::error(id.as_str(), error));
                }
            }
        });
    }

    async fn run_execution(
        self: Rc<Self>,
        id: String,
        mut stream: ResponseStream,
        mut cancel: Subscription<String>,
        mut shutdown: Subscription<()>,
    ) {
        loop {
            tokio::select! {
                biased;

                () = wait_for_id(&mut cancel, &id) => {
                    self.on_cancelled(&id);
                    return;
                }
                _ = shutdown.next() => {
                    tracing::trace!(id = %id, "execution stopped by dispose");
                    return;
                }
                item = stream.next() => {
                    let (envelope, terminal) = match item {
                        Some(Ok(body)) => (ResponseEnvelope::data(id.as_str(), body), false),
                        Some(Err(error)) => (ResponseEnvelope::error(id.as_str(), error), true),
                        None => (ResponseEnvelope::complete(id.as_str()), true),
                    };
                    if !self.respond(&envelope) || terminal {
                        return;
                    }
                }
            }
        }
    }

    fn on_cancelled(&self, id: &str) {
        self.stats.borrow_mut().executions_cancelled += 1;
        tracing::debug!(id = %id, reply = ?self.config.cancel_reply, "execution cancelled");
        if self.config.cancel_reply == CancelReply::Terminal {
            self.respond(&ResponseEnvelope::error(id, RemoteError::cancelled(id)));
        }
    }

    /// Encode and hand `envelope` to the transport. Returns false on failure.
    fn respond(&self, envelope: &ResponseEnvelope) -> bool {
        let sent = self
            .codec
            .encode(envelope)
            .map_err(|error| error.to_string())
            .and_then(|frame| {
                self.transport
                    .respond(frame)
                    .map_err(|error| error.to_string())
            });

        match sent {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!(id = %envelope.id(), error = %error, "failed to send response");
                self.stats.borrow_mut().respond_failures += 1;
                false
            }
        }
    }

    fn dispose(&self) {
        if self.state.replace(HostState::Disposed) == HostState::Disposed {
            return;
        }
        if let Some(handle) = self.dispatch.borrow_mut().take() {
            handle.abort();
        }
        self.shutdown.close();
        self.termination.close();
        tracing::debug!("host disposed");
    }
}

/// Resolve once `id` is published; never resolves if the signal closes.
async fn wait_for_id(cancel: &mut Subscription<String>, id: &str) {
    while let Some(terminated) = cancel.next().await {
        if terminated == id {
            return;
        }
    }
    std::future::pending::<()>().await;
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryTransport;

    #[test]
    fn test_listen_twice_fails() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("runtime");
        let local = tokio::task::LocalSet::new();
        local.block_on(&rt, async {
            let (_caller, responder) = MemoryTransport::pair();
            let host = MessageHost::new(responder, ResolvedListeners::new());

            assert_eq!(host.state(), HostState::Idle);
            host.listen().expect("first listen");
            assert_eq!(host.listen(), Err(HostError::AlreadyListening));
            assert_eq!(host.state(), HostState::Listening);
        });
    }

    #[test]
    fn test_dispose_is_idempotent_and_final() {
        let (_caller, responder) = MemoryTransport::pair();
        let host = MessageHost::new(responder, ResolvedListeners::new());

        host.dispose();
        host.dispose();

        assert_eq!(host.state(), HostState::Disposed);
        assert_eq!(host.listen(), Err(HostError::Disposed));
        assert!(host.termination_signal().is_closed());
    }

    #[test]
    fn test_terminate_without_executions_reaches_nobody() {
        let (_caller, responder) = MemoryTransport::pair();
        let host = MessageHost::new(responder, ResolvedListeners::new());
        assert_eq!(host.terminate("nope"), 0);
    }

    #[test]
    fn test_panic_message_extraction() {
        let from_str: Box<dyn std::any::Any + Send> = Box::new("static");
        let from_string: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        let other: Box<dyn std::any::Any + Send> = Box::new(42u8);

        assert_eq!(panic_message(from_str.as_ref()), "static");
        assert_eq!(panic_message(from_string.as_ref()), "owned");
        assert_eq!(panic_message(other.as_ref()), "handler panicked");
    }
}
