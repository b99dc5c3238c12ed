//! Bidirectional peer: a host and a client over one transport.
//!
//! A [`MessagePeer`] answers requests arriving on its transport and issues
//! its own calls over the same transport. Neither role knows about the
//! other; the peer only forwards to each.

use std::cell::RefCell;
use std::rc::Rc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::client::{CallStream, MessageClient, TypedCallStream};
use crate::config::HostConfig;
use crate::error::HostError;
use crate::host::{HostState, HostStats, MessageHost};
use crate::registry::{resolve, ResolvedListeners, Responder};
use crate::{
    CallerTransport, JsonCodec, MessageCodec, Payload, ResponderTransport, TaskProvider,
    TokioTaskProvider,
};

struct Roles<T, C, P>
where
    T: CallerTransport + ResponderTransport + Clone + 'static,
    C: MessageCodec,
    P: TaskProvider,
{
    host: MessageHost<T, C, P>,
    client: MessageClient<T, C>,
}

/// Caller and responder sharing one transport.
pub struct MessagePeer<T, C = JsonCodec, P = TokioTaskProvider>
where
    T: CallerTransport + ResponderTransport + Clone + 'static,
    C: MessageCodec,
    P: TaskProvider,
{
    roles: RefCell<Roles<T, C, P>>,
    listeners: ResolvedListeners,
    codec: C,
    tasks: P,
    config: HostConfig,
}

impl<T> MessagePeer<T>
where
    T: CallerTransport + ResponderTransport + Clone + 'static,
{
    /// Create a listening peer serving `listeners`.
    ///
    /// # Errors
    ///
    /// Fails only if the fresh host refuses to listen.
    pub fn new(transport: T, listeners: ResolvedListeners) -> Result<Self, HostError> {
        Self::with_parts(
            transport,
            listeners,
            JsonCodec,
            TokioTaskProvider,
            HostConfig::default(),
        )
    }

    /// Create a listening peer serving every handler of `responder`.
    ///
    /// # Errors
    ///
    /// Fails only if the fresh host refuses to listen.
    pub fn for_responder<S: Responder>(transport: T, responder: Rc<S>) -> Result<Self, HostError> {
        Self::new(transport, resolve(responder))
    }
}

impl<T, C, P> MessagePeer<T, C, P>
where
    T: CallerTransport + ResponderTransport + Clone + 'static,
    C: MessageCodec,
    P: TaskProvider,
{
    /// Create a listening peer from explicit parts.
    ///
    /// Both roles are ready when this returns.
    ///
    /// # Errors
    ///
    /// Fails only if the fresh host refuses to listen.
    pub fn with_parts(
        transport: T,
        listeners: ResolvedListeners,
        codec: C,
        tasks: P,
        config: HostConfig,
    ) -> Result<Self, HostError> {
        let roles = build_roles(&transport, &listeners, &codec, &tasks, &config)?;
        Ok(Self {
            roles: RefCell::new(roles),
            listeners,
            codec,
            tasks,
            config,
        })
    }

    /// Call `path` on the remote peer.
    pub fn call(&self, path: &str, body: Payload) -> CallStream<C> {
        self.roles.borrow().client.call(path, body)
    }

    /// Call `path` on the remote peer with typed values.
    pub fn call_typed<Req, Resp>(&self, path: &str, request: &Req) -> TypedCallStream<Resp, C>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        self.roles.borrow().client.call_typed(path, request)
    }

    /// Cancel local executions answering request `id`.
    pub fn terminate(&self, id: &str) -> usize {
        self.roles.borrow().host.terminate(id)
    }

    /// Counters of the current host role.
    pub fn stats(&self) -> HostStats {
        self.roles.borrow().host.stats()
    }

    /// Lifecycle state of the current host role.
    pub fn state(&self) -> HostState {
        self.roles.borrow().host.state()
    }

    /// The transport both roles currently use.
    pub fn transport(&self) -> T {
        self.roles.borrow().client.transport().clone()
    }

    /// Move both roles onto `transport`.
    ///
    /// The old host stops before the new one subscribes, so no request is
    /// dispatched twice. Calls already in flight keep observing the old
    /// transport. Counters restart from zero.
    ///
    /// # Errors
    ///
    /// Fails only if the fresh host refuses to listen; the peer is then left
    /// disposed.
    pub fn repoint(&self, transport: T) -> Result<(), HostError> {
        let mut roles = self.roles.borrow_mut();
        roles.host.dispose();

        let fresh = build_roles(
            &transport,
            &self.listeners,
            &self.codec,
            &self.tasks,
            &self.config,
        )?;
        *roles = fresh;

        tracing::debug!("peer repointed to a new transport");
        Ok(())
    }

    /// Stop answering requests. Outgoing calls keep working.
    pub fn dispose(&self) {
        self.roles.borrow().host.dispose();
    }
}

fn build_roles<T, C, P>(
    transport: &T,
    listeners: &ResolvedListeners,
    codec: &C,
    tasks: &P,
    config: &HostConfig,
) -> Result<Roles<T, C, P>, HostError>
where
    T: CallerTransport + ResponderTransport + Clone + 'static,
    C: MessageCodec,
    P: TaskProvider,
{
    let host = MessageHost::with_parts(
        transport.clone(),
        listeners.clone(),
        codec.clone(),
        tasks.clone(),
        config.clone(),
    );
    host.listen()?;
    let client = MessageClient::with_codec(transport.clone(), codec.clone());
    Ok(Roles { host, client })
}
