//! Listener registry: path → handlers, accumulated along a type chain.
//!
//! A responder type declares its handlers once in
//! [`Responder::register_listeners`]. A type that builds on another one (a
//! struct embedding its "parent" and exposing it through a projection) pulls
//! the parent's handlers in with [`ListenerTable::inherit`].
//!
//! Inherited handlers are **added**, never overridden: when a type and its
//! ancestor both listen on the same path, both run for every request on it,
//! most-derived first.
//!
//! # Architecture
//!
//! ```text
//! Responder::register_listeners(&mut table)   once per type, cached
//!   ↓
//! ListenerTable<S>   own entries ++ inherited entries (handlers take &S)
//!   ↓ bind(Rc<S>)    at host construction
//! ResolvedListeners  path → [BoundHandler], handlers take only the body
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! struct Bar { foo: Foo }
//!
//! impl Responder for Bar {
//!     fn register_listeners(table: &mut ListenerTable<Self>) {
//!         table
//!             .listen_async("bar", |_this, body: String| async move { Ok(body) })
//!             .inherit(|bar: &Bar| &bar.foo);
//!     }
//! }
//! ```

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::rc::Rc;

use futures::stream::{self, LocalBoxStream, Stream, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::{Payload, RemoteError};

/// Values produced by one handler execution.
///
/// An `Err` item ends the execution with an error response.
pub type ResponseStream = LocalBoxStream<'static, Result<Payload, RemoteError>>;

/// Handler declared on responder type `S`.
///
/// Returning `Err` is a synchronous failure and is answered exactly like an
/// error emitted by the stream.
pub type Handler<S> = Rc<dyn Fn(&S, Payload) -> Result<ResponseStream, RemoteError>>;

/// Handler bound to a responder instance.
pub type BoundHandler = Rc<dyn Fn(Payload) -> Result<ResponseStream, RemoteError>>;

/// A type whose instances answer requests.
pub trait Responder: Sized + 'static {
    /// Declare this type's handlers.
    ///
    /// Runs once per type per thread; the table is cached and immutable
    /// afterwards. Inheritance cycles recurse forever.
    fn register_listeners(table: &mut ListenerTable<Self>);
}

/// Handlers declared by one responder type, including inherited ones.
pub struct ListenerTable<S> {
    own: Vec<(String, Handler<S>)>,
    inherited: Vec<(String, Handler<S>)>,
}

impl<S> Default for ListenerTable<S> {
    fn default() -> Self {
        Self {
            own: Vec::new(),
            inherited: Vec::new(),
        }
    }
}

impl<S: 'static> ListenerTable<S> {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a raw handler for `path`.
    ///
    /// Handlers on the same path run in registration order.
    pub fn listen<F>(&mut self, path: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(&S, Payload) -> Result<ResponseStream, RemoteError> + 'static,
    {
        let handler: Handler<S> = Rc::new(handler);
        self.own.push((path.into(), handler));
        self
    }

    /// Register a typed streaming handler for `path`.
    ///
    /// The body is decoded into `Req`; a body of the wrong shape fails the
    /// execution with [`RemoteError::invalid_body`].
    pub fn listen_stream<Req, Resp, St, F>(
        &mut self,
        path: impl Into<String>,
        handler: F,
    ) -> &mut Self
    where
        Req: DeserializeOwned + 'static,
        Resp: Serialize + 'static,
        St: Stream<Item = Result<Resp, RemoteError>> + 'static,
        F: Fn(&S, Req) -> St + 'static,
    {
        self.listen(path, move |this: &S, body: Payload| {
            let request: Req = serde_json::from_value(body).map_err(RemoteError::invalid_body)?;
            let values = handler(this, request).map(|item| {
                item.and_then(|value| {
                    serde_json::to_value(value).map_err(RemoteError::invalid_value)
                })
            });
            Ok(values.boxed_local())
        })
    }

    /// Register a typed handler producing a single value asynchronously.
    pub fn listen_async<Req, Resp, Fut, F>(
        &mut self,
        path: impl Into<String>,
        handler: F,
    ) -> &mut Self
    where
        Req: DeserializeOwned + 'static,
        Resp: Serialize + 'static,
        Fut: Future<Output = Result<Resp, RemoteError>> + 'static,
        F: Fn(&S, Req) -> Fut + 'static,
    {
        self.listen_stream(path, move |this: &S, request: Req| {
            stream::once(handler(this, request))
        })
    }

    /// Accumulate every handler of `P` (and of `P`'s ancestors).
    ///
    /// `project` reaches the `P` embedded in an `S`. Inherited handlers
    /// always resolve after this type's own handlers.
    pub fn inherit<P: Responder>(&mut self, project: fn(&S) -> &P) -> &mut Self {
        let parent = listeners_of::<P>();
        for (path, handler) in parent.entries() {
            let handler = Rc::clone(handler);
            let lifted: Handler<S> =
                Rc::new(move |this: &S, body: Payload| handler(project(this), body));
            self.inherited.push((path.clone(), lifted));
        }
        self
    }

    /// Every entry in resolution order: own entries, then inherited ones.
    pub fn entries(&self) -> impl Iterator<Item = &(String, Handler<S>)> {
        self.own.iter().chain(self.inherited.iter())
    }

    /// Number of handlers, inherited ones included.
    pub fn len(&self) -> usize {
        self.own.len() + self.inherited.len()
    }

    /// Whether no handler is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bind every handler to `instance`.
    pub fn bind(&self, instance: Rc<S>) -> ResolvedListeners {
        let mut resolved = ResolvedListeners::new();
        for (path, handler) in self.entries() {
            let handler = Rc::clone(handler);
            let instance = Rc::clone(&instance);
            resolved.insert(path.clone(), move |body: Payload| handler(&instance, body));
        }
        resolved
    }
}

thread_local! {
    static TABLES: RefCell<HashMap<TypeId, Rc<dyn Any>>> = RefCell::new(HashMap::new());
}

/// The cached listener table of `S`, built on first use.
pub fn listeners_of<S: Responder>() -> Rc<ListenerTable<S>> {
    let key = TypeId::of::<S>();
    let cached = TABLES.with(|tables| tables.borrow().get(&key).cloned());
    if let Some(table) = cached.and_then(|table| table.downcast::<ListenerTable<S>>().ok()) {
        return table;
    }

    // Built outside the borrow: `inherit` re-enters for ancestor types.
    let mut table = ListenerTable::new();
    S::register_listeners(&mut table);
    let table = Rc::new(table);

    tracing::debug!(
        responder = std::any::type_name::<S>(),
        handlers = table.len(),
        "listener table built"
    );
    TABLES.with(|tables| {
        tables
            .borrow_mut()
            .insert(key, Rc::clone(&table) as Rc<dyn Any>)
    });
    table
}

/// Resolve every handler `instance` answers with.
pub fn resolve<S: Responder>(instance: Rc<S>) -> ResolvedListeners {
    listeners_of::<S>().bind(instance)
}

/// Path → handlers multimap bound to one responder instance.
///
/// Built once per host; read-only while the host runs.
#[derive(Clone, Default)]
pub struct ResolvedListeners {
    by_path: HashMap<String, Vec<BoundHandler>>,
}

impl ResolvedListeners {
    /// Create an empty multimap.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler for `path`.
    pub fn insert<F>(&mut self, path: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(Payload) -> Result<ResponseStream, RemoteError> + 'static,
    {
        let handler: BoundHandler = Rc::new(handler);
        self.by_path.entry(path.into()).or_default().push(handler);
        self
    }

    /// Handlers for `path`, in resolution order. Empty when none match.
    pub fn handlers(&self, path: &str) -> &[BoundHandler] {
        self.by_path.get(path).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Paths with at least one handler.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.by_path.keys().map(String::as_str)
    }

    /// Total number of handlers across all paths.
    pub fn handler_count(&self) -> usize {
        self.by_path.values().map(Vec::len).sum()
    }

    /// Whether no handler is bound.
    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }
}

impl fmt::Debug for ResolvedListeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (path, handlers) in &self.by_path {
            map.entry(path, &handlers.len());
        }
        map.finish()
    }
}
