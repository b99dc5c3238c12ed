//! Message client: issues requests and reassembles their result streams.
//!
//! [`MessageClient::call`] sends one request envelope and returns a
//! [`CallStream`] yielding the `Data` bodies answering it, in arrival order.
//! The stream ends on `Complete`, or yields the remote error once and ends on
//! `Error`. Responses for other correlation ids are skipped, so any number
//! of calls can be in flight on the same client.
//!
//! Dropping a [`CallStream`] stops observing responses. The host is not told;
//! cancel the remote execution with `MessageHost::terminate` when needed.

use std::fmt;
use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::{FusedStream, Stream, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::CallError;
use crate::{
    CallerTransport, CodecError, Frame, JsonCodec, MessageCodec, Payload, RequestEnvelope,
    ResponseEnvelope, Subscription,
};

/// Issues requests over a transport.
pub struct MessageClient<T, C = JsonCodec>
where
    T: CallerTransport,
    C: MessageCodec,
{
    transport: T,
    codec: C,
}

impl<T: CallerTransport> MessageClient<T> {
    /// Create a client with the JSON codec.
    pub fn new(transport: T) -> Self {
        Self::with_codec(transport, JsonCodec)
    }
}

impl<T, C> MessageClient<T, C>
where
    T: CallerTransport,
    C: MessageCodec,
{
    /// Create a client with a custom codec.
    pub fn with_codec(transport: T, codec: C) -> Self {
        Self { transport, codec }
    }

    /// Underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Send a request on `path` and stream its results.
    ///
    /// The response stream is observed before the request leaves, so no
    /// response can be missed. A request that cannot be encoded or sent
    /// yields that error as the stream's only item.
    pub fn call(&self, path: &str, body: Payload) -> CallStream<C> {
        let id = self.transport.next_id();
        let responses = self.transport.responses();
        let request = RequestEnvelope::new(path, id.as_str(), body);

        let sent = self
            .codec
            .encode(&request)
            .map_err(CallError::from)
            .and_then(|frame| self.transport.send(frame).map_err(CallError::from));

        match sent {
            Ok(()) => {
                tracing::trace!(path = %path, id = %id, "request sent");
                CallStream::waiting(id, responses, self.codec.clone())
            }
            Err(error) => {
                tracing::warn!(path = %path, id = %id, error = %error, "request not sent");
                CallStream::failed(id, error, self.codec.clone())
            }
        }
    }

    /// Send a typed request on `path` and stream typed results.
    pub fn call_typed<Req, Resp>(&self, path: &str, request: &Req) -> TypedCallStream<Resp, C>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let inner = match serde_json::to_value(request) {
            Ok(body) => self.call(path, body),
            Err(error) => {
                let error = CallError::Codec(CodecError::Encode(Box::new(error)));
                CallStream::failed(self.transport.next_id(), error, self.codec.clone())
            }
        };
        TypedCallStream {
            inner,
            _marker: PhantomData,
        }
    }
}

impl<T, C> fmt::Debug for MessageClient<T, C>
where
    T: CallerTransport,
    C: MessageCodec + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageClient")
            .field("codec", &self.codec)
            .finish_non_exhaustive()
    }
}

enum CallState {
    Failed(CallError),
    Waiting(Subscription<Frame>),
    Done,
}

/// Results of one call.
///
/// Yields `Ok` for every `Data` response, then ends. An `Err` item is always
/// the last one.
pub struct CallStream<C = JsonCodec> {
    id: String,
    state: CallState,
    codec: C,
}

// No field is structurally pinned.
impl<C> Unpin for CallStream<C> {}

impl<C: MessageCodec> CallStream<C> {
    fn waiting(id: String, responses: Subscription<Frame>, codec: C) -> Self {
        Self {
            id,
            state: CallState::Waiting(responses),
            codec,
        }
    }

    fn failed(id: String, error: CallError, codec: C) -> Self {
        Self {
            id,
            state: CallState::Failed(error),
            codec,
        }
    }

    /// Correlation id of the request.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether the call reached its end.
    pub fn is_finished(&self) -> bool {
        matches!(self.state, CallState::Done)
    }

    /// Collect every value, failing on the first error.
    pub async fn try_collect_all(mut self) -> Result<Vec<Payload>, CallError> {
        let mut values = Vec::new();
        while let Some(item) = self.next().await {
            values.push(item?);
        }
        Ok(values)
    }
}

impl<C: MessageCodec> Stream for CallStream<C> {
    type Item = Result<Payload, CallError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        let responses = match &mut this.state {
            CallState::Waiting(responses) => responses,
            CallState::Done => return Poll::Ready(None),
            CallState::Failed(_) => {
                return match std::mem::replace(&mut this.state, CallState::Done) {
                    CallState::Failed(error) => Poll::Ready(Some(Err(error))),
                    _ => Poll::Ready(None),
                };
            }
        };

        loop {
            let frame = match responses.poll_next_unpin(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Some(frame)) => frame,
                Poll::Ready(None) => {
                    tracing::debug!(id = %this.id, "response stream ended mid-call");
                    this.state = CallState::Done;
                    return Poll::Ready(Some(Err(CallError::Disconnected)));
                }
            };

            let envelope: ResponseEnvelope = match this.codec.decode(&frame) {
                Ok(envelope) => envelope,
                Err(error) => {
                    tracing::warn!(
                        id = %this.id,
                        error = %error,
                        "skipping malformed response frame"
                    );
                    continue;
                }
            };
            if envelope.id() != this.id {
                continue;
            }

            match envelope {
                ResponseEnvelope::Data { body, .. } => return Poll::Ready(Some(Ok(body))),
                ResponseEnvelope::Complete { .. } => {
                    this.state = CallState::Done;
                    return Poll::Ready(None);
                }
                ResponseEnvelope::Error { error, .. } => {
                    this.state = CallState::Done;
                    return Poll::Ready(Some(Err(CallError::Remote(error))));
                }
            }
        }
    }
}

impl<C: MessageCodec> FusedStream for CallStream<C> {
    fn is_terminated(&self) -> bool {
        self.is_finished()
    }
}

impl<C> fmt::Debug for CallStream<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state {
            CallState::Failed(_) => "failed",
            CallState::Waiting(_) => "waiting",
            CallState::Done => "done",
        };
        f.debug_struct("CallStream")
            .field("id", &self.id)
            .field("state", &state)
            .finish()
    }
}

/// [`CallStream`] decoding each value into `Resp`.
///
/// A value of the wrong shape yields [`CallError::Decode`] and ends the
/// stream.
pub struct TypedCallStream<Resp, C = JsonCodec> {
    inner: CallStream<C>,
    _marker: PhantomData<fn() -> Resp>,
}

impl<Resp, C> Unpin for TypedCallStream<Resp, C> {}

impl<Resp: DeserializeOwned, C: MessageCodec> TypedCallStream<Resp, C> {
    /// Correlation id of the request.
    pub fn id(&self) -> &str {
        self.inner.id()
    }

    /// Collect every value, failing on the first error.
    pub async fn try_collect_all(mut self) -> Result<Vec<Resp>, CallError> {
        let mut values = Vec::new();
        while let Some(item) = self.next().await {
            values.push(item?);
        }
        Ok(values)
    }
}

impl<Resp: DeserializeOwned, C: MessageCodec> Stream for TypedCallStream<Resp, C> {
    type Item = Result<Resp, CallError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let body = match this.inner.poll_next_unpin(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(None) => return Poll::Ready(None),
            Poll::Ready(Some(Err(error))) => return Poll::Ready(Some(Err(error))),
            Poll::Ready(Some(Ok(body))) => body,
        };

        match serde_json::from_value(body) {
            Ok(value) => Poll::Ready(Some(Ok(value))),
            Err(error) => {
                this.inner.state = CallState::Done;
                Poll::Ready(Some(Err(CallError::Decode {
                    message: error.to_string(),
                })))
            }
        }
    }
}

impl<Resp: DeserializeOwned, C: MessageCodec> FusedStream for TypedCallStream<Resp, C> {
    fn is_terminated(&self) -> bool {
        self.inner.is_finished()
    }
}

impl<Resp, C> fmt::Debug for TypedCallStream<Resp, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.inner, f)
    }
}
