//! Shared helpers for postwire integration tests.

#![allow(dead_code)]

use std::future::Future;

use futures::StreamExt;
use postwire::{
    Broadcast, Frame, JsonCodec, MessageCodec, Payload, RequestEnvelope, ResponseEnvelope,
    ResponseStream, Subscription,
};
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("postwire=debug")),
        )
        .with_test_writer()
        .try_init();
}

/// Run `future` inside a fresh `LocalSet`.
pub async fn run_local<F: Future>(future: F) -> F::Output {
    init_tracing();
    tokio::task::LocalSet::new().run_until(future).await
}

/// Give spawned local tasks a chance to run to quiescence.
pub async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}

pub fn request_frame(path: &str, id: &str, body: Payload) -> Frame {
    JsonCodec
        .encode(&RequestEnvelope::new(path, id, body))
        .expect("encode request")
}

/// Every response frame buffered on `responses`, decoded.
pub fn drain(responses: &Subscription<Frame>) -> Vec<ResponseEnvelope> {
    std::iter::from_fn(|| responses.try_recv())
        .map(|frame| JsonCodec.decode(&frame).expect("decode response"))
        .collect()
}

/// Every response frame buffered on `responses`, as raw JSON.
pub fn drain_json(responses: &Subscription<Frame>) -> Vec<serde_json::Value> {
    std::iter::from_fn(|| responses.try_recv())
        .map(|frame| serde_json::from_slice(&frame).expect("json frame"))
        .collect()
}

/// Handler output driven by the test: every published value is emitted.
pub fn driven_by(source: &Broadcast<Payload>) -> ResponseStream {
    source.subscribe().map(Ok).boxed_local()
}
