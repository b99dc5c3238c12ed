//! Host lifecycle, protocol violations and peer composition.

mod common;

use std::rc::Rc;

use futures::StreamExt;
use postwire::{
    Broadcast, CallError, CallerTransport, HostState, ListenerTable, MemoryTransport,
    MessageClient, MessageHost, MessagePeer, Payload, RemoteError, ResolvedListeners, Responder,
    ResponseEnvelope, TransportError,
};
use serde_json::json;

use common::{drain, driven_by, request_frame, run_local, settle};

struct Echo;

impl Responder for Echo {
    fn register_listeners(table: &mut ListenerTable<Self>) {
        table
            .listen_async("echo", |_this: &Self, body: Payload| async move {
                Ok::<_, RemoteError>(body)
            })
            .listen("panic", |_this: &Self, _body| panic!("handler exploded"));
    }
}

fn watching(source: &Broadcast<Payload>) -> ResolvedListeners {
    let source = source.clone();
    let mut listeners = ResolvedListeners::new();
    listeners.insert("watch", move |_body| Ok(driven_by(&source)));
    listeners
}

// =============================================================================
// Protocol violations
// =============================================================================

#[tokio::test]
async fn test_malformed_requests_are_dropped() {
    run_local(async {
        let (caller, responder) = MemoryTransport::pair();
        let responses = caller.responses();
        let host = MessageHost::for_responder(responder.clone(), Rc::new(Echo));
        host.listen().expect("listen");

        responder.deliver_request(b"definitely not json".to_vec());
        responder.deliver_request(br#"{"path":"echo","body":1}"#.to_vec());
        responder.deliver_request(br#"{"path":"echo","id":"1"}"#.to_vec());
        responder.deliver_request(request_frame("echo", "ok", json!(7)));
        settle().await;

        let stats = host.stats();
        assert_eq!(stats.frames_dropped, 3);
        assert_eq!(stats.requests_received, 1);
        assert_eq!(
            drain(&responses),
            vec![
                ResponseEnvelope::data("ok", json!(7)),
                ResponseEnvelope::complete("ok"),
            ]
        );
    })
    .await;
}

#[tokio::test]
async fn test_unmatched_path_is_silent() {
    run_local(async {
        let (caller, responder) = MemoryTransport::pair();
        let responses = caller.responses();
        let host = MessageHost::for_responder(responder.clone(), Rc::new(Echo));
        host.listen().expect("listen");

        responder.deliver_request(request_frame("nowhere", "1", json!(null)));
        settle().await;

        assert!(drain(&responses).is_empty());
        assert_eq!(host.stats().unmatched_paths, 1);
    })
    .await;
}

#[tokio::test]
async fn test_panicking_handler_becomes_error_response() {
    run_local(async {
        let (caller, responder) = MemoryTransport::pair();
        let host = MessageHost::for_responder(responder, Rc::new(Echo));
        host.listen().expect("listen");
        let client = MessageClient::new(caller);

        let error = client
            .call("panic", json!(null))
            .try_collect_all()
            .await
            .expect_err("handler panics");
        let remote = error.as_remote().expect("remote error");
        assert_eq!(remote.name, RemoteError::PANICKED);
        assert_eq!(remote.message, "handler exploded");

        // The host keeps serving.
        let values = client
            .call("echo", json!("after"))
            .try_collect_all()
            .await
            .expect("echo");
        assert_eq!(values, vec![json!("after")]);
    })
    .await;
}

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test]
async fn test_requests_before_listen_are_not_seen() {
    run_local(async {
        let (caller, responder) = MemoryTransport::pair();
        let responses = caller.responses();
        let host = MessageHost::for_responder(responder.clone(), Rc::new(Echo));

        responder.deliver_request(request_frame("echo", "early", json!(1)));
        host.listen().expect("listen");
        responder.deliver_request(request_frame("echo", "late", json!(2)));
        settle().await;

        let ids: Vec<_> = drain(&responses)
            .iter()
            .map(|envelope| envelope.id().to_string())
            .collect();
        assert_eq!(ids, vec!["late", "late"]);
    })
    .await;
}

#[tokio::test]
async fn test_dispose_stops_running_executions() {
    run_local(async {
        let source = Broadcast::new();
        let (caller, responder) = MemoryTransport::pair();
        let responses = caller.responses();
        let host = MessageHost::new(responder.clone(), watching(&source));
        host.listen().expect("listen");

        responder.deliver_request(request_frame("watch", "1", json!(null)));
        settle().await;
        source.publish(json!("before"));
        settle().await;

        host.dispose();
        source.publish(json!("after"));
        responder.deliver_request(request_frame("watch", "2", json!(null)));
        settle().await;

        assert_eq!(host.state(), HostState::Disposed);
        assert_eq!(
            drain(&responses),
            vec![ResponseEnvelope::data("1", json!("before"))]
        );
    })
    .await;
}

#[tokio::test]
async fn test_respond_failure_is_counted() {
    run_local(async {
        let source = Broadcast::new();
        let (caller, responder) = MemoryTransport::pair();
        let host = MessageHost::new(responder.clone(), watching(&source));
        host.listen().expect("listen");

        responder.deliver_request(request_frame("watch", "1", json!(null)));
        settle().await;
        caller.close();
        source.publish(json!("lost"));
        settle().await;

        assert_eq!(host.stats().respond_failures, 1);
    })
    .await;
}

#[tokio::test]
async fn test_closed_transport_fails_calls() {
    run_local(async {
        let source = Broadcast::new();
        let (caller, responder) = MemoryTransport::pair();
        let host = MessageHost::new(responder, watching(&source));
        host.listen().expect("listen");
        let client = MessageClient::new(caller.clone());

        let pending = client.call("watch", json!(null));
        settle().await;
        caller.close();

        assert!(matches!(
            pending.try_collect_all().await,
            Err(CallError::Disconnected)
        ));
        assert!(matches!(
            client.call("watch", json!(null)).try_collect_all().await,
            Err(CallError::Transport(TransportError::Closed))
        ));
    })
    .await;
}

// =============================================================================
// Peers
// =============================================================================

#[tokio::test]
async fn test_peer_repoint_moves_both_roles() {
    run_local(async {
        let (old_near, old_far) = MemoryTransport::pair();
        let (new_near, new_far) = MemoryTransport::pair();
        let old_responses = old_far.responses();
        let new_responses = new_far.responses();

        let peer = MessagePeer::for_responder(old_near, Rc::new(Echo)).expect("peer");
        peer.repoint(new_near).expect("repoint");
        assert_eq!(peer.state(), HostState::Listening);

        old_far
            .send(request_frame("echo", "old", json!(1)))
            .expect("old send");
        new_far
            .send(request_frame("echo", "new", json!(2)))
            .expect("new send");
        settle().await;

        assert!(drain(&old_responses).is_empty());
        assert_eq!(
            drain(&new_responses),
            vec![
                ResponseEnvelope::data("new", json!(2)),
                ResponseEnvelope::complete("new"),
            ]
        );

        // Outgoing calls leave through the new transport.
        let requests = postwire::ResponderTransport::requests(&new_far);
        let _call = peer.call("echo", json!(3));
        assert_eq!(requests.len(), 1);
    })
    .await;
}

#[tokio::test]
async fn test_peer_terminates_its_own_executions() {
    run_local(async {
        let source = Broadcast::new();
        let (near, far) = MemoryTransport::pair();
        let peer = MessagePeer::new(near, watching(&source)).expect("peer");
        let remote = MessageClient::new(far);

        let mut call = remote.call("watch", json!(null));
        settle().await;
        source.publish(json!(1));
        assert_eq!(call.next().await.map(Result::ok), Some(Some(json!(1))));

        assert_eq!(peer.terminate(call.id()), 1);
        assert_eq!(peer.stats().executions_cancelled, 0);
        settle().await;
        assert_eq!(peer.stats().executions_cancelled, 1);
    })
    .await;
}
