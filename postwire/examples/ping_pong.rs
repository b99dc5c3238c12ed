//! Ping-Pong Example: two peers calling each other over an in-memory channel.
//!
//! ```bash
//! cargo run -p postwire --example ping_pong
//! RUST_LOG=postwire=trace cargo run -p postwire --example ping_pong
//! ```
//!
//! # Architecture
//!
//! The example shows:
//! - `messages!` for body types
//! - `Responder` + `ListenerTable` for handler declaration, with an embedded
//!   parent type whose handlers are accumulated
//! - `callers!` for a typed caller
//! - `MessagePeer` for a peer that both answers and calls
//! - `terminate` for cancelling a streaming execution

use std::rc::Rc;
use std::time::Duration;

use futures::{stream, StreamExt};
use postwire::{
    callers, messages, ListenerTable, MemoryTransport, MessagePeer, RemoteError, Responder,
};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Message Types
// ============================================================================

messages! {
    /// Request message for ping-pong.
    pub struct Ping {
        /// Sequence number for tracking.
        pub seq: u32,
        /// Payload message.
        pub message: String,
    }

    /// Response message for ping-pong.
    pub struct Pong {
        /// Echoed sequence number.
        pub seq: u32,
        /// Echoed message with "pong:" prefix.
        pub echo: String,
    }
}

// ============================================================================
// Callers
// ============================================================================

callers! {
    /// Calls a remote ponger.
    pub struct PingPong {
        /// One pong per ping.
        fn ping(Ping) -> Pong = "ping";
        /// A pong every 10ms until cancelled.
        fn ticks(u32) -> u32 = "ticks";
        /// Who answers, from every accumulated handler.
        fn whoami(()) -> String = "whoami";
    }
}

// ============================================================================
// Responders
// ============================================================================

struct Base;

impl Responder for Base {
    fn register_listeners(table: &mut ListenerTable<Self>) {
        table.listen_async("whoami", |_this: &Self, _: ()| async {
            Ok::<_, RemoteError>("base".to_string())
        });
    }
}

struct Ponger {
    name: &'static str,
    base: Base,
}

impl Responder for Ponger {
    fn register_listeners(table: &mut ListenerTable<Self>) {
        table
            .listen_async("ping", |this: &Self, ping: Ping| {
                let echo = format!("pong from {}: {}", this.name, ping.message);
                async move { Ok::<_, RemoteError>(Pong { seq: ping.seq, echo }) }
            })
            .listen_stream("ticks", |_this: &Self, start: u32| {
                stream::unfold(start, |n| async move {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    Some((Ok::<_, RemoteError>(n), n + 1))
                })
            })
            .listen_async("whoami", |this: &Self, _: ()| {
                let name = this.name.to_string();
                async move { Ok::<_, RemoteError>(name) }
            })
            .inherit(|ponger: &Ponger| &ponger.base);
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let (left, right) = MemoryTransport::pair();

    let alice = MessagePeer::for_responder(
        left.clone(),
        Rc::new(Ponger {
            name: "alice",
            base: Base,
        }),
    )?;
    let bob = MessagePeer::for_responder(
        right.clone(),
        Rc::new(Ponger {
            name: "bob",
            base: Base,
        }),
    )?;

    let to_bob = PingPong::connect(left);
    for seq in 0..3 {
        let ping = Ping {
            seq,
            message: format!("hello (seq={seq})"),
        };
        for pong in to_bob.ping(&ping).try_collect_all().await? {
            println!("alice <- {:?}", pong);
        }
    }

    // The call ends at the first completion, so only the most-derived handler
    // is seen here; the base handler still answers on the wire.
    let names = to_bob.whoami(&()).try_collect_all().await?;
    println!("alice asked whoami: {:?}", names);

    let mut ticks = PingPong::connect(right).ticks(&100);
    let mut seen = Vec::new();
    while let Some(tick) = ticks.next().await {
        seen.push(tick?);
        if seen.len() == 3 {
            alice.terminate(ticks.id());
            break;
        }
    }
    println!("bob saw ticks {:?} before cancelling", seen);

    println!("alice stats: {:?}", alice.stats());
    println!("bob stats: {:?}", bob.stats());
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();

    tokio::task::LocalSet::new().run_until(run()).await
}
