//! Demo: wires a `MatchRegistry` to a tiny built-in Lua echo module, joins
//! two players, and prints what each side sees. Grounded on
//! `tools/multiplayer_demo/src/main.rs`'s shape (spawn the server, spawn a
//! task per player, join/observe/print) and `td_server.rs`'s
//! `tracing_subscriber::EnvFilter` init.

use std::sync::Arc;
use std::time::Duration;

use match_core::{CoreValue, InboundMessage, NodeId, Presence, RuntimeConfig, SessionId, UserId};
use match_registry::MatchRegistry;
use presence::{NullEventSink, PresenceTracker};
use router::MessageRouter;
use script_host::ModuleRegistry;
use tokio::time::sleep;
use tracing_subscriber::EnvFilter;

const ECHO_MODULE: &str = r#"
function match_init(ctx, params)
    return { state = { messages_seen = 0 }, tick_rate = 10, label = '{"mode":"echo_demo"}' }
end

function match_join_attempt(ctx, dispatcher, tick, state, presence, metadata)
    return { state = state, allow = true, reject_reason = nil }
end

function match_leave(ctx, dispatcher, tick, state, leavers)
    return state
end

function match_loop(ctx, dispatcher, tick, state, messages)
    for i, m in ipairs(messages) do
        dispatcher:broadcast(m.op_code, m.data, true)
        state.messages_seen = state.messages_seen + 1
    end
    return state
end
"#;

fn presence(id: &str) -> Presence {
    Presence {
        user_id: UserId::new(format!("user-{id}")),
        session_id: SessionId::new(id),
        node_id: NodeId::new("node-a"),
        username: id.to_string(),
        hidden: false,
        persistence: false,
        status: 0,
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let tracker = Arc::new(PresenceTracker::new(Box::new(NullEventSink)));
    let router = Arc::new(MessageRouter::new(Arc::clone(&tracker)));
    let modules = ModuleRegistry::builder().register("echo", ECHO_MODULE).build();
    let registry = MatchRegistry::new(NodeId::new("node-a"), RuntimeConfig::default(), modules, tracker, router.clone());

    let address = registry
        .create_match("echo", CoreValue::Nil)
        .await
        .expect("echo module should load");
    tracing::info!(%address, "match created");

    let alice = presence("alice");
    let bob = presence("bob");
    let (alice_tx, mut alice_rx) = tokio::sync::mpsc::channel(16);
    let (bob_tx, mut bob_rx) = tokio::sync::mpsc::channel(16);
    router.register_session(alice.session_id.clone(), alice_tx);
    router.register_session(bob.session_id.clone(), bob_tx);

    for p in [&alice, &bob] {
        let verdict = registry
            .join_attempt(&address, p.clone(), CoreValue::Nil)
            .await
            .expect("match should exist");
        if !verdict.allow {
            tracing::warn!(user = p.user_id.as_str(), reason = ?verdict.reason, "join rejected");
            continue;
        }
        registry
            .confirm_join(&address, p.key())
            .expect("confirm should reach the match");
        tracing::info!(user = p.user_id.as_str(), "joined");
    }

    let bob_watch = tokio::spawn(async move {
        while let Some(item) = bob_rx.recv().await {
            tracing::info!(?item.envelope, "bob received");
        }
    });

    sleep(Duration::from_millis(150)).await;

    registry.route_data(
        &address,
        InboundMessage {
            sender: alice.clone(),
            op_code: 1,
            data: b"hello from alice".to_vec(),
        },
    );

    sleep(Duration::from_millis(300)).await;

    if let Some(listing) = registry.get_match(&address) {
        tracing::info!(label = %listing.label, size = listing.size, tick_rate = listing.tick_rate, "match status");
    }

    drop(alice_rx);
    bob_watch.abort();
}
