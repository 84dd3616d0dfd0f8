use std::sync::Arc;
use std::time::Duration;

use match_core::{CoreValue, NodeId, Presence, RuntimeConfig, SessionId, UserId};
use match_registry::MatchRegistry;
use presence::{NullEventSink, PresenceTracker};
use router::MessageRouter;
use script_host::ModuleRegistry;

const ECHO_MODULE: &str = r#"
function match_init(ctx, params)
    return { state = {}, tick_rate = 20, label = "room" }
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
    end
    return state
end
"#;

const DUEL_MODULE: &str = r#"
function match_init(ctx, params)
    return { state = {}, tick_rate = 10, label = '{"mode":"duel"}' }
end

function match_join_attempt(ctx, dispatcher, tick, state, presence, metadata)
    return { state = state, allow = true, reject_reason = nil }
end

function match_leave(ctx, dispatcher, tick, state, leavers)
    return state
end

function match_loop(ctx, dispatcher, tick, state, messages)
    return state
end
"#;

fn modules() -> ModuleRegistry {
    ModuleRegistry::builder()
        .register("echo", ECHO_MODULE)
        .register("duel", DUEL_MODULE)
        .build()
}

fn registry() -> MatchRegistry {
    let tracker = Arc::new(PresenceTracker::new(Box::new(NullEventSink)));
    let router = Arc::new(MessageRouter::new(Arc::clone(&tracker)));
    MatchRegistry::new(NodeId::new("node-a"), RuntimeConfig::default(), modules(), tracker, router)
}

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

#[tokio::test]
async fn create_and_get_round_trips_listing() {
    let reg = registry();
    let address = reg.create_match("echo", CoreValue::Nil).await.unwrap();
    let listing = reg.get_match(&address).expect("match should be listed");
    assert_eq!(listing.label, "room");
    assert_eq!(listing.module_name, "echo");
    assert_eq!(listing.tick_rate, 20);
}

#[tokio::test]
async fn create_with_unknown_module_leaves_no_trace() {
    let reg = registry();
    let err = reg.create_match("nonexistent", CoreValue::Nil).await;
    assert!(matches!(err, Err(match_core::MatchCoreError::InvalidArgument(_))));
    assert_eq!(reg.match_count(), 0);
}

#[tokio::test]
async fn list_matches_applies_the_query_language() {
    let reg = registry();
    reg.create_match("echo", CoreValue::Nil).await.unwrap();
    reg.create_match("duel", CoreValue::Nil).await.unwrap();

    let all = reg.list_matches(10, true, None, None, None, None).unwrap();
    assert_eq!(all.len(), 2);

    let duels = reg
        .list_matches(10, true, None, None, None, Some("+value.mode:duel"))
        .unwrap();
    assert_eq!(duels.len(), 1);
    assert_eq!(duels[0].module_name, "duel");
}

#[tokio::test]
async fn non_authoritative_listing_is_always_empty() {
    let reg = registry();
    reg.create_match("echo", CoreValue::Nil).await.unwrap();
    let listed = reg.list_matches(10, false, None, None, None, None).unwrap();
    assert!(listed.is_empty());
}

#[tokio::test]
async fn malformed_query_is_rejected() {
    let reg = registry();
    reg.create_match("echo", CoreValue::Nil).await.unwrap();
    let result = reg.list_matches(10, true, None, None, None, Some("novalueseparator"));
    assert!(result.is_err());
}

/// Covers spec §8 scenario 1: join, confirm, route data, observe the
/// echoed broadcast arrive through the router on the other session.
#[tokio::test(flavor = "multi_thread")]
async fn join_confirm_and_route_data_deliver_through_the_router() {
    let tracker = Arc::new(PresenceTracker::new(Box::new(NullEventSink)));
    let router = Arc::new(MessageRouter::new(Arc::clone(&tracker)));
    let reg = MatchRegistry::new(
        NodeId::new("node-a"),
        RuntimeConfig::default(),
        modules(),
        Arc::clone(&tracker),
        Arc::clone(&router),
    );

    let address = reg.create_match("echo", CoreValue::Nil).await.unwrap();

    let a = presence("a");
    let b = presence("b");
    let (tx_a, _rx_a) = tokio::sync::mpsc::channel(8);
    let (tx_b, mut rx_b) = tokio::sync::mpsc::channel(8);
    router.register_session(a.session_id.clone(), tx_a);
    router.register_session(b.session_id.clone(), tx_b);

    for p in [&a, &b] {
        let verdict = reg
            .join_attempt(&address, p.clone(), CoreValue::Nil)
            .await
            .unwrap();
        assert!(verdict.allow);
        reg.confirm_join(&address, p.key()).unwrap();
    }

    tokio::time::sleep(Duration::from_millis(80)).await;

    reg.route_data(
        &address,
        match_core::InboundMessage {
            sender: a.clone(),
            op_code: 7,
            data: vec![0xAB],
        },
    );

    let item = tokio::time::timeout(Duration::from_millis(500), rx_b.recv())
        .await
        .expect("should not time out")
        .expect("channel open");
    match item.envelope {
        match_core::Envelope::MatchData(data) => {
            assert_eq!(data.op_code, 7);
            assert_eq!(data.data, vec![0xAB]);
        }
        _ => panic!("expected match data envelope"),
    }
}

#[tokio::test]
async fn route_data_to_unknown_address_is_a_silent_no_op() {
    let reg = registry();
    reg.route_data(
        "00000000000000000000000000000000.node-a",
        match_core::InboundMessage {
            sender: presence("ghost"),
            op_code: 1,
            data: vec![],
        },
    );
}

#[tokio::test]
async fn get_match_on_unknown_address_is_none() {
    let reg = registry();
    assert!(reg.get_match("00000000000000000000000000000000.node-a").is_none());
}
