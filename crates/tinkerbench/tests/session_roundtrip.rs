//! End-to-end tests against a real listener on an ephemeral port.

use std::time::Duration;

use async_trait::async_trait;
use benchconf::{BenchConfig, SessionPolicy};
use benchproto::{BenchClient, CommandError, ErrorCode, Response};
use bytes::Bytes;
use serde_json::{json, Map, Value};
use tinkerbench::dispatch::{CommandHandler, CommandRegistry};
use tinkerbench::marshal::{self, MainThread};
use tinkerbench::{build_registry, handlers, Daemon, HostState};

/// Blocks the main thread for a while, like a long editor operation.
struct SlowEdit {
    main: MainThread,
    millis: u64,
}

#[async_trait]
impl CommandHandler for SlowEdit {
    fn description(&self) -> &str {
        "Hold the main thread"
    }

    async fn handle(&self, _parameters: Map<String, Value>) -> Result<Value, CommandError> {
        let millis = self.millis;
        self.main
            .run(move |_| std::thread::sleep(Duration::from_millis(millis)))
            .await?;
        Ok(json!({ "slept-ms": millis }))
    }
}

fn config() -> BenchConfig {
    let mut config = BenchConfig::default();
    config.infra.bind.port = 0;
    config
}

async fn start(config: BenchConfig, slow_ms: u64) -> Daemon {
    let registry = build_registry(&config.bootstrap.catalog).unwrap();
    let host = HostState::new(registry, config.bootstrap.discovery.clone());
    let (main, main_loop) = marshal::channel(host, config.task_timeout());
    let main_loop = main_loop.spawn().unwrap();

    let mut commands = CommandRegistry::new();
    handlers::register_all(&mut commands, &main);
    commands.register(
        "slow_edit",
        SlowEdit {
            main: main.clone(),
            millis: slow_ms,
        },
    );
    Daemon::serve(&config, commands, main, main_loop).await.unwrap()
}

async fn connect(daemon: &Daemon) -> BenchClient {
    BenchClient::connect(daemon.local_addr())
        .await
        .unwrap()
        .with_timeout(Duration::from_secs(5))
}

fn operations(response: &Response) -> Vec<Value> {
    response
        .get("operations")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

fn pin_shapes(node: &Value) -> Vec<(String, String, String)> {
    node["pins"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| {
            (
                p["name"].as_str().unwrap().to_string(),
                p["type-category"].as_str().unwrap().to_string(),
                p["direction"].as_str().unwrap().to_string(),
            )
        })
        .collect()
}

async fn catalog_walks(client: &mut BenchClient) -> u64 {
    let stats = client.call("get_cache_stats", json!({})).await.unwrap();
    assert!(stats.success, "{stats:?}");
    stats.get("catalog-walks").and_then(Value::as_u64).unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn test_discover_then_create_by_key() {
    let daemon = start(config(), 0).await;
    let mut client = connect(&daemon).await;

    client
        .send_raw(Bytes::from_static(
            br#"{"command-type":"discover_operations","parameters":{"query":"clamp","max-results":5}}"#,
        ))
        .await
        .unwrap();
    let discovered = client.recv().await.unwrap();
    assert!(discovered.success, "{discovered:?}");

    let ops = operations(&discovered);
    assert!(!ops.is_empty() && ops.len() <= 5);
    assert!(ops[0]["display-name"].as_str().unwrap().contains("Clamp"));
    let scores: Vec<u64> = ops.iter().map(|o| o["relevance-score"].as_u64().unwrap()).collect();
    assert!(scores.windows(2).all(|w| w[0] >= w[1]));

    let key = ops[0]["key"].as_str().unwrap().to_string();
    let walks_before = catalog_walks(&mut client).await;

    let first = client
        .call("create_node_by_key", json!({"key": key, "position": [0, 0]}))
        .await
        .unwrap();
    let second = client
        .call("create_node_by_key", json!({"key": key, "position": [300, 120]}))
        .await
        .unwrap();
    assert!(first.success && second.success, "{first:?} {second:?}");
    assert_eq!(first.get("cache-hit"), Some(&json!(true)));

    let first_id = first.get("node-id").unwrap();
    let second_id = second.get("node-id").unwrap();
    assert_ne!(first_id, second_id);
    assert_eq!(
        pin_shapes(first.get("node").unwrap()),
        pin_shapes(second.get("node").unwrap())
    );

    // creating from a cached key never walks the catalog
    assert_eq!(catalog_walks(&mut client).await, walks_before);

    drop(client);
    daemon.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_responses_follow_request_order() {
    let daemon = start(config(), 300).await;
    let mut client = connect(&daemon).await;

    // both requests are on the wire before the first is answered
    client
        .send_raw(Bytes::from_static(br#"{"command-type":"slow_edit"}"#))
        .await
        .unwrap();
    client
        .send_raw(Bytes::from_static(br#"{"command-type":"ping"}"#))
        .await
        .unwrap();

    let r1 = client.recv().await.unwrap();
    let r2 = client.recv().await.unwrap();
    assert_eq!(r1.get("slept-ms"), Some(&json!(300)));
    assert_eq!(r2.get("pong"), Some(&json!(true)));

    drop(client);
    daemon.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_main_thread_timeout_answers_once() {
    let mut config = config();
    config.infra.marshal.task_timeout_ms = 100;
    let daemon = start(config, 400).await;
    let mut client = connect(&daemon).await;

    let response = client.call("slow_edit", json!({})).await.unwrap();
    assert!(!response.success);
    assert_eq!(response.code(), Some(ErrorCode::MainThreadTimeout));

    // the task finishes later; its result must not become a second response
    let extra = client.try_recv(Duration::from_millis(600)).await.unwrap();
    assert!(extra.is_none(), "unexpected late response: {extra:?}");

    // session survives the timeout
    let stats = client.call("get_cache_stats", json!({})).await.unwrap();
    assert!(stats.success, "{stats:?}");
    assert_eq!(stats.get("marshal").unwrap()["late-discarded"], json!(1));
    assert_eq!(stats.get("marshal").unwrap()["timed-out"], json!(1));
    assert_eq!(daemon.main_thread().stats().late_discarded(), 1);

    drop(client);
    daemon.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_second_client_rejected_by_default() {
    let daemon = start(config(), 0).await;
    let mut first = connect(&daemon).await;
    assert!(first.call("ping", json!({})).await.unwrap().success);

    let mut second = connect(&daemon).await;
    let busy = second.recv().await.unwrap();
    assert_eq!(busy.code(), Some(ErrorCode::ServerBusy));
    assert!(second.is_closed(Duration::from_secs(1)).await);

    // the active session is unaffected
    assert!(first.call("ping", json!({})).await.unwrap().success);

    // once it leaves, the next client is served
    drop(first);
    let mut third = connect(&daemon).await;
    let mut served = false;
    for _ in 0..20 {
        match third.call("ping", json!({})).await {
            Ok(r) if r.success => {
                served = true;
                break;
            }
            _ => {
                // the old session may not have noticed the disconnect yet
                tokio::time::sleep(Duration::from_millis(50)).await;
                third = connect(&daemon).await;
            }
        }
    }
    assert!(served);

    drop(third);
    daemon.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_supersede_waits_for_in_flight_command() {
    let mut config = config();
    config.infra.session.policy = SessionPolicy::Supersede;
    let daemon = start(config, 300).await;

    let mut first = connect(&daemon).await;
    assert!(first.call("ping", json!({})).await.unwrap().success);
    first
        .send_raw(Bytes::from_static(br#"{"command-type":"slow_edit"}"#))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut second = connect(&daemon).await;

    // the in-flight command still gets its answer, then the session closes
    let answered = first.recv().await.unwrap();
    assert_eq!(answered.get("slept-ms"), Some(&json!(300)));
    assert!(first.is_closed(Duration::from_secs(1)).await);

    assert!(second.call("ping", json!({})).await.unwrap().success);

    drop(second);
    daemon.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_malformed_request_keeps_session() {
    let daemon = start(config(), 0).await;
    let mut client = connect(&daemon).await;

    client.send_raw(Bytes::from_static(b"{not json")).await.unwrap();
    let response = client.recv().await.unwrap();
    assert_eq!(response.code(), Some(ErrorCode::MalformedRequest));

    client
        .send_raw(Bytes::from_static(br#"{"parameters":{}}"#))
        .await
        .unwrap();
    let response = client.recv().await.unwrap();
    assert_eq!(response.code(), Some(ErrorCode::MalformedRequest));

    let response = client.call("warp_drive", json!({})).await.unwrap();
    assert_eq!(response.code(), Some(ErrorCode::CommandNotFound));

    let response = client
        .call("create_node_by_key", json!({"position": [0, 0]}))
        .await
        .unwrap();
    assert_eq!(response.code(), Some(ErrorCode::InvalidParams));

    assert!(client.call("ping", json!({})).await.unwrap().success);

    drop(client);
    daemon.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_oversized_frame_closes_session_not_listener() {
    let mut config = config();
    config.infra.session.max_frame_bytes = 128;
    let daemon = start(config, 0).await;

    let mut client = connect(&daemon).await;
    let big = format!(r#"{{"command-type":"ping","parameters":{{"pad":"{}"}}}}"#, "x".repeat(500));
    // the write may or may not fail depending on when the server hangs up
    let _ = client.send_raw(Bytes::from(big)).await;
    assert!(client.is_closed(Duration::from_secs(2)).await);
    drop(client);

    let mut next = None;
    for _ in 0..20 {
        let mut candidate = connect(&daemon).await;
        if let Ok(r) = candidate.call("ping", json!({})).await {
            if r.success {
                next = Some(candidate);
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(next.is_some(), "listener stopped accepting");

    drop(next);
    daemon.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_response_over_frame_limit_is_still_answered() {
    let mut config = config();
    config.infra.session.max_frame_bytes = 400;
    let daemon = start(config, 0).await;
    let mut client = connect(&daemon).await;

    let listing = client.call("list_commands", json!({})).await.unwrap();
    assert!(!listing.success);
    assert_eq!(listing.code(), Some(ErrorCode::ResponseTooLarge));

    // same session keeps serving small responses
    let pong = client.call("ping", json!({})).await.unwrap();
    assert!(pong.success, "{pong:?}");

    drop(client);
    daemon.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_stale_descriptor_after_compile() {
    let daemon = start(config(), 0).await;
    let mut client = connect(&daemon).await;

    let created = client
        .call("create_blueprint", json!({"name": "BP_Door"}))
        .await
        .unwrap();
    assert!(created.success, "{created:?}");
    let added = client
        .call(
            "add_blueprint_variable",
            json!({"blueprint": "BP_Door", "name": "Health", "variable-type": "real"}),
        )
        .await
        .unwrap();
    assert!(added.success, "{added:?}");

    let discovered = client
        .call(
            "discover_operations",
            json!({"query": "Health", "blueprint": "BP_Door"}),
        )
        .await
        .unwrap();
    let ops = operations(&discovered);
    let getter = ops
        .iter()
        .find(|op| op["node-kind"] == "variable-get")
        .cloned()
        .unwrap();

    let compiled = client
        .call("compile_blueprint", json!({"blueprint": "BP_Door"}))
        .await
        .unwrap();
    assert!(compiled.success, "{compiled:?}");

    let stale = client
        .call(
            "create_node_from_descriptor",
            json!({"descriptor": getter, "blueprint": "BP_Door"}),
        )
        .await
        .unwrap();
    assert_eq!(stale.code(), Some(ErrorCode::StaleTemplate));

    // the key itself still resolves against the recompiled class
    let fresh = client
        .call(
            "create_node_by_key",
            json!({"key": getter["key"], "blueprint": "BP_Door"}),
        )
        .await
        .unwrap();
    assert!(fresh.success, "{fresh:?}");
    assert_eq!(fresh.get("cache-hit"), Some(&json!(false)));

    let unknown = client
        .call(
            "create_node_from_descriptor",
            json!({"descriptor": {"node-kind": "timeline", "key": "timeline:x"}}),
        )
        .await
        .unwrap();
    assert_eq!(unknown.code(), Some(ErrorCode::UnresolvedNodeKind));

    drop(client);
    let host = daemon.shutdown().await.unwrap();
    assert_eq!(host.graph("BP_Door", "EventGraph").unwrap().node_count(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_reroute_round_trip() {
    let daemon = start(config(), 0).await;
    let mut client = connect(&daemon).await;

    let key = "fn:/Script/Engine.KismetSystemLibrary:PrintString";
    let a = client.call("create_node_by_key", json!({"key": key})).await.unwrap();
    let b = client.call("create_node_by_key", json!({"key": key})).await.unwrap();
    let a_id = a.get("node-id").unwrap().clone();
    let b_id = b.get("node-id").unwrap().clone();

    let linked = client
        .call(
            "connect_pins",
            json!({
                "blueprint": "BP_Scratch",
                "source": {"node-id": a_id, "pin": "then"},
                "target": {"node-id": b_id, "pin": "execute"},
            }),
        )
        .await
        .unwrap();
    assert!(linked.success, "{linked:?}");

    let routed = client
        .call(
            "insert_reroute_nodes",
            json!({
                "source": {"node-id": a_id, "pin": "then"},
                "target": {"node-id": b_id, "pin": "execute"},
                "waypoints": [[100, 0], [200, 0]],
            }),
        )
        .await
        .unwrap();
    assert!(routed.success, "{routed:?}");
    assert_eq!(routed.get("node-ids").unwrap().as_array().unwrap().len(), 2);

    let graph = client
        .call("get_graph", json!({"blueprint": "BP_Scratch"}))
        .await
        .unwrap();
    assert_eq!(graph.get("nodes").unwrap().as_array().unwrap().len(), 4);
    assert_eq!(graph.get("links").unwrap().as_array().unwrap().len(), 3);

    let empty = client
        .call(
            "insert_reroute_nodes",
            json!({
                "source": {"node-id": a_id, "pin": "then"},
                "target": {"node-id": b_id, "pin": "execute"},
                "waypoints": [],
            }),
        )
        .await
        .unwrap();
    assert_eq!(empty.code(), Some(ErrorCode::InvalidParams));

    drop(client);
    daemon.shutdown().await.unwrap();
}
