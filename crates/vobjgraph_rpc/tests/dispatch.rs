use serde_json::{json, Value};
use std::time::Duration;
use uuid::Uuid;
use vobjgraph_rpc::{
    run_with_deadline, RpcConfig, RpcDispatcher, RpcEnvelope, RpcError, RpcRequest, StoreHandle,
};

fn dispatcher() -> RpcDispatcher {
    RpcDispatcher::new(StoreHandle::open_in_memory().unwrap(), RpcConfig::default())
}

async fn call_ok(dispatcher: &RpcDispatcher, request: RpcRequest) -> Value {
    let correlation_id = Uuid::new_v4().to_string();
    let response = dispatcher
        .call(RpcEnvelope::new(correlation_id.clone(), request))
        .await;
    assert_eq!(response.correlation_id, correlation_id);
    assert!(response.ok, "{:?}", response.error);
    assert!(!response.timed_out);
    response.result
}

async fn create(dispatcher: &RpcDispatcher, name: &str) -> Uuid {
    let result = call_ok(
        dispatcher,
        RpcRequest::CreateRealObject {
            name: name.to_string(),
            record: None,
        },
    )
    .await;
    serde_json::from_value(result["real_id"].clone()).unwrap()
}

#[tokio::test]
async fn reference_count_scenario_over_rpc() {
    let dispatcher = dispatcher();
    let jan = create(&dispatcher, "Jan").await;

    let loaded = call_ok(&dispatcher, RpcRequest::LoadRealObject { real_id: jan }).await;
    assert_eq!(loaded["meta"]["name"], "Jan");
    assert_eq!(loaded["meta"]["ref_count"], 0);

    let linked = call_ok(&dispatcher, RpcRequest::CopyVirtualObject { real_id: jan }).await;
    assert_eq!(linked["ref_count"], 1);

    let unlinked = call_ok(&dispatcher, RpcRequest::DeleteVirtualObject { real_id: jan }).await;
    assert_eq!(unlinked["ref_count"], 0);

    let unreferenced = call_ok(&dispatcher, RpcRequest::GetUnreferencedRealObjects).await;
    assert_eq!(unreferenced, json!([jan]));
}

#[tokio::test]
async fn save_then_rescan_and_delete() {
    let dispatcher = dispatcher();
    let target = create(&dispatcher, "target").await;
    let source = create(&dispatcher, "source").await;

    let mut object: vobjgraph_core::RealObject = serde_json::from_value(
        call_ok(&dispatcher, RpcRequest::LoadRealObject { real_id: source }).await,
    )
    .unwrap();
    object.records[0] = vobjgraph_core::Record::new(format!(
        "<document>\n<link id=\"{target}_0\">target</link>\n</document>\n"
    ));
    call_ok(
        &dispatcher,
        RpcRequest::SaveRealObject {
            real_id: source,
            object,
        },
    )
    .await;

    let report = call_ok(&dispatcher, RpcRequest::RescanFilesystem).await;
    assert_eq!(report["scanned"], 2);
    assert_eq!(report["repairs"].as_array().unwrap().len(), 1);

    let graph = call_ok(
        &dispatcher,
        RpcRequest::BuildReferenceGraph {
            real_id: source,
            max_nodes: None,
        },
    )
    .await;
    assert_eq!(graph["nodes"].as_array().unwrap().len(), 2);
    assert_eq!(graph["edges"].as_array().unwrap().len(), 1);

    call_ok(
        &dispatcher,
        RpcRequest::PhysicalDeleteRealObject { real_id: source },
    )
    .await;
    let rescanned = call_ok(&dispatcher, RpcRequest::RescanFilesystem).await;
    assert_eq!(rescanned["scanned"], 1);
}

#[tokio::test]
async fn copy_real_object_returns_clone_map() {
    let dispatcher = dispatcher();
    let root = create(&dispatcher, "root").await;

    let outcome = call_ok(
        &dispatcher,
        RpcRequest::CopyRealObject {
            real_id: root,
            max_nodes: Some(8),
        },
    )
    .await;

    let new_root = outcome["new_root_id"].as_str().unwrap();
    assert_ne!(new_root, root.to_string());
    assert_eq!(outcome["clone_map"][root.to_string()], new_root);
    assert_eq!(outcome["truncated"], false);
}

#[tokio::test]
async fn missing_object_is_an_error_not_a_timeout() {
    let dispatcher = dispatcher();
    let response = dispatcher
        .call(RpcEnvelope::new(
            "missing",
            RpcRequest::LoadRealObject {
                real_id: Uuid::new_v4(),
            },
        ))
        .await;

    assert!(!response.ok);
    assert!(!response.timed_out);
    assert_eq!(response.result, Value::Null);
    assert_eq!(response.error.unwrap().code, "not_found");
}

#[tokio::test]
async fn deadline_yields_soft_failure() {
    let response = run_with_deadline(
        "slow-call",
        "rescan-filesystem",
        Duration::from_millis(20),
        std::future::pending::<Result<Value, RpcError>>(),
    )
    .await;

    assert_eq!(response.correlation_id, "slow-call");
    assert!(!response.ok);
    assert!(response.timed_out);
    assert_eq!(response.result, Value::Null);
    assert!(response.error.is_none());
}

#[tokio::test]
async fn json_surface_reports_unknown_methods() {
    let dispatcher = dispatcher();
    let raw = json!({
        "correlation_id": "c-9",
        "request": { "method": "defragment" }
    })
    .to_string();

    let response: Value = serde_json::from_str(&dispatcher.call_json(&raw).await).unwrap();

    assert_eq!(response["correlation_id"], "c-9");
    assert_eq!(response["ok"], false);
    assert_eq!(response["error"]["code"], "unknown_method");
}

#[tokio::test]
async fn json_surface_round_trips_a_call() {
    let dispatcher = dispatcher();
    let raw = json!({
        "correlation_id": "c-10",
        "request": {
            "method": "create-real-object",
            "params": { "name": "from json" }
        }
    })
    .to_string();

    let response: Value = serde_json::from_str(&dispatcher.call_json(&raw).await).unwrap();

    assert_eq!(response["ok"], true);
    assert!(response["result"]["real_id"].is_string());
}

#[tokio::test]
async fn closed_handle_rejects_calls() {
    let handle = StoreHandle::open_in_memory().unwrap();
    let dispatcher = RpcDispatcher::new(handle.clone(), RpcConfig::default());
    handle.close().await.unwrap();
    handle.close().await.unwrap();
    assert!(!handle.is_open());

    let response = dispatcher
        .call(RpcEnvelope::new("late", RpcRequest::RescanFilesystem))
        .await;
    assert_eq!(response.error.unwrap().code, "closed");
}

#[tokio::test]
async fn file_store_persists_between_dispatchers() {
    let dir = tempfile::tempdir().unwrap();
    let config = RpcConfig {
        db_path: dir.path().join("graph.db"),
        ..RpcConfig::default()
    };

    let first = RpcDispatcher::open(config.clone()).unwrap();
    let id = create(&first, "durable").await;
    first.handle().close().await.unwrap();

    let second = RpcDispatcher::open(config).unwrap();
    let loaded = call_ok(&second, RpcRequest::LoadRealObject { real_id: id }).await;
    assert_eq!(loaded["meta"]["name"], "durable");
}
