// tests/scenario_mcp_namespacing_test.rs
// S5 (spec §8): two mock-mode MCP servers exposing a same-named tool are
// namespaced distinctly so the loop never confuses them.

mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use synapse::subagent::{Priority, RequestStatus, SubAgentOp};
use tokio::time::sleep;

#[tokio::test]
async fn same_named_tools_from_different_servers_stay_distinct() {
    let energy_cfg = common::default_energy_cfg();
    let harness = common::Harness::new(&energy_cfg).await;

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let worker_handle = {
        let subagent = harness.subagent.clone();
        tokio::spawn(async move { subagent.run(shutdown_rx).await })
    };

    for server_id in ["fs-local", "fs-remote"] {
        let request_id = harness
            .subagent
            .submit(
                SubAgentOp::AddServer,
                json!({"id": server_id, "transport": "stdio", "args": [], "enabled": true}),
                Priority::High,
            )
            .await;

        let mut completed = false;
        for _ in 0..100 {
            if let Some(record) = harness.subagent.status(&request_id).await {
                if record.status == RequestStatus::Completed {
                    completed = true;
                    break;
                }
                if record.status == RequestStatus::Failed {
                    panic!("add_server for {server_id} failed: {:?}", record.error);
                }
            }
            sleep(Duration::from_millis(10)).await;
        }
        assert!(completed, "add_server for {server_id} did not complete in time");
    }

    shutdown_tx.send(true).ok();
    worker_handle.abort();

    let tools = harness.subagent.list_exposed_tools().await;
    let local = tools.iter().find(|t| t.exposed_name == "fs-local_read_file");
    let remote = tools.iter().find(|t| t.exposed_name == "fs-remote_read_file");

    let local = local.expect("fs-local_read_file should be exposed");
    let remote = remote.expect("fs-remote_read_file should be exposed");

    assert_eq!(local.server_id, "fs-local");
    assert_eq!(remote.server_id, "fs-remote");
    assert_eq!(local.original_name, "read_file");
    assert_eq!(remote.original_name, "read_file");
    assert_ne!(local.exposed_name, remote.exposed_name);
}
