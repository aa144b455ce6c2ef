// tests/scenario_subagent_backpressure_test.rs
// S6 (spec §8): sub-agent processing drains energy from the same regulator
// the loop uses, and the loop stays responsive to user messages while a
// batch of sub-agent requests works through the queue.

mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use synapse::apps::CHAT_APP_ID;
use synapse::llm::MockLlmProvider;
use synapse::subagent::{Priority, RequestStatus, SubAgentOp};
use tokio::time::sleep;

#[tokio::test]
async fn subagent_drain_lowers_energy_while_loop_stays_responsive() {
    let energy_cfg = common::default_energy_cfg();
    let harness = common::Harness::new(&energy_cfg).await;

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let worker_handle = {
        let subagent = harness.subagent.clone();
        tokio::spawn(async move { subagent.run(shutdown_rx).await })
    };

    let mut request_ids = Vec::new();
    for i in 0..3 {
        let id = harness
            .subagent
            .submit(
                SubAgentOp::AddServer,
                json!({"id": format!("server-{i}"), "transport": "stdio", "args": [], "enabled": true}),
                Priority::Medium,
            )
            .await;
        request_ids.push(id);
    }

    let llm = Arc::new(MockLlmProvider::new());
    let sensitive_loop =
        harness.build_loop(llm, energy_cfg.clone(), common::default_model_cfg(), common::default_loop_cfg());
    let core = harness.core(sensitive_loop.clone());

    let user_request_id =
        core.submit_user_message(CHAT_APP_ID, None, "are you still there?".to_string(), Some(20.0)).await.unwrap();

    let before = harness.regulator.level();

    // Give the sub-agent a head start so it has energy queued up to drain.
    sleep(Duration::from_millis(60)).await;

    let mut responded = false;
    for _ in 0..2 {
        sensitive_loop.run_cycle().await;
        let conversation = core.get_conversation(&user_request_id).await.unwrap().unwrap();
        if conversation.responses.iter().any(|r| r.model_used.is_some()) {
            responded = true;
            break;
        }
    }
    assert!(responded, "the concurrently submitted user message should get a response within 2 cycles");

    for _ in 0..20 {
        let all_terminal = {
            let mut terminal = true;
            for id in &request_ids {
                if let Some(record) = harness.subagent.status(id).await {
                    if !record.status.is_terminal() {
                        terminal = false;
                        break;
                    }
                }
            }
            terminal
        };
        if all_terminal {
            break;
        }
        sensitive_loop.run_cycle().await;
        sleep(Duration::from_millis(20)).await;
    }

    for id in &request_ids {
        let record = harness.subagent.status(id).await.unwrap();
        assert_eq!(record.status, RequestStatus::Completed, "sub-agent request {id} should complete");
    }

    let after = harness.regulator.level();
    assert!(after < before, "regulator energy should have dropped from sub-agent drain and LLM charges");

    shutdown_tx.send(true).ok();
    worker_handle.abort();
}
