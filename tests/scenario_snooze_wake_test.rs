// tests/scenario_snooze_wake_test.rs
// S4 (spec §8): a snoozed conversation wakes once its `snoozeUntil` elapses
// and gets a response on the cycle that notices.

mod common;

use std::sync::Arc;

use serde_json::json;
use synapse::apps::CHAT_APP_ID;
use synapse::events::Event;
use synapse::llm::{LlmResponse, ScriptedLlmProvider, ToolCall};
use synapse::store::ConversationState;

#[tokio::test]
async fn snoozed_conversation_wakes_and_responds() {
    let energy_cfg = common::default_energy_cfg();
    let harness = common::Harness::new(&energy_cfg).await;

    // Submit the conversation before building the provider so the script can
    // reference its real requestId.
    let model_cfg = common::default_model_cfg();
    let loop_cfg = common::default_loop_cfg();

    // A throwaway loop with no provider isn't needed: SensitiveLoop only
    // needs the llm at construction, and submit_user_message goes through
    // Core, which doesn't touch the llm at all. Build Core first against any
    // loop instance sharing the harness's store.
    let bootstrap_llm = Arc::new(synapse::llm::MockLlmProvider::new());
    let bootstrap_loop = harness.build_loop(bootstrap_llm, energy_cfg.clone(), model_cfg.clone(), loop_cfg.clone());
    let bootstrap_core = harness.core(bootstrap_loop);

    let request_id = bootstrap_core
        .submit_user_message(CHAT_APP_ID, None, "check back later".to_string(), Some(50.0))
        .await
        .unwrap();

    let llm = Arc::new(ScriptedLlmProvider::new(vec![
        LlmResponse {
            text: Some("stepping away".to_string()),
            tool_call: Some(ToolCall {
                name: "snooze_conversation".to_string(),
                arguments: json!({"requestId": request_id, "minutes": 60.0, "reason": "waiting on input"}),
            }),
        },
        LlmResponse {
            text: Some("back with an answer".to_string()),
            tool_call: Some(ToolCall {
                name: "respond".to_string(),
                arguments: json!({"requestId": request_id, "content": "back with an answer"}),
            }),
        },
    ]));
    let sensitive_loop = harness.build_loop(llm, energy_cfg, model_cfg, loop_cfg);
    let core = harness.core(sensitive_loop.clone());

    sensitive_loop.run_cycle().await;
    let snoozed = core.get_conversation(&request_id).await.unwrap().unwrap();
    assert_eq!(snoozed.state, ConversationState::Snoozed);

    // Simulate the wall-clock elapsing by moving the stored wake-at into the
    // past directly, rather than actually sleeping 60 real seconds.
    let in_the_past = chrono::Utc::now() - chrono::Duration::seconds(5);
    harness.store.snooze_conversation(&request_id, in_the_past).await.unwrap();

    sensitive_loop.run_cycle().await;

    let woken = core.get_conversation(&request_id).await.unwrap().unwrap();
    assert_eq!(woken.state, ConversationState::Active);
    assert!(woken.responses.iter().any(|r| r.model_used.is_some()));

    let recent = harness.events.recent(50);
    assert!(
        recent
            .iter()
            .any(|e| matches!(&e.event, Event::ConversationStateChanged { new, .. } if new == "active")),
        "expected a conversation_state_changed event for the wake"
    );
}
