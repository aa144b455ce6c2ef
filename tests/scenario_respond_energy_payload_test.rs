// Regression test: the `respond` tool's outbound `AppMessage` must carry the
// cycle's real energy charge (spec §4.F step 6
// `content:{response, energyLevel, modelUsed, energyConsumed:charge}`), not a
// hardcoded placeholder.

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use synapse::apps::{App, AppConfig, AppMessage, AppType};
use synapse::error::Result;
use synapse::llm::{LlmProvider, LlmRequest, LlmResponse, MockLlmProvider};

struct DelayedMock {
    inner: MockLlmProvider,
    delay: Duration,
}

#[async_trait]
impl LlmProvider for DelayedMock {
    async fn invoke(&self, request: LlmRequest) -> Result<LlmResponse> {
        tokio::time::sleep(self.delay).await;
        self.inner.invoke(request).await
    }
}

/// Captures the raw payload routed to it instead of persisting anything, so
/// the test can inspect exactly what the loop sent.
struct RecordingApp {
    app_id: String,
    last: Mutex<Option<Value>>,
}

#[async_trait]
impl App for RecordingApp {
    fn app_id(&self) -> &str {
        &self.app_id
    }

    async fn receive_message(&self, msg: AppMessage) -> Result<()> {
        *self.last.lock().await = Some(msg.content);
        Ok(())
    }
}

#[tokio::test]
async fn respond_payload_carries_the_real_energy_charge() {
    let energy_cfg = common::default_energy_cfg();
    let harness = common::Harness::new(&energy_cfg).await;

    let app_id = "recorder";
    harness
        .apps
        .install(AppConfig {
            app_id: app_id.to_string(),
            app_type: AppType::InProcess,
            enabled: true,
            endpoint: None,
            hourly_energy_budget: None,
            daily_energy_budget: None,
        })
        .await
        .unwrap();

    let recorder = Arc::new(RecordingApp { app_id: app_id.to_string(), last: Mutex::new(None) });
    harness.apps.register_app(recorder.clone()).await.unwrap();

    let llm: Arc<dyn LlmProvider> =
        Arc::new(DelayedMock { inner: MockLlmProvider::new(), delay: Duration::from_millis(40) });
    let sensitive_loop =
        harness.build_loop(llm, energy_cfg.clone(), common::default_model_cfg(), common::default_loop_cfg());
    let core = harness.core(sensitive_loop.clone());

    let request_id = core.submit_user_message(app_id, None, "hello".to_string(), Some(5.0)).await.unwrap();

    for _ in 0..3 {
        sensitive_loop.run_cycle().await;
        if recorder.last.lock().await.is_some() {
            break;
        }
    }

    let payload = recorder.last.lock().await.clone().expect("respond payload was never routed");
    let reported_charge = payload["energyConsumed"].as_f64().expect("energyConsumed must be a number");
    assert!(reported_charge > 0.0, "a delayed invocation must produce a nonzero charge");

    let conversation = core.get_conversation(&request_id).await.unwrap().unwrap();
    assert!(
        (reported_charge - conversation.total_energy_consumed).abs() < 1e-6,
        "payload energyConsumed ({reported_charge}) must match the conversation's recorded charge ({})",
        conversation.total_energy_consumed
    );
}
