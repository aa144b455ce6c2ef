// src/sensitive_loop/cycle.rs
// The cognitive cycle (spec §4.F): drain -> wake -> pick focus -> compose ->
// invoke -> execute -> model-switch -> sleep.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{json, Value};
use tokio::sync::Mutex;
use tokio::time::sleep as tokio_sleep;
use tracing::{debug, info, warn};

use crate::apps::{AppMessage, AppRegistry, CHAT_APP_ID};
use crate::config::{EnergyConfig, LoopConfig, ModelConfig};
use crate::energy::EnergyRegulator;
use crate::events::{Event, EventBus};
use crate::llm::{LlmProvider, LlmRequest};
use crate::stats::Stats;
use crate::store::{AddResponseRequest, ConversationStore};
use crate::subagent::{McpSubAgent, Priority as SubAgentPriority, SubAgentMessage, SubAgentOp};
use crate::tools::{core_tools, CoreToolCall, DispatchTarget, ToolCatalog};

use super::context::{ephemeral_status, recent_history, SYSTEM_PROMPT};
use super::focus::pick_focus;
use super::model_switch;

const TICK_SECONDS: f64 = 1.0;

pub struct SensitiveLoop {
    store: Arc<dyn ConversationStore>,
    apps: Arc<AppRegistry>,
    regulator: Arc<EnergyRegulator>,
    subagent: Arc<McpSubAgent>,
    llm: Arc<dyn LlmProvider>,
    events: Arc<EventBus>,
    stats: Arc<Stats>,
    energy_cfg: EnergyConfig,
    model_cfg: ModelConfig,
    loop_cfg: LoopConfig,
    current_model: Mutex<String>,
    next_focus: Mutex<Option<String>>,
}

impl SensitiveLoop {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn ConversationStore>,
        apps: Arc<AppRegistry>,
        regulator: Arc<EnergyRegulator>,
        subagent: Arc<McpSubAgent>,
        llm: Arc<dyn LlmProvider>,
        events: Arc<EventBus>,
        stats: Arc<Stats>,
        energy_cfg: EnergyConfig,
        model_cfg: ModelConfig,
        loop_cfg: LoopConfig,
    ) -> Self {
        let current_model = model_cfg.large_model.clone();
        Self {
            store,
            apps,
            regulator,
            subagent,
            llm,
            events,
            stats,
            energy_cfg,
            model_cfg,
            loop_cfg,
            current_model: Mutex::new(current_model),
            next_focus: Mutex::new(None),
        }
    }

    pub async fn run(self: Arc<Self>, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let deadline = self.loop_cfg.duration().map(|d| Instant::now() + d);

        loop {
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    info!("[loop] configured duration elapsed, shutting down");
                    return;
                }
            }

            tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("[loop] shutting down cooperatively");
                        return;
                    }
                }
                _ = self.run_cycle() => {}
            }
        }
    }

    /// Admin hook (spec §6 `processConversation`): forces the next cycle to
    /// focus `request_id` regardless of the priority ordering.
    pub async fn force_focus(&self, request_id: String) {
        *self.next_focus.lock().await = Some(request_id);
    }

    /// Runs exactly one cognitive cycle. Never propagates a per-conversation
    /// error out of the loop (spec §7 propagation policy); everything short
    /// of a regulator/scheduler panic is caught and logged.
    pub async fn run_cycle(&self) {
        self.drain_subagent().await;

        if let Err(e) = self.wake_due_conversations().await {
            warn!("[loop] wake_if_due failed: {}", e);
        }

        let active = match self.store.list_active().await {
            Ok(active) => active,
            Err(e) => {
                warn!("[loop] list_active failed: {}", e);
                return;
            }
        };

        let forced_id = self.next_focus.lock().await.take();
        let focus = forced_id
            .as_deref()
            .and_then(|id| active.iter().find(|c| c.request_id == id))
            .or_else(|| pick_focus(&active));

        let Some(focus) = focus else {
            if self.regulator.level() < self.regulator.e_max() {
                self.recover_sleep(None, None).await;
            }
            return;
        };
        let focus = focus.clone();

        self.run_focused_cycle(focus).await;
    }

    async fn drain_subagent(&self) {
        let delta = self.subagent.energy_consumed_since_last_poll();
        if delta > 0.0 {
            self.regulator.consume(delta);
            self.publish_energy_update();
        }

        for message in self.subagent.poll_messages().await {
            match &message {
                SubAgentMessage::StatusUpdate { request_id, progress, message } => {
                    debug!("[subagent] {} {}% {}", request_id, progress, message);
                }
                SubAgentMessage::Completion { request_id, .. } => {
                    info!("[subagent] {} completed", request_id);
                }
                SubAgentMessage::Error { request_id, error } => {
                    warn!("[subagent] {} failed: {}", request_id, error);
                }
            }
        }
    }

    async fn wake_due_conversations(&self) -> crate::error::Result<()> {
        let now = chrono::Utc::now();
        let woken = self.store.wake_if_due(now).await?;
        for id in woken {
            self.events.publish(Event::ConversationStateChanged {
                request_id: id,
                old: "snoozed".to_string(),
                new: "active".to_string(),
                reason: Some("snooze elapsed".to_string()),
                snooze_until: None,
            });
        }
        Ok(())
    }

    async fn run_focused_cycle(&self, focus: crate::store::Conversation) {
        let subagent_summary = format!("queue_depth={}", self.subagent.queue_depth().await);
        let snapshot = self.regulator.snapshot();
        let status_text = ephemeral_status(&snapshot, Some(&focus), &subagent_summary);
        let history = recent_history(&focus, self.loop_cfg.history_per_cycle);
        let current_model = self.current_model.lock().await.clone();

        let exposed_tools = self.subagent.list_exposed_tools().await;
        let catalog = ToolCatalog::new(exposed_tools.clone());

        let request = LlmRequest {
            system_prompt: SYSTEM_PROMPT.to_string(),
            ephemeral_status: status_text,
            history,
            model: current_model.clone(),
            tools: catalog.all_descriptors(),
        };

        let started = Instant::now();
        let response = match self.llm.invoke(request).await {
            Ok(r) => r,
            Err(e) => {
                warn!("[loop] llm invocation failed for {}: {}", focus.request_id, e);
                tokio_sleep(Duration::from_millis(200)).await;
                return;
            }
        };
        let duration_s = started.elapsed().as_secs_f64();

        let charge = self.model_cfg.charge_for(&current_model, duration_s);
        self.regulator.consume(charge);
        self.publish_energy_update();

        if let Err(e) = self
            .store
            .add_response(AddResponseRequest {
                request_id: focus.request_id.clone(),
                energy_level: self.regulator.level(),
                energy_charge: charge,
                ..Default::default()
            })
            .await
        {
            warn!("[loop] failed to record energy charge: {}", e);
        }

        if let Some(app_id) = &focus.app_id {
            let _ = self
                .apps
                .record_energy(app_id, charge, Some(focus.request_id.clone()), Some("invoke".to_string()))
                .await;
        }

        let mut tool_call = response.tool_call.clone();

        // Zero-budget rule (spec §4.F, §8): the focused conversation MUST get
        // exactly one `respond` or `end_conversation` this cycle.
        if focus.is_last_chance() {
            let complies = matches!(
                tool_call.as_ref().map(|t| t.name.as_str()),
                Some(core_tools::RESPOND) | Some(core_tools::END_CONVERSATION)
            );
            if !complies {
                warn!(
                    "[loop] {} is a last-chance conversation; forcing respond (model emitted {:?})",
                    focus.request_id,
                    tool_call.as_ref().map(|t| t.name.clone())
                );
                let text = response.text.clone().unwrap_or_else(|| "(no further budget remains)".to_string());
                tool_call = Some(crate::llm::ToolCall {
                    name: core_tools::RESPOND.to_string(),
                    arguments: json!({"requestId": focus.request_id, "content": text}),
                });
            }
        }

        if let Some(tool_call) = tool_call {
            self.execute_tool_call(&focus, &tool_call.name, tool_call.arguments, &exposed_tools, charge).await;
        }

        self.apply_model_switch(&focus).await;
    }

    async fn execute_tool_call(
        &self,
        focus: &crate::store::Conversation,
        name: &str,
        arguments: Value,
        exposed: &[crate::subagent::ExposedMcpTool],
        charge: f64,
    ) {
        let started = Instant::now();
        let resolved = crate::tools::resolve(name, arguments.clone(), exposed);

        let (result, error) = match resolved {
            Err(decode_error) => (None, Some(decode_error)),
            Ok(DispatchTarget::Core(call)) => self.execute_core_tool(focus, call, charge).await,
            Ok(DispatchTarget::Mcp { server_id, original_name, arguments }) => {
                self.execute_mcp_tool(focus, &server_id, &original_name, arguments).await
            }
        };

        self.events.publish(Event::ToolInvocation {
            conversation_id: focus.request_id.clone(),
            tool_name: name.to_string(),
            arguments,
            result,
            error,
            duration_s: started.elapsed().as_secs_f64(),
        });
    }

    async fn execute_core_tool(
        &self,
        focus: &crate::store::Conversation,
        call: CoreToolCall,
        charge: f64,
    ) -> (Option<Value>, Option<String>) {
        match call {
            CoreToolCall::Respond(args) => {
                let app_id = focus.app_id.clone().unwrap_or_else(|| CHAT_APP_ID.to_string());
                let model_used = self.current_model.lock().await.clone();
                let msg = AppMessage {
                    from: "loop".to_string(),
                    to: app_id,
                    content: json!({
                        "requestId": args.request_id,
                        "response": args.content,
                        "energyLevel": self.regulator.level(),
                        "modelUsed": model_used,
                        "energyConsumed": charge,
                    }),
                };
                match self.apps.route_message(msg).await {
                    Ok(()) => {
                        self.events.publish(Event::MessageAdded {
                            request_id: args.request_id,
                            role: "assistant".to_string(),
                            content: args.content,
                            energy_level: self.regulator.level(),
                            model_used: Some(model_used),
                        });
                        (Some(json!({"ok": true})), None)
                    }
                    Err(e) => (None, Some(e.to_string())),
                }
            }
            CoreToolCall::Think(args) => {
                debug!("[loop] {} thinks: {}", focus.request_id, args.text);
                (Some(json!({"ok": true})), None)
            }
            CoreToolCall::SelectConversation(args) => {
                *self.next_focus.lock().await = Some(args.request_id.clone());
                (Some(json!({"focus": args.request_id})), None)
            }
            CoreToolCall::AwaitEnergy(args) => {
                self.recover_sleep(Some(args.min_level), Some(&focus.request_id)).await;
                (Some(json!({"ok": true})), None)
            }
            CoreToolCall::EndConversation(args) => match self.store.end_conversation(&args.request_id, &args.reason).await {
                Ok(()) => {
                    self.events.publish(Event::ConversationStateChanged {
                        request_id: args.request_id,
                        old: "active".to_string(),
                        new: "ended".to_string(),
                        reason: Some(args.reason),
                        snooze_until: None,
                    });
                    (Some(json!({"ok": true})), None)
                }
                Err(e) => (None, Some(e.to_string())),
            },
            CoreToolCall::SnoozeConversation(args) => {
                let wake_at = chrono::Utc::now() + chrono::Duration::seconds((args.minutes * 60.0) as i64);
                match self.store.snooze_conversation(&args.request_id, wake_at).await {
                    Ok(()) => {
                        self.events.publish(Event::ConversationStateChanged {
                            request_id: args.request_id,
                            old: "active".to_string(),
                            new: "snoozed".to_string(),
                            reason: Some(args.reason),
                            snooze_until: Some(wake_at),
                        });
                        (Some(json!({"wakeAt": wake_at})), None)
                    }
                    Err(e) => (None, Some(e.to_string())),
                }
            }
            CoreToolCall::McpAddServer(params) => {
                let id = self.subagent.submit(SubAgentOp::AddServer, params, SubAgentPriority::Medium).await;
                (Some(json!({"requestId": id})), None)
            }
            CoreToolCall::McpListServers => {
                let id = self.subagent.submit(SubAgentOp::ListServers, json!({}), SubAgentPriority::Low).await;
                (Some(json!({"requestId": id})), None)
            }
        }
    }

    async fn execute_mcp_tool(
        &self,
        focus: &crate::store::Conversation,
        server_id: &str,
        original_name: &str,
        arguments: Value,
    ) -> (Option<Value>, Option<String>) {
        let started = Instant::now();
        let outcome = self.subagent.call_tool(server_id, original_name, arguments).await;
        let duration_s = started.elapsed().as_secs_f64();

        let charge = self.model_cfg.tool_charge_for(duration_s);
        self.regulator.consume(charge);
        self.publish_energy_update();

        if let Err(e) = self
            .store
            .add_response(AddResponseRequest {
                request_id: focus.request_id.clone(),
                energy_level: self.regulator.level(),
                energy_charge: charge,
                ..Default::default()
            })
            .await
        {
            warn!("[loop] failed to record mcp tool energy charge: {}", e);
        }

        if let Some(app_id) = &focus.app_id {
            let _ = self
                .apps
                .record_energy(app_id, charge, Some(focus.request_id.clone()), Some(format!("tool:{original_name}")))
                .await;
        }

        match outcome {
            Ok(value) => (Some(value), None),
            Err(e) => (None, Some(e.to_string())),
        }
    }

    async fn apply_model_switch(&self, focus: &crate::store::Conversation) {
        let mut current = self.current_model.lock().await;
        if let Some(switch) = model_switch::decide(&current, self.regulator.level(), &self.energy_cfg, &self.model_cfg) {
            info!("[loop] model switch {} -> {} ({})", switch.from, switch.to, switch.reason);
            *current = switch.to.clone();
            drop(current);

            self.stats.record_model_switch();
            if let Err(e) = self.store.increment_model_switches(&focus.request_id).await {
                warn!("[loop] failed to record model switch counter: {}", e);
            }
            self.events.publish(Event::ModelSwitched {
                request_id: focus.request_id.clone(),
                from: switch.from,
                to: switch.to,
                reason: switch.reason.to_string(),
                energy_level: self.regulator.level(),
            });
        }
    }

    /// Voluntary or idle-recovery sleep (spec §4.F step 8). `target` is the
    /// `await_energy` minimum when driven by that tool, or `None` for the
    /// idle recovery path (which targets `E_max`). `focus_id` is the
    /// conversation that requested the sleep, if any, so its per-conversation
    /// counter can be bumped alongside the process-wide one.
    async fn recover_sleep(&self, target: Option<f64>, focus_id: Option<&str>) {
        let target_level = target.unwrap_or_else(|| self.regulator.e_max());
        let duration_s =
            self.regulator.recovery_sleep_seconds(target_level, self.energy_cfg.sleep_min_s as f64, self.energy_cfg.sleep_max_s as f64);

        self.events.publish(Event::SleepStart { request_id: focus_id.map(str::to_string) });
        let before = self.regulator.level();

        let mut elapsed = 0.0;
        while elapsed < duration_s {
            if self.regulator.level() >= target_level {
                break;
            }
            let tick = TICK_SECONDS.min(duration_s - elapsed);
            tokio_sleep(Duration::from_secs_f64(tick)).await;
            self.regulator.replenish(tick);
            self.drain_subagent().await;
            elapsed += tick;
        }

        let restored = self.regulator.level() - before;
        self.stats.record_sleep_cycle();
        if let Some(id) = focus_id {
            if let Err(e) = self.store.increment_sleep_cycles(id).await {
                warn!("[loop] failed to record sleep cycle counter for {}: {}", id, e);
            }
        }
        self.events.publish(Event::SleepEnd {
            duration_s: elapsed,
            energy_restored: restored,
            new_energy_level: self.regulator.level(),
        });
    }

    fn publish_energy_update(&self) {
        let snapshot = self.regulator.snapshot();
        self.events.publish(Event::EnergyUpdate {
            current: snapshot.current,
            percentage: snapshot.percentage,
            status: snapshot.status.as_str().to_string(),
        });
    }
}
