// src/sensitive_loop/context.rs
// Context composition (spec §4.F step 4): persistent system prompt +
// ephemeral status message (never persisted) + last N history messages.

use crate::energy::EnergySnapshot;
use crate::llm::HistoryMessage;
use crate::store::{BudgetWarning, Conversation};

pub const SYSTEM_PROMPT: &str = "\
You are the cognitive scheduler for a single long-running process. Compute is \
a drainable, replenishable energy reservoir: every action you take costs \
energy, and energy regenerates over time while you sleep. A conversation's \
energy budget is a soft guide, not a hard wall, except when it is exactly \
zero energy remaining for a free-form budget — then it is a hard wall and \
you must respond or end the conversation this turn, nothing else. Use \
`think` sparingly: it costs energy and produces no user-visible output. \
Prefer `respond` when you have enough to say something useful.";

fn warning_label(warning: BudgetWarning) -> &'static str {
    match warning {
        BudgetWarning::Depleted => "depleted",
        BudgetWarning::Exceeded => "exceeded",
        BudgetWarning::Low => "<20% remaining",
        BudgetWarning::Ok => "ok",
    }
}

/// Builds the ephemeral status blurb (never written to conversation history;
/// see `ConversationStore::add_response`, which never stores this string).
pub fn ephemeral_status(
    energy: &EnergySnapshot,
    focus: Option<&Conversation>,
    subagent_summary: &str,
) -> String {
    let mut lines = vec![
        format!("energy: {:.1} ({:?}, {}%)", energy.current, energy.status, energy.percentage),
        format!("subagent: {subagent_summary}"),
    ];

    if let Some(conv) = focus {
        lines.push(format!("focus: {}", conv.request_id));
        let remaining = conv.remaining().map(|r| format!("{r:.1}")).unwrap_or_else(|| "n/a".to_string());
        lines.push(format!(
            "budget: remaining={} status={:?} warning={}",
            remaining,
            conv.budget_status(),
            warning_label(conv.budget_warning())
        ));
        if conv.is_last_chance() {
            lines.push("last chance: you MUST call respond or end_conversation this turn.".to_string());
        }
    } else {
        lines.push("focus: none — no conversation currently needs attention".to_string());
    }

    lines.join("\n")
}

/// The last `history_per_cycle` messages from the conversation, oldest
/// first, including the seeded user message (spec §4.F step 4).
pub fn recent_history(conversation: &Conversation, limit: usize) -> Vec<HistoryMessage> {
    let mut messages: Vec<HistoryMessage> = Vec::new();

    let mut all: Vec<HistoryMessage> = conversation
        .responses
        .iter()
        .map(|r| HistoryMessage {
            role: if r.model_used.is_none() { "user".to_string() } else { "assistant".to_string() },
            content: r.content.clone(),
        })
        .collect();

    if all.is_empty() {
        all.push(HistoryMessage { role: "user".to_string(), content: conversation.input_message.clone() });
    }

    let start = all.len().saturating_sub(limit);
    messages.extend(all.drain(start..));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::energy::EnergyStatus;
    use crate::store::{Conversation, ConversationState};
    use chrono::Utc;

    fn conv() -> Conversation {
        Conversation {
            request_id: "r1".to_string(),
            input_message: "capital of france?".to_string(),
            app_id: Some("chat".to_string()),
            budget: Some(0.0),
            total_energy_consumed: 0.0,
            sleep_cycles: 0,
            model_switches: 0,
            state: ConversationState::Active,
            snooze_until: None,
            ended_reason: None,
            responses: vec![],
            created_at: Utc::now(),
        }
    }

    #[test]
    fn ephemeral_status_flags_last_chance() {
        let snapshot = EnergySnapshot { current: 80.0, percentage: 80, status: EnergyStatus::High, as_of: Utc::now() };
        let status = ephemeral_status(&snapshot, Some(&conv()), "idle");
        assert!(status.contains("last chance"));
    }

    #[test]
    fn history_seeds_from_input_message_when_no_responses_yet() {
        let history = recent_history(&conv(), 10);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].role, "user");
        assert_eq!(history[0].content, "capital of france?");
    }
}
