// src/sensitive_loop/focus.rs
// Focus selection (spec §4.F step 3): priority order among active
// conversations, ties broken by oldest pending response.

use chrono::{DateTime, Utc};

use crate::store::{BudgetStatus, Conversation};

fn pending_since(conversation: &Conversation) -> DateTime<Utc> {
    conversation
        .responses
        .last()
        .map(|r| r.timestamp)
        .unwrap_or(conversation.created_at)
}

/// Rank used to sort conversations into the spec's priority order:
/// 1. `budget == 0` (last chance)
/// 2. `budget > 0 && remaining > 0`, highest `remaining` first
/// 3. `budget == null`
/// 4. `exceeded`, last
fn rank(conversation: &Conversation) -> (u8, std::cmp::Reverse<i64>) {
    let remaining_millis = conversation.remaining().map(|r| (r * 1000.0).round() as i64).unwrap_or(0);

    let tier = if conversation.is_last_chance() {
        0
    } else {
        match conversation.budget_status() {
            Some(BudgetStatus::Within) => 1,
            None => 2,
            Some(BudgetStatus::Exceeded) => 3,
            Some(BudgetStatus::Depleted) => 0,
        }
    };

    // Within tier 1, higher remaining sorts first -> Reverse so ascending
    // sort puts the largest remaining first.
    (tier, std::cmp::Reverse(remaining_millis))
}

/// Picks the conversation the next cycle should focus on, or `None` if
/// nothing among `active` needs attention.
pub fn pick_focus(active: &[Conversation]) -> Option<&Conversation> {
    active.iter().min_by(|a, b| {
        rank(a)
            .cmp(&rank(b))
            .then_with(|| pending_since(a).cmp(&pending_since(b)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ConversationState;

    fn conv(id: &str, budget: Option<f64>, consumed: f64, created_secs_ago: i64) -> Conversation {
        Conversation {
            request_id: id.to_string(),
            input_message: "hi".to_string(),
            app_id: Some("chat".to_string()),
            budget,
            total_energy_consumed: consumed,
            sleep_cycles: 0,
            model_switches: 0,
            state: ConversationState::Active,
            snooze_until: None,
            ended_reason: None,
            responses: vec![],
            created_at: Utc::now() - chrono::Duration::seconds(created_secs_ago),
        }
    }

    #[test]
    fn zero_budget_wins_over_everything() {
        let convs = vec![
            conv("a", Some(10.0), 1.0, 100),
            conv("b", Some(0.0), 0.0, 1),
            conv("c", None, 0.0, 200),
        ];
        assert_eq!(pick_focus(&convs).unwrap().request_id, "b");
    }

    #[test]
    fn within_budget_highest_remaining_first() {
        let convs = vec![
            conv("a", Some(10.0), 8.0, 100),
            conv("b", Some(10.0), 2.0, 50),
        ];
        assert_eq!(pick_focus(&convs).unwrap().request_id, "b");
    }

    #[test]
    fn null_budget_before_exceeded() {
        let convs = vec![
            conv("a", Some(5.0), 6.0, 100),
            conv("b", None, 0.0, 100),
        ];
        assert_eq!(pick_focus(&convs).unwrap().request_id, "b");
    }

    #[test]
    fn ties_broken_by_oldest_pending() {
        let convs = vec![
            conv("a", None, 0.0, 10),
            conv("b", None, 0.0, 500),
        ];
        assert_eq!(pick_focus(&convs).unwrap().request_id, "b");
    }
}
