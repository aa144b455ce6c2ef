// src/events/mod.rs
// Outbound event bus (spec §6 "Outbound events", §9 "replace ambient global
// event bridge with an injected value").
//
// A `tokio::sync::broadcast` channel for live subscribers (e.g. a WebSocket
// bridge, out of scope here) plus a bounded in-memory history ring so a late
// subscriber (or a test) can inspect recent events without racing the
// broadcast channel's lagging-receiver semantics.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 1024;
const HISTORY_CAPACITY: usize = 500;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    EnergyUpdate { current: f64, percentage: u8, status: String },
    ConversationCreated { request_id: String, app_id: Option<String> },
    MessageAdded { request_id: String, role: String, content: String, energy_level: f64, model_used: Option<String> },
    ConversationStateChanged { request_id: String, old: String, new: String, reason: Option<String>, snooze_until: Option<DateTime<Utc>> },
    ModelSwitched { request_id: String, from: String, to: String, reason: String, energy_level: f64 },
    SleepStart { request_id: Option<String> },
    SleepEnd { duration_s: f64, energy_restored: f64, new_energy_level: f64 },
    ToolInvocation { conversation_id: String, tool_name: String, arguments: Value, result: Option<Value>, error: Option<String>, duration_s: f64 },
    SystemStats { total_conversations: u64, total_responses: u64, current_energy: f64 },
}

/// Envelope with an ISO-8601 timestamp (spec §6: "Event payloads include
/// ISO-8601 timestamps").
#[derive(Debug, Clone, Serialize)]
pub struct EventEnvelope {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: Event,
}

pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
    history: Mutex<VecDeque<EventEnvelope>>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender, history: Mutex::new(VecDeque::with_capacity(HISTORY_CAPACITY)) }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: Event) {
        let envelope = EventEnvelope { timestamp: Utc::now(), event };

        {
            let mut history = self.history.lock().unwrap();
            if history.len() == HISTORY_CAPACITY {
                history.pop_front();
            }
            history.push_back(envelope.clone());
        }

        // No active subscribers is normal (e.g. no edge attached yet).
        let _ = self.sender.send(envelope);
    }

    pub fn recent(&self, n: usize) -> Vec<EventEnvelope> {
        let history = self.history.lock().unwrap();
        history.iter().rev().take(n).cloned().collect()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recent_returns_newest_first_and_respects_capacity() {
        let bus = EventBus::new();
        for i in 0..5 {
            bus.publish(Event::SleepStart { request_id: Some(format!("r{i}")) });
        }
        let recent = bus.recent(2);
        assert_eq!(recent.len(), 2);
        match &recent[0].event {
            Event::SleepStart { request_id } => assert_eq!(request_id.as_deref(), Some("r4")),
            _ => panic!("unexpected event"),
        }
    }

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.publish(Event::SleepEnd { duration_s: 1.0, energy_restored: 10.0, new_energy_level: 60.0 });
        let received = rx.recv().await.unwrap();
        assert!(matches!(received.event, Event::SleepEnd { .. }));
    }
}
