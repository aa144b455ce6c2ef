// src/subagent/queue.rs
// Single-producer (loop) / single-consumer (sub-agent) priority queue
// (spec §4.D, §5): `high > medium > low`; FIFO within a priority level.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use tokio::sync::Mutex;

use super::types::{Priority, SubAgentRequest};

struct QueueEntry {
    request: SubAgentRequest,
    sequence: u64,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.request.priority == other.request.priority && self.sequence == other.sequence
    }
}
impl Eq for QueueEntry {}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap: higher priority first, then lower
        // sequence number (earlier enqueue) first within the same priority.
        self.request
            .priority
            .cmp(&other.request.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}
impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Default)]
pub struct RequestQueue {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    heap: BinaryHeap<QueueEntry>,
    next_sequence: u64,
    cancelled: std::collections::HashSet<String>,
}

impl RequestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push(&self, request: SubAgentRequest) {
        let mut inner = self.inner.lock().await;
        let sequence = inner.next_sequence;
        inner.next_sequence += 1;
        inner.heap.push(QueueEntry { request, sequence });
    }

    /// Pops the highest-priority, oldest-enqueued request that has not been
    /// cancelled while queued (spec §4.D `cancel` is legal only in `queued`).
    pub async fn pop(&self) -> Option<SubAgentRequest> {
        let mut inner = self.inner.lock().await;
        loop {
            let entry = inner.heap.pop()?;
            if inner.cancelled.remove(&entry.request.id) {
                continue;
            }
            return Some(entry.request);
        }
    }

    /// Returns true if `id` was queued (and so successfully cancelled).
    /// Cancellation of an in-flight request is someone else's concern
    /// (`Priority` semantics can't see it); the worker checks run-time state.
    pub async fn cancel_if_queued(&self, id: &str) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.heap.iter().any(|e| e.request.id == id) {
            inner.cancelled.insert(id.to_string());
            true
        } else {
            false
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.heap.len()
    }
}
