use crate::core::assistant::ResultEnvelope;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;

/// Number of exchanges kept per session.
pub const CONVERSATION_CAPACITY: usize = 10;

#[derive(Debug, Clone, Serialize)]
pub struct ConversationEntry {
    pub timestamp: DateTime<Utc>,
    pub query: String,
    pub response: ResultEnvelope,
}

/// Bounded, most-recent-first history of query/response pairs.
#[derive(Debug, Clone)]
pub struct ConversationLog {
    entries: VecDeque<ConversationEntry>,
    capacity: usize,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::with_capacity(CONVERSATION_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn record(&mut self, query: impl Into<String>, response: ResultEnvelope) {
        self.entries.push_front(ConversationEntry {
            timestamp: Utc::now(),
            query: query.into(),
            response,
        });
        self.entries.truncate(self.capacity);
    }

    pub fn recent(&self, k: usize) -> Vec<ConversationEntry> {
        self.entries.iter().take(k).cloned().collect()
    }

    pub fn latest(&self) -> Option<&ConversationEntry> {
        self.entries.front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ConversationLog {
    fn default() -> Self {
        Self::new()
    }
}
