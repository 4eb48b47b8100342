//! Session-scoped history buffer.
//!
//! Every outbound message and every inbound reply (fallback apologies included)
//! is recorded here with its role, so replay never has to guess a sender from
//! its position.

use crate::state::{ChatRole, LogEntry};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryBuffer {
    entries: Vec<LogEntry>,
}

impl HistoryBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.entries.push(LogEntry::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.entries.push(LogEntry::assistant(content));
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Role of the most recent entry, if any
    pub fn last_role(&self) -> Option<ChatRole> {
        self.entries.last().map(|e| e.role)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
