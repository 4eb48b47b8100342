//! UI-agnostic conversation types
//!
//! These are shared by the session, the persistence layer and whatever front-end
//! renders the conversation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "system" => Some(ChatRole::System),
            "user" => Some(ChatRole::User),
            "assistant" => Some(ChatRole::Assistant),
            _ => None,
        }
    }
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `{role, content}` pair as sent to the completion endpoint and stored in the log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub role: ChatRole,
    pub content: String,
}

impl LogEntry {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(ChatRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(ChatRole::Assistant, content)
    }
}

/// A single displayed message in the conversation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Turn {
    pub text: String,
    pub role: ChatRole,
    /// True for messages that came back from the assistant
    pub is_received: bool,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            role: ChatRole::User,
            is_received: false,
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            role: ChatRole::Assistant,
            is_received: true,
        }
    }

    pub fn to_entry(&self) -> LogEntry {
        LogEntry::new(self.role, self.text.clone())
    }
}

impl From<LogEntry> for Turn {
    fn from(entry: LogEntry) -> Self {
        Self {
            is_received: entry.role == ChatRole::Assistant,
            role: entry.role,
            text: entry.content,
        }
    }
}
