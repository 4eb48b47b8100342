//! Conversation log persistence.
//!
//! The whole log is serialized with a timestamp and written over the user's
//! record on every save. There is no version check: the last save to land wins.

use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::state::{ChatRole, LogEntry, Turn};
use crate::store::RecordStore;

/// Stored shape of `log_data`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub log: Vec<LogEntry>,
    pub last_updated_at: String,
}

#[derive(Clone)]
pub struct LogPersistence {
    store: Arc<dyn RecordStore>,
    offset: FixedOffset,
}

impl LogPersistence {
    pub fn new(store: Arc<dyn RecordStore>, offset: FixedOffset) -> Self {
        Self { store, offset }
    }

    /// Current time formatted as ISO-8601 in the configured offset.
    pub fn timestamp(&self) -> String {
        format_timestamp(Utc::now(), self.offset)
    }

    pub fn encode(&self, log: &[LogEntry]) -> Result<String> {
        let record = LogRecord {
            log: log.to_vec(),
            last_updated_at: self.timestamp(),
        };
        serde_json::to_string(&record).map_err(|e| Error::Persistence(e.to_string()))
    }

    /// Overwrite the stored log for `email`.
    pub async fn save(&self, email: &str, log: &[LogEntry]) -> Result<()> {
        let log_data = self.encode(log)?;
        self.store.update_log_data(email, &log_data).await?;
        tracing::debug!(email = %email, entries = log.len(), "Conversation log saved");
        Ok(())
    }

    /// Save on a detached task. Failures are logged and otherwise dropped.
    pub fn spawn_save(&self, email: String, log: Vec<LogEntry>) -> JoinHandle<()> {
        let persistence = self.clone();
        tokio::spawn(async move {
            if let Err(e) = persistence.save(&email, &log).await {
                tracing::warn!(email = %email, error = %e, "Failed to save conversation log");
            }
        })
    }

    pub async fn load(&self, email: &str) -> Result<Vec<Turn>> {
        let raw = self
            .store
            .fetch_log_data(email)
            .await?
            .ok_or_else(|| Error::Persistence(format!("no log data stored for {}", email)))?;

        parse_log_data(&raw)
    }

    /// Load for display: any failure is logged and yields no turns.
    pub async fn load_or_empty(&self, email: &str) -> Vec<Turn> {
        match self.load(email).await {
            Ok(turns) => {
                tracing::info!(email = %email, turns = turns.len(), "Conversation log restored");
                turns
            }
            Err(e) => {
                tracing::warn!(email = %email, error = %e, "Log data not restored");
                Vec::new()
            }
        }
    }
}

pub fn format_timestamp(now: DateTime<Utc>, offset: FixedOffset) -> String {
    now.with_timezone(&offset).to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// Rebuild turns from a stored `log_data` string.
///
/// Entries that are not objects or lack a string `role`/`content` are skipped, as are
/// unknown roles. A missing `log` array or unparsable JSON is an error.
pub fn parse_log_data(raw: &str) -> Result<Vec<Turn>> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| Error::Persistence(format!("log data is not valid JSON: {}", e)))?;

    let entries = value
        .get("log")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::Persistence("log data has no `log` array".to_string()))?;

    let turns = entries
        .iter()
        .filter_map(|entry| {
            let content = entry.get("content")?.as_str()?;
            let role = ChatRole::from_str(entry.get("role")?.as_str()?)?;
            Some(Turn::from(LogEntry::new(role, content)))
        })
        .collect();

    Ok(turns)
}
