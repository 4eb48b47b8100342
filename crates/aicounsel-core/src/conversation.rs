//! Assembly of the message list sent to the completion endpoint.

use crate::history::HistoryBuffer;
use crate::state::{LogEntry, Turn};

/// Persona instruction used to open a conversation that has no prior turns.
pub const SYSTEM_PERSONA: &str =
    "このチャットボットは心の悩みに関するカウンセリングを行います。\n20文字以内で返して。";

/// Shown in place of a reply when the completion call fails.
pub const FALLBACK_REPLY: &str = "エラーが発生しました。";

/// Build the ordered outbound message list.
///
/// With no turns the list starts with the system persona; otherwise every turn is
/// mapped in order. The history buffer is appended after that, in order, even when
/// it repeats turns already present. Nothing here reorders or deduplicates.
pub fn build_outbound(turns: &[Turn], history: &HistoryBuffer) -> Vec<LogEntry> {
    let mut messages: Vec<LogEntry> = if turns.is_empty() {
        vec![LogEntry::system(SYSTEM_PERSONA)]
    } else {
        turns.iter().map(Turn::to_entry).collect()
    };

    messages.extend(history.entries().iter().cloned());
    messages
}
