//! One conversation per chat screen.
//!
//! A `ChatSession` is built when the screen opens and dropped when it closes; it
//! owns the displayed turns and the history buffer. Completion failures turn into
//! the fallback reply, speech and persistence failures are only logged, and a save
//! is started after every exchange whether or not the completion succeeded.

use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::ai::CompletionBackend;
use crate::conversation::{build_outbound, FALLBACK_REPLY};
use crate::error::{Error, Result};
use crate::history::HistoryBuffer;
use crate::persistence::LogPersistence;
use crate::speech::{random_interjection, SpeechSynthesizer};
use crate::state::{LogEntry, Turn};

/// Result of one user message
#[derive(Debug)]
pub struct Exchange {
    /// Text shown as the assistant turn (the fallback when the call failed)
    pub reply: String,
    /// Why the completion failed, for the caller to log
    pub failure: Option<Error>,
    /// Detached save of the updated log; dropping it does not cancel the save
    pub save: JoinHandle<()>,
}

impl Exchange {
    pub fn succeeded(&self) -> bool {
        self.failure.is_none()
    }
}

pub struct ChatSession {
    email: String,
    completion: Arc<dyn CompletionBackend>,
    persistence: LogPersistence,
    speech: Option<Arc<SpeechSynthesizer>>,
    turns: Vec<Turn>,
    history: HistoryBuffer,
}

impl ChatSession {
    pub fn new(
        email: impl Into<String>,
        completion: Arc<dyn CompletionBackend>,
        persistence: LogPersistence,
    ) -> Self {
        Self {
            email: email.into(),
            completion,
            persistence,
            speech: None,
            turns: Vec::new(),
            history: HistoryBuffer::new(),
        }
    }

    pub fn with_speech(mut self, speech: Arc<SpeechSynthesizer>) -> Self {
        self.speech = Some(speech);
        self
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn history(&self) -> &HistoryBuffer {
        &self.history
    }

    pub fn speech(&self) -> Option<&Arc<SpeechSynthesizer>> {
        self.speech.as_ref()
    }

    /// Replace the displayed turns with whatever is stored for this user.
    pub async fn restore(&mut self) -> usize {
        self.turns = self.persistence.load_or_empty(&self.email).await;
        self.turns.len()
    }

    /// Messages that would be sent for `input` in the current state.
    pub fn outbound_for(&self, input: &str) -> Vec<LogEntry> {
        let mut messages = build_outbound(&self.turns, &self.history);
        messages.push(LogEntry::user(input));
        messages
    }

    /// The log written to the backend: every displayed turn, in order.
    pub fn log(&self) -> Vec<LogEntry> {
        self.turns.iter().map(Turn::to_entry).collect()
    }

    pub async fn send(&mut self, input: &str) -> Result<Exchange> {
        let input = non_empty(input)?;

        let outbound = self.outbound_for(input);
        self.history.push_user(input);
        self.turns.push(Turn::user(input));

        let (reply, failure) = match self.completion.complete(&outbound).await {
            Ok(reply) => (reply, None),
            Err(e) => {
                tracing::warn!(error = %e, "Completion failed, showing fallback reply");
                (FALLBACK_REPLY.to_string(), Some(e))
            }
        };

        // The fallback is remembered like any other reply
        self.history.push_assistant(reply.clone());
        self.turns.push(Turn::assistant(reply.clone()));

        let save = self.persistence.spawn_save(self.email.clone(), self.log());

        Ok(Exchange {
            reply,
            failure,
            save,
        })
    }

    /// Voice-mode send: a filler plays while the reply is generated, then the reply
    /// is spoken. Only the reply moves the speech lifecycle. Speech problems never
    /// fail the exchange.
    pub async fn send_voice(&mut self, input: &str) -> Result<Exchange> {
        let Some(speech) = self.speech.clone() else {
            return self.send(input).await;
        };
        let input = non_empty(input)?;

        let filler_speech = speech.clone();
        let filler = tokio::spawn(async move {
            if let Err(e) = filler_speech.interject(random_interjection()).await {
                tracing::debug!(error = %e, "Skipping filler");
            }
        });

        let exchange = self.send(input).await?;

        // Reply audio is fetched while the filler plays; playback waits for it
        let filler_done = async move {
            if let Err(e) = filler.await {
                tracing::warn!(error = %e, "Filler task failed");
            }
        };

        if exchange.succeeded() {
            if let Err(e) = speech.synthesize_after(&exchange.reply, filler_done).await {
                tracing::debug!(error = %e, "Continuing without voice");
            }
        } else {
            filler_done.await;
        }
        Ok(exchange)
    }
}

fn non_empty(input: &str) -> Result<&str> {
    let input = input.trim();
    if input.is_empty() {
        return Err(Error::Validation("message cannot be empty".to_string()));
    }
    Ok(input)
}
