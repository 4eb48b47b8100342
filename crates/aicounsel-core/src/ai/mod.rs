pub mod openai;

pub use openai::{OpenAIClient, SpeechRequest};

use async_trait::async_trait;

use crate::error::Result;
use crate::state::LogEntry;

/// Anything that can turn an ordered message list into a single assistant reply.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Send `messages` exactly in the given order and return the reply text.
    async fn complete(&self, messages: &[LogEntry]) -> Result<String>;
}

/// Text-to-speech endpoint returning encoded audio bytes.
#[async_trait]
pub trait SpeechBackend: Send + Sync {
    async fn speech(&self, request: &SpeechRequest) -> Result<Vec<u8>>;
}
