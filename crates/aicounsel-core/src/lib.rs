pub mod ai;
pub mod config;
pub mod conversation;
pub mod error;
pub mod history;
pub mod logging;
pub mod persistence;
pub mod profile;
pub mod session;
pub mod settings;
pub mod speech;
pub mod state;
pub mod store;

// Re-export main types for convenience
pub use ai::{CompletionBackend, OpenAIClient, SpeechBackend};
pub use config::Config;
pub use conversation::{build_outbound, FALLBACK_REPLY, SYSTEM_PERSONA};
pub use error::{Error, Result};
pub use history::HistoryBuffer;
pub use persistence::{LogPersistence, LogRecord};
pub use profile::{Gender, UserProfile};
pub use session::{ChatSession, Exchange};
pub use settings::Settings;
pub use speech::{AudioPlayer, CommandPlayer, SpeechState, SpeechSynthesizer};
pub use state::{ChatRole, LogEntry, Turn};
pub use store::{RecordStore, SupabaseStore};
