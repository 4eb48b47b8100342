use aicounsel_core::ai::SpeechRequest;
use aicounsel_core::speech::VoiceSettings;
use aicounsel_core::{
    build_outbound, AudioPlayer, ChatRole, ChatSession, CompletionBackend, Error, Gender,
    HistoryBuffer, LogEntry, LogPersistence, LogRecord, RecordStore, Result, Settings,
    SpeechBackend, SpeechState, SpeechSynthesizer, Turn, UserProfile, FALLBACK_REPLY,
    SYSTEM_PERSONA,
};
use async_trait::async_trait;
use chrono::{FixedOffset, NaiveDate};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const EMAIL: &str = "taro@example.com";

#[derive(Default)]
struct MemoryStore {
    log_data: Mutex<HashMap<String, String>>,
    profiles: Mutex<HashMap<String, UserProfile>>,
    actions: Mutex<Vec<String>>,
    fail_writes: bool,
}

impl MemoryStore {
    fn with_log_data(email: &str, raw: &str) -> Self {
        let store = Self::default();
        store.log_data.lock().unwrap().insert(email.to_string(), raw.to_string());
        store
    }

    fn record(&self, email: &str) -> LogRecord {
        let raw = self.log_data.lock().unwrap().get(email).cloned().expect("no record saved");
        serde_json::from_str(&raw).expect("saved record is not a LogRecord")
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn fetch_log_data(&self, email: &str) -> Result<Option<String>> {
        Ok(self.log_data.lock().unwrap().get(email).cloned())
    }

    async fn update_log_data(&self, email: &str, log_data: &str) -> Result<()> {
        if self.fail_writes {
            return Err(Error::Persistence("backend unavailable".to_string()));
        }
        self.log_data.lock().unwrap().insert(email.to_string(), log_data.to_string());
        Ok(())
    }

    async fn update_profile(&self, email: &str, profile: &UserProfile) -> Result<()> {
        if self.fail_writes {
            return Err(Error::Persistence("backend unavailable".to_string()));
        }
        self.profiles.lock().unwrap().insert(email.to_string(), profile.clone());
        Ok(())
    }

    async fn insert_action(&self, email: &str) -> Result<()> {
        self.actions.lock().unwrap().push(email.to_string());
        Ok(())
    }
}

/// Replies from a script and records every outbound list it receives.
#[derive(Default)]
struct ScriptedCompletion {
    replies: Mutex<VecDeque<Result<String>>>,
    received: Mutex<Vec<Vec<LogEntry>>>,
}

impl ScriptedCompletion {
    fn new(replies: Vec<Result<String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            received: Mutex::new(Vec::new()),
        }
    }

    fn received(&self) -> Vec<Vec<LogEntry>> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionBackend for ScriptedCompletion {
    async fn complete(&self, messages: &[LogEntry]) -> Result<String> {
        self.received.lock().unwrap().push(messages.to_vec());
        // Let other tasks run, as a real network call would
        tokio::task::yield_now().await;
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::ResponseFormat("script exhausted".to_string())))
    }
}

fn tokyo() -> FixedOffset {
    FixedOffset::east_opt(9 * 3600).unwrap()
}

fn session_with(store: Arc<MemoryStore>, completion: Arc<ScriptedCompletion>) -> ChatSession {
    let persistence = LogPersistence::new(store, tokyo());
    ChatSession::new(EMAIL, completion, persistence)
}

#[tokio::test]
async fn test_first_message_scenario() {
    // Builder alone: no turns, empty history -> persona only
    assert_eq!(
        build_outbound(&[], &HistoryBuffer::new()),
        vec![LogEntry::system(SYSTEM_PERSONA)]
    );

    let store = Arc::new(MemoryStore::default());
    let completion = Arc::new(ScriptedCompletion::new(vec![Ok(
        "眠れない日が続くのは辛いですね".to_string(),
    )]));
    let mut session = session_with(store.clone(), completion.clone());

    let exchange = session.send("最近眠れません").await.unwrap();
    assert!(exchange.succeeded());
    assert_eq!(exchange.reply, "眠れない日が続くのは辛いですね");
    exchange.save.await.unwrap();

    let received = completion.received();
    assert_eq!(
        received[0],
        vec![LogEntry::system(SYSTEM_PERSONA), LogEntry::user("最近眠れません")]
    );

    let record = store.record(EMAIL);
    assert_eq!(
        record.log,
        vec![
            LogEntry::user("最近眠れません"),
            LogEntry::assistant("眠れない日が続くのは辛いですね"),
        ]
    );
    assert!(record.last_updated_at.ends_with("+09:00"));
}

#[tokio::test]
async fn test_history_records_both_sides() {
    let store = Arc::new(MemoryStore::default());
    let completion = Arc::new(ScriptedCompletion::new(vec![
        Ok("辛いですね".to_string()),
        Ok("休めていますか".to_string()),
    ]));
    let mut session = session_with(store, completion.clone());

    session.send("眠れません").await.unwrap();
    session.send("仕事が忙しくて").await.unwrap();

    let roles: Vec<ChatRole> = session.history().entries().iter().map(|e| e.role).collect();
    assert_eq!(
        roles,
        vec![ChatRole::User, ChatRole::Assistant, ChatRole::User, ChatRole::Assistant]
    );

    // Second request: two turns, two history entries, then the new input
    let second = &completion.received()[1];
    assert_eq!(second.len(), 2 + 2 + 1);
    assert_eq!(second.last(), Some(&LogEntry::user("仕事が忙しくて")));
    assert!(second.iter().all(|m| m.role != ChatRole::System));
}

#[tokio::test]
async fn test_malformed_response_falls_back_and_is_saved() {
    let store = Arc::new(MemoryStore::default());
    let completion = Arc::new(ScriptedCompletion::new(vec![Err(Error::ResponseFormat(
        "missing choices".to_string(),
    ))]));
    let mut session = session_with(store.clone(), completion);

    let exchange = session.send("こんにちは").await.unwrap();
    assert_eq!(exchange.reply, FALLBACK_REPLY);
    assert!(matches!(exchange.failure, Some(Error::ResponseFormat(_))));
    exchange.save.await.unwrap();

    assert_eq!(session.history().entries()[1], LogEntry::assistant(FALLBACK_REPLY));
    assert_eq!(session.turns().last(), Some(&Turn::assistant(FALLBACK_REPLY)));

    let record = store.record(EMAIL);
    assert!(record.log.contains(&LogEntry::assistant(FALLBACK_REPLY)));
}

#[tokio::test]
async fn test_fallback_is_sent_as_context_next_time() {
    let store = Arc::new(MemoryStore::default());
    let completion = Arc::new(ScriptedCompletion::new(vec![
        Err(Error::ResponseFormat("bad".to_string())),
        Ok("大丈夫ですか".to_string()),
    ]));
    let mut session = session_with(store, completion.clone());

    session.send("一回目").await.unwrap();
    session.send("二回目").await.unwrap();

    let second = &completion.received()[1];
    assert!(second.contains(&LogEntry::assistant(FALLBACK_REPLY)));
}

#[tokio::test]
async fn test_save_failure_does_not_interrupt_chat() {
    let store = Arc::new(MemoryStore {
        fail_writes: true,
        ..MemoryStore::default()
    });
    let completion = Arc::new(ScriptedCompletion::new(vec![Ok("はい".to_string())]));
    let mut session = session_with(store.clone(), completion);

    let exchange = session.send("聞いてください").await.unwrap();
    assert!(exchange.succeeded());
    exchange.save.await.unwrap();
    assert!(store.log_data.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_input_rejected() {
    let store = Arc::new(MemoryStore::default());
    let completion = Arc::new(ScriptedCompletion::default());
    let mut session = session_with(store, completion.clone());

    assert!(matches!(session.send("   ").await, Err(Error::Validation(_))));
    assert!(completion.received().is_empty());
    assert!(session.turns().is_empty());
}

#[tokio::test]
async fn test_save_then_load_round_trip() {
    let store = Arc::new(MemoryStore::default());
    let persistence = LogPersistence::new(store.clone(), tokyo());

    let log = vec![
        LogEntry::user("a"),
        LogEntry::assistant("b"),
        LogEntry::user("c"),
        LogEntry::assistant("d"),
        LogEntry::user("e"),
    ];
    persistence.save(EMAIL, &log).await.unwrap();

    let turns = persistence.load(EMAIL).await.unwrap();
    assert_eq!(turns.len(), log.len());
    for (turn, entry) in turns.iter().zip(&log) {
        assert_eq!(turn.role, entry.role);
        assert_eq!(turn.text, entry.content);
        assert_eq!(turn.is_received, entry.role == ChatRole::Assistant);
    }

    // Loading again without a save in between gives the same turns
    assert_eq!(persistence.load(EMAIL).await.unwrap(), turns);
}

#[tokio::test]
async fn test_save_overwrites_previous_record() {
    let store = Arc::new(MemoryStore::default());
    let persistence = LogPersistence::new(store.clone(), tokyo());

    persistence.save(EMAIL, &[LogEntry::user("old")]).await.unwrap();
    persistence.save(EMAIL, &[LogEntry::user("new"), LogEntry::assistant("reply")]).await.unwrap();

    let turns = persistence.load(EMAIL).await.unwrap();
    assert_eq!(turns, vec![Turn::user("new"), Turn::assistant("reply")]);
}

#[tokio::test]
async fn test_load_not_json_yields_empty() {
    let store = Arc::new(MemoryStore::with_log_data(EMAIL, "not json"));
    let persistence = LogPersistence::new(store, tokyo());

    assert!(matches!(persistence.load(EMAIL).await, Err(Error::Persistence(_))));
    assert!(persistence.load_or_empty(EMAIL).await.is_empty());
}

#[tokio::test]
async fn test_load_missing_record_yields_empty() {
    let store = Arc::new(MemoryStore::default());
    let persistence = LogPersistence::new(store, tokyo());
    assert!(persistence.load_or_empty("nobody@example.com").await.is_empty());
}

#[tokio::test]
async fn test_restore_feeds_outbound() {
    let raw = r#"{"log":[{"role":"user","content":"前回の相談"},{"role":"assistant","content":"覚えています"}],"last_updated_at":"2024-01-01T00:00:00+09:00"}"#;
    let store = Arc::new(MemoryStore::with_log_data(EMAIL, raw));
    let completion = Arc::new(ScriptedCompletion::new(vec![Ok("どうぞ".to_string())]));
    let mut session = session_with(store.clone(), completion.clone());

    assert_eq!(session.restore().await, 2);
    assert!(session.turns()[1].is_received);

    let exchange = session.send("続きです").await.unwrap();
    exchange.save.await.unwrap();

    assert_eq!(
        completion.received()[0],
        vec![
            LogEntry::user("前回の相談"),
            LogEntry::assistant("覚えています"),
            LogEntry::user("続きです"),
        ]
    );

    // The saved log keeps the restored conversation
    assert_eq!(store.record(EMAIL).log.len(), 4);
}

#[tokio::test]
async fn test_register_updates_backend_and_settings() {
    let store = MemoryStore::default();
    let mut settings = Settings {
        user_email: Some(EMAIL.to_string()),
        ..Settings::default()
    };
    let birthdate = NaiveDate::from_ymd_opt(1995, 12, 24).unwrap();
    let profile = UserProfile::new("たろう", birthdate, Some(Gender::Male), tokyo()).unwrap();

    aicounsel_core::profile::register(&store, &mut settings, &profile).await.unwrap();

    assert_eq!(store.profiles.lock().unwrap().get(EMAIL), Some(&profile));
    assert_eq!(*store.actions.lock().unwrap(), vec![EMAIL.to_string()]);
    assert!(settings.is_user_data_complete);
    assert_eq!(settings.gender.as_deref(), Some("male"));
    assert_eq!(settings.birthdate.as_deref(), Some("1995-12-24T00:00:00+09:00"));
}

#[tokio::test]
async fn test_register_failure_leaves_settings_untouched() {
    let store = MemoryStore {
        fail_writes: true,
        ..MemoryStore::default()
    };
    let mut settings = Settings {
        user_email: Some(EMAIL.to_string()),
        ..Settings::default()
    };
    let birthdate = NaiveDate::from_ymd_opt(1995, 12, 24).unwrap();
    let profile = UserProfile::new("たろう", birthdate, Some(Gender::Female), tokyo()).unwrap();

    assert!(aicounsel_core::profile::register(&store, &mut settings, &profile).await.is_err());
    assert!(!settings.is_user_data_complete);
    assert!(settings.nickname.is_none());
    assert!(store.actions.lock().unwrap().is_empty());
}

struct CountingSpeech {
    inputs: Mutex<Vec<String>>,
}

#[async_trait]
impl SpeechBackend for CountingSpeech {
    async fn speech(&self, request: &SpeechRequest) -> Result<Vec<u8>> {
        self.inputs.lock().unwrap().push(request.input.clone());
        Ok(vec![0xFF, 0xF3])
    }
}

#[derive(Default)]
struct SilentPlayer {
    played: Mutex<Vec<PathBuf>>,
}

#[async_trait]
impl AudioPlayer for SilentPlayer {
    async fn play(&self, path: &Path) -> Result<()> {
        self.played.lock().unwrap().push(path.to_path_buf());
        tokio::task::yield_now().await;
        Ok(())
    }
}

fn voice_session(
    dir: &TempDir,
    completion: Arc<ScriptedCompletion>,
) -> (ChatSession, Arc<CountingSpeech>, Arc<SilentPlayer>) {
    let backend = Arc::new(CountingSpeech {
        inputs: Mutex::new(Vec::new()),
    });
    let player = Arc::new(SilentPlayer::default());
    let synth = SpeechSynthesizer::new(
        backend.clone(),
        player.clone(),
        VoiceSettings::default(),
        dir.path().join("speech.mp3"),
    );
    let session = session_with(Arc::new(MemoryStore::default()), completion).with_speech(Arc::new(synth));
    (session, backend, player)
}

#[tokio::test]
async fn test_voice_send_speaks_filler_then_reply() {
    let dir = TempDir::new().unwrap();
    let completion = Arc::new(ScriptedCompletion::new(vec![Ok("ゆっくり休んでください".to_string())]));
    let (mut session, backend, player) = voice_session(&dir, completion);

    let exchange = session.send_voice("疲れました").await.unwrap();
    assert!(exchange.succeeded());

    let inputs = backend.inputs.lock().unwrap().clone();
    assert_eq!(inputs.len(), 2);
    assert!(aicounsel_core::speech::INTERJECTIONS.contains(&inputs[0].as_str()));
    assert_eq!(inputs[1], "ゆっくり休んでください");
    assert_eq!(session.speech().unwrap().state(), SpeechState::Finished);
    assert_eq!(
        *player.played.lock().unwrap(),
        vec![dir.path().join("interjection.mp3"), dir.path().join("speech.mp3")]
    );
}

#[tokio::test]
async fn test_voice_send_lifecycle_follows_reply_only() {
    let dir = TempDir::new().unwrap();
    let completion = Arc::new(ScriptedCompletion::new(vec![Ok("大丈夫ですよ".to_string())]));
    let (mut session, _backend, _player) = voice_session(&dir, completion);

    let mut states = session.speech().unwrap().subscribe();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = {
        let seen = seen.clone();
        tokio::spawn(async move {
            while states.changed().await.is_ok() {
                let state = *states.borrow_and_update();
                seen.lock().unwrap().push(state);
            }
        })
    };

    session.send_voice("疲れました").await.unwrap();
    tokio::task::yield_now().await;
    recorder.abort();

    assert_eq!(
        *seen.lock().unwrap(),
        vec![SpeechState::Loading, SpeechState::Loaded, SpeechState::Finished]
    );
}

#[tokio::test]
async fn test_voice_send_rejects_blank_before_speaking() {
    let dir = TempDir::new().unwrap();
    let completion = Arc::new(ScriptedCompletion::default());
    let (mut session, backend, player) = voice_session(&dir, completion.clone());

    assert!(matches!(session.send_voice("  \n ").await, Err(Error::Validation(_))));
    tokio::task::yield_now().await;
    assert!(backend.inputs.lock().unwrap().is_empty());
    assert!(player.played.lock().unwrap().is_empty());
    assert!(completion.received().is_empty());
    assert_eq!(session.speech().unwrap().state(), SpeechState::NotStarted);
}

#[tokio::test]
async fn test_voice_send_does_not_speak_fallback() {
    let dir = TempDir::new().unwrap();
    let completion = Arc::new(ScriptedCompletion::new(vec![Err(Error::ResponseFormat(
        "bad".to_string(),
    ))]));
    let (mut session, backend, player) = voice_session(&dir, completion);

    let exchange = session.send_voice("疲れました").await.unwrap();
    assert_eq!(exchange.reply, FALLBACK_REPLY);
    assert_eq!(backend.inputs.lock().unwrap().len(), 1);
    assert_eq!(*player.played.lock().unwrap(), vec![dir.path().join("interjection.mp3")]);
    assert_eq!(session.speech().unwrap().state(), SpeechState::NotStarted);
}
