//! Text-to-speech for assistant replies.
//!
//! Reply audio always lands in the same file, so at most one reply clip exists at a
//! time; fillers get a file of their own. Progress of replies is published on a `watch` channel that a front-end can observe:
//! `NotStarted -> Loading -> Loaded -> Finished`.

use async_trait::async_trait;
use rand::seq::SliceRandom;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::process::Command;
use tokio::sync::watch;

use crate::ai::{SpeechBackend, SpeechRequest};
use crate::error::{Error, Result};

/// Short fillers spoken while a reply is still being generated in voice mode.
pub const INTERJECTIONS: &[&str] = &[
    "うーん",
    "あーー",
    "あ、はい",
    "えーーと",
    "ええ、",
    "ん〜〜と",
    "おお！",
    "うーん、うん",
];

pub fn random_interjection() -> &'static str {
    INTERJECTIONS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or("うーん")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechState {
    NotStarted,
    Loading,
    /// Audio is on disk and playing
    Loaded,
    Finished,
}

/// Plays an audio file and resolves once playback has ended.
#[async_trait]
pub trait AudioPlayer: Send + Sync {
    async fn play(&self, path: &Path) -> Result<()>;
}

/// Plays audio through an external player program.
#[derive(Debug, Clone)]
pub struct CommandPlayer {
    program: String,
    args: Vec<String>,
}

impl CommandPlayer {
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Parse a command line such as `"ffplay -nodisp -autoexit"`.
    pub fn from_command_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let program = parts.next()?;
        let args: Vec<&str> = parts.collect();
        Some(Self::new(program, &args))
    }

    pub fn platform_default() -> Self {
        if cfg!(target_os = "macos") {
            Self::new("afplay", &[])
        } else {
            Self::new("ffplay", &["-nodisp", "-autoexit", "-loglevel", "quiet"])
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait]
impl AudioPlayer for CommandPlayer {
    async fn play(&self, path: &Path) -> Result<()> {
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .status()
            .await
            .map_err(|e| Error::Synthesis(format!("could not start {}: {}", self.program, e)))?;

        if !status.success() {
            return Err(Error::Synthesis(format!("{} exited with {}", self.program, status)));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VoiceSettings {
    pub model: String,
    pub voice: String,
    pub response_format: String,
    pub speed: f32,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            model: "tts-1".to_string(),
            voice: "alloy".to_string(),
            response_format: "mp3".to_string(),
            speed: 1.0,
        }
    }
}

pub struct SpeechSynthesizer {
    backend: Arc<dyn SpeechBackend>,
    player: Arc<dyn AudioPlayer>,
    settings: VoiceSettings,
    output_path: PathBuf,
    state: watch::Sender<SpeechState>,
}

impl SpeechSynthesizer {
    pub fn new(
        backend: Arc<dyn SpeechBackend>,
        player: Arc<dyn AudioPlayer>,
        settings: VoiceSettings,
        output_path: PathBuf,
    ) -> Self {
        let (state, _) = watch::channel(SpeechState::NotStarted);
        Self {
            backend,
            player,
            settings,
            output_path,
            state,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SpeechState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> SpeechState {
        *self.state.borrow()
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Where filler clips are written, next to the reply clip.
    pub fn interjection_path(&self) -> PathBuf {
        self.output_path
            .with_file_name(format!("interjection.{}", self.settings.response_format))
    }

    /// Speak `text`. On failure the lifecycle goes back to where it was.
    pub async fn synthesize(&self, text: &str) -> Result<()> {
        self.synthesize_after(text, async {}).await
    }

    /// Speak `text` once `ready` resolves. The audio is fetched and written while
    /// waiting, only playback is held back.
    pub async fn synthesize_after<F>(&self, text: &str, ready: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let prior = self.state.send_replace(SpeechState::Loading);

        match self.fetch_and_play(text, ready).await {
            Ok(()) => {
                self.state.send_replace(SpeechState::Finished);
                Ok(())
            }
            Err(e) => {
                self.state.send_replace(prior);
                tracing::warn!(error = %e, "Speech synthesis failed");
                Err(into_synthesis(e))
            }
        }
    }

    /// Speak a filler clip. Fillers use their own file and never touch the
    /// published lifecycle, so observers only see replies.
    pub async fn interject(&self, text: &str) -> Result<()> {
        let path = self.interjection_path();
        let audio = self.fetch(text).await.map_err(into_synthesis)?;
        write_clip(&path, &audio).await.map_err(into_synthesis)?;
        self.player.play(&path).await.map_err(into_synthesis)
    }

    /// Play the last synthesized clip again.
    pub async fn replay(&self) -> Result<()> {
        if !self.output_path.exists() {
            return Err(Error::Synthesis("nothing has been synthesized yet".to_string()));
        }
        let prior = self.state.send_replace(SpeechState::Loaded);
        match self.player.play(&self.output_path).await {
            Ok(()) => {
                self.state.send_replace(SpeechState::Finished);
                Ok(())
            }
            Err(e) => {
                self.state.send_replace(prior);
                tracing::warn!(error = %e, "Replay failed");
                Err(into_synthesis(e))
            }
        }
    }

    async fn fetch(&self, text: &str) -> Result<Vec<u8>> {
        let request = SpeechRequest {
            model: self.settings.model.clone(),
            input: text.to_string(),
            voice: self.settings.voice.clone(),
            response_format: self.settings.response_format.clone(),
            speed: self.settings.speed,
        };

        let audio = self.backend.speech(&request).await?;
        if audio.is_empty() {
            return Err(Error::Synthesis("speech endpoint returned no audio".to_string()));
        }
        Ok(audio)
    }

    async fn fetch_and_play<F>(&self, text: &str, ready: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let audio = self.fetch(text).await?;
        write_clip(&self.output_path, &audio).await?;
        ready.await;

        self.state.send_replace(SpeechState::Loaded);
        self.player.play(&self.output_path).await
    }
}

async fn write_clip(path: &Path, audio: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, audio).await?;
    tracing::debug!(path = %path.display(), bytes = audio.len(), "Speech written");
    Ok(())
}

fn into_synthesis(err: Error) -> Error {
    match err {
        Error::Synthesis(_) => err,
        other => Error::Synthesis(other.to_string()),
    }
}
