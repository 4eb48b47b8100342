use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::ai::openai::DEFAULT_BASE_URL;
use crate::error::{Error, Result};
use crate::speech::VoiceSettings;

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
/// Asia/Tokyo, which has no daylight saving
pub const DEFAULT_UTC_OFFSET_MINUTES: i32 = 9 * 60;

/// Contents of `config.json`; every field is optional so a partial file still loads.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct FileConfig {
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub model: Option<String>,
    pub supabase_url: Option<String>,
    pub supabase_key: Option<String>,
    pub tts_model: Option<String>,
    pub tts_voice: Option<String>,
    pub tts_speed: Option<f32>,
    pub utc_offset_minutes: Option<i32>,
    pub player_command: Option<String>,
    pub data_dir: Option<PathBuf>,
}

impl FileConfig {
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("invalid config file {}: {}", path.display(), e)))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }
}

/// Fully resolved startup configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub model: String,
    pub supabase_url: String,
    pub supabase_key: String,
    pub voice: VoiceSettings,
    pub utc_offset: FixedOffset,
    pub player_command: Option<String>,
    pub data_dir: PathBuf,
}

impl Config {
    /// Load `config.json` from the platform config directory and overlay the
    /// process environment. Missing credentials are a startup fault.
    pub fn load() -> Result<Self> {
        let file = FileConfig::load_from(&Self::get_config_path()?)?;
        Self::resolve(file, |key| std::env::var(key).ok())
    }

    /// Environment values win over the file, the file wins over defaults.
    pub fn resolve<F>(file: FileConfig, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let pick = |key: &str, from_file: Option<String>| {
            env(key).filter(|v| !v.is_empty()).or(from_file)
        };

        let openai_api_key = pick("OPENAI_API_KEY", file.openai_api_key)
            .ok_or_else(|| Error::Config("OPENAI_API_KEY is not set".to_string()))?;
        let supabase_url = pick("SUPABASE_URL", file.supabase_url)
            .ok_or_else(|| Error::Config("SUPABASE_URL is not set".to_string()))?;
        let supabase_key = pick("SUPABASE_KEY", file.supabase_key)
            .ok_or_else(|| Error::Config("SUPABASE_KEY is not set".to_string()))?;

        if !supabase_url.starts_with("http://") && !supabase_url.starts_with("https://") {
            return Err(Error::Config(format!("SUPABASE_URL is not a valid URL: {}", supabase_url)));
        }

        let defaults = VoiceSettings::default();
        let speed = match env("AICOUNSEL_TTS_SPEED") {
            Some(raw) => raw
                .parse::<f32>()
                .map_err(|_| Error::Config(format!("AICOUNSEL_TTS_SPEED is not a number: {}", raw)))?,
            None => file.tts_speed.unwrap_or(defaults.speed),
        };
        let voice = VoiceSettings {
            model: pick("AICOUNSEL_TTS_MODEL", file.tts_model).unwrap_or(defaults.model),
            voice: pick("AICOUNSEL_TTS_VOICE", file.tts_voice).unwrap_or(defaults.voice),
            response_format: defaults.response_format,
            speed,
        };

        let offset_minutes = file.utc_offset_minutes.unwrap_or(DEFAULT_UTC_OFFSET_MINUTES);
        let utc_offset = FixedOffset::east_opt(offset_minutes * 60)
            .ok_or_else(|| Error::Config(format!("utc_offset_minutes out of range: {}", offset_minutes)))?;

        let data_dir = match pick("AICOUNSEL_DATA_DIR", None).map(PathBuf::from).or(file.data_dir) {
            Some(dir) => dir,
            None => Self::default_data_dir()?,
        };

        Ok(Self {
            openai_api_key,
            openai_base_url: pick("OPENAI_BASE_URL", file.openai_base_url)
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: pick("AICOUNSEL_MODEL", file.model).unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            supabase_url,
            supabase_key,
            voice,
            utc_offset,
            player_command: pick("AICOUNSEL_PLAYER", file.player_command),
            data_dir,
        })
    }

    /// Where synthesized speech is written (one file, overwritten every time).
    pub fn speech_path(&self) -> PathBuf {
        self.data_dir.join("speech.mp3")
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("could not determine config directory".to_string()))?;

        Ok(config_dir.join("aicounsel").join("config.json"))
    }

    fn default_data_dir() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| Error::Config("could not determine data directory".to_string()))?;
        Ok(data_dir.join("aicounsel"))
    }
}
