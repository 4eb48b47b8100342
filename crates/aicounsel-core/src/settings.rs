//! Local persisted settings (the on-device key-value store).

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    pub user_email: Option<String>,
    pub nickname: Option<String>,
    pub birthdate: Option<String>,
    pub gender: Option<String>,
    #[serde(default, rename = "isUserDataComplete")]
    pub is_user_data_complete: bool,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_settings_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("invalid settings file {}: {}", path.display(), e)))
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_settings_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create settings directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Config(e.to_string()))?;
        fs::write(path, content)?;
        tracing::debug!(path = %path.display(), "Settings saved");
        Ok(())
    }

    /// The email that keys the backend record; chat cannot persist without it.
    pub fn require_email(&self) -> Result<&str> {
        self.user_email
            .as_deref()
            .filter(|e| !e.is_empty())
            .ok_or_else(|| Error::Config("no user email set; run `aicounsel login <email>` first".to_string()))
    }

    pub fn get_settings_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("could not determine config directory".to_string()))?;

        Ok(config_dir.join("aicounsel").join("settings.json"))
    }
}
