//! User profile captured at registration.

use chrono::{DateTime, FixedOffset, NaiveDate, SecondsFormat, TimeZone};

use crate::error::{Error, Result};
use crate::settings::Settings;
use crate::store::RecordStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gender {
    Male,
    Female,
    Unspecified,
}

impl Gender {
    /// Value stored in the backend
    pub fn key(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Unspecified => "unspecified",
        }
    }

    /// Label shown to the user
    pub fn label(&self) -> &'static str {
        match self {
            Gender::Male => "男",
            Gender::Female => "女",
            Gender::Unspecified => "選択しない",
        }
    }

    pub fn from_key(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "male" => Some(Gender::Male),
            "female" => Some(Gender::Female),
            "unspecified" => Some(Gender::Unspecified),
            _ => None,
        }
    }

    pub fn all() -> Vec<Gender> {
        vec![Gender::Male, Gender::Female, Gender::Unspecified]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub nickname: String,
    pub birthdate: DateTime<FixedOffset>,
    pub gender: Gender,
}

impl UserProfile {
    /// Validate registration input the way the form does: nickname first, then gender.
    pub fn new(
        nickname: &str,
        birthdate: NaiveDate,
        gender: Option<Gender>,
        offset: FixedOffset,
    ) -> Result<Self> {
        let nickname = nickname.trim();
        if nickname.is_empty() {
            return Err(Error::Validation("ニックネームを入力してください".to_string()));
        }
        let gender = gender.ok_or_else(|| Error::Validation("性別を選択してください".to_string()))?;

        let midnight = birthdate
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| Error::Validation("invalid birthdate".to_string()))?;
        let birthdate = offset
            .from_local_datetime(&midnight)
            .single()
            .ok_or_else(|| Error::Validation("invalid birthdate".to_string()))?;

        Ok(Self {
            nickname: nickname.to_string(),
            birthdate,
            gender,
        })
    }

    pub fn birthdate_string(&self) -> String {
        self.birthdate.to_rfc3339_opts(SecondsFormat::Secs, false)
    }
}

/// Write the profile to the backend, bump the action counter and mark the local
/// settings as complete. Local settings are only touched after the backend accepted
/// the profile.
pub async fn register(
    store: &dyn RecordStore,
    settings: &mut Settings,
    profile: &UserProfile,
) -> Result<()> {
    let email = settings.require_email()?.to_string();

    store.update_profile(&email, profile).await?;
    tracing::info!(email = %email, nickname = %profile.nickname, "Profile stored");

    settings.nickname = Some(profile.nickname.clone());
    settings.birthdate = Some(profile.birthdate_string());
    settings.gender = Some(profile.gender.key().to_string());
    settings.is_user_data_complete = true;

    store.insert_action(&email).await?;
    Ok(())
}
