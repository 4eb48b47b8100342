use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};

use super::RecordStore;
use crate::error::{Error, Result};
use crate::profile::UserProfile;

const USERS_TABLE: &str = "users";
const ACTION_TABLE: &str = "action_num";

#[derive(Deserialize)]
struct LogDataRow {
    log_data: Option<String>,
}

#[derive(Serialize)]
struct LogDataUpdate<'a> {
    log_data: &'a str,
}

#[derive(Serialize)]
struct ProfileUpdate<'a> {
    nickname: &'a str,
    birthdate: &'a str,
    gender: &'a str,
}

#[derive(Serialize)]
struct ActionInsert<'a> {
    user_email: &'a str,
}

/// PostgREST client for a Supabase project
#[derive(Clone)]
pub struct SupabaseStore {
    client: Client,
    base_url: String,
    api_key: String,
}

impl SupabaseStore {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
    }

    async fn check(response: Response, what: &str) -> Result<Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(Error::Persistence(format!("{} failed with {}: {}", what, status, body)))
    }

    async fn patch_user<T: Serialize + Sync>(&self, email: &str, body: &T, what: &str) -> Result<()> {
        let eq = format!("eq.{}", email);
        let response = self
            .authorized(self.client.patch(self.table_url(USERS_TABLE)))
            .query(&[("user_email", eq.as_str())])
            .header("Prefer", "return=minimal")
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Persistence(e.to_string()))?;

        Self::check(response, what).await?;
        Ok(())
    }
}

#[async_trait]
impl RecordStore for SupabaseStore {
    async fn fetch_log_data(&self, email: &str) -> Result<Option<String>> {
        let eq = format!("eq.{}", email);
        let response = self
            .authorized(self.client.get(self.table_url(USERS_TABLE)))
            .query(&[("select", "log_data"), ("user_email", eq.as_str())])
            .send()
            .await
            .map_err(|e| Error::Persistence(e.to_string()))?;

        let response = Self::check(response, "log fetch").await?;
        let body = response
            .text()
            .await
            .map_err(|e| Error::Persistence(e.to_string()))?;

        parse_log_rows(&body)
    }

    async fn update_log_data(&self, email: &str, log_data: &str) -> Result<()> {
        self.patch_user(email, &LogDataUpdate { log_data }, "log update").await
    }

    async fn update_profile(&self, email: &str, profile: &UserProfile) -> Result<()> {
        let birthdate = profile.birthdate_string();
        let body = ProfileUpdate {
            nickname: &profile.nickname,
            birthdate: &birthdate,
            gender: profile.gender.key(),
        };
        self.patch_user(email, &body, "profile update").await
    }

    async fn insert_action(&self, email: &str) -> Result<()> {
        let response = self
            .authorized(self.client.post(self.table_url(ACTION_TABLE)))
            .header("Prefer", "return=minimal")
            .json(&ActionInsert { user_email: email })
            .send()
            .await
            .map_err(|e| Error::Persistence(e.to_string()))?;

        Self::check(response, "action insert").await?;
        Ok(())
    }
}

/// PostgREST answers a select with an array of rows; the first row wins.
fn parse_log_rows(body: &str) -> Result<Option<String>> {
    let rows: Vec<LogDataRow> = serde_json::from_str(body)
        .map_err(|e| Error::Persistence(format!("unreadable log rows: {}", e)))?;
    Ok(rows.into_iter().next().and_then(|row| row.log_data))
}
