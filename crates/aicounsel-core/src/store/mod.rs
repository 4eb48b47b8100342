//! Backend record store.
//!
//! The hosted backend keeps one `users` row per email with a `log_data` column
//! holding the serialized conversation, plus the profile columns written at
//! registration. An `action_num` table receives one row per registration.

pub mod supabase;

pub use supabase::SupabaseStore;

use async_trait::async_trait;

use crate::error::Result;
use crate::profile::UserProfile;

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Raw `log_data` value for `email`; `None` when the row or column is absent.
    async fn fetch_log_data(&self, email: &str) -> Result<Option<String>>;

    /// Overwrite `log_data` for `email`.
    async fn update_log_data(&self, email: &str, log_data: &str) -> Result<()>;

    async fn update_profile(&self, email: &str, profile: &UserProfile) -> Result<()>;

    /// Append one row to the action counter table.
    async fn insert_action(&self, email: &str) -> Result<()>;
}
