use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::records::{RecordField, RecordInput};
use crate::supabase::SupabaseConfig;

/// Application configuration
///
/// Loaded from `~/.smledger/config.json`; environment variables override the
/// backend credentials and the bind address.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub supabase: SupabaseConfig,
    #[serde(default = "default_http_bind")]
    pub http_bind: String,
    /// Serve the last fetched record list when the backend is unreachable.
    #[serde(default)]
    pub fallback_to_cache: bool,
    /// Timezone reminders and "today" are evaluated in.
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_http_bind() -> String {
    "127.0.0.1:8080".to_string()
}

pub fn default_timezone() -> String {
    "Asia/Seoul".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            supabase: SupabaseConfig::default(),
            http_bind: default_http_bind(),
            fallback_to_cache: false,
            timezone: default_timezone(),
        }
    }
}

/// A single failed required-field check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldError {
    pub field: RecordField,
    pub message: String,
}

impl FieldError {
    pub fn required(field: RecordField) -> Self {
        Self {
            field,
            message: format!("{} is required", field.label()),
        }
    }
}

/// An uploaded supporting document. `id` is the storage key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAsset {
    pub id: String,
    pub name: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub url: String,
    pub uploaded_at: String,
}

/// Result of a storage write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub url: String,
}

/// A cron-labelled template that creates a ticket when run.
///
/// Blank template fields fall back to the defaults in `scheduler`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    pub id: String,
    pub name: String,
    pub cron_expression: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub template: RecordInput,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_run: Option<DateTime<Utc>>,
}

/// Request body for registering a reminder.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReminder {
    pub name: String,
    pub cron_expression: String,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub template: RecordInput,
}

fn default_active() -> bool {
    true
}
