//! Supabase backend: PostgREST table access and object storage.
//!
//! Both clients authenticate with the same service key and talk plain REST
//! through reqwest. Neither retries; a failed call surfaces as an `AppError`.

pub mod client;
pub mod storage;

use reqwest::{RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub use client::SupabaseClient;
pub use storage::SupabaseStorage;

/// Backend settings stored in ~/.smledger/config.json.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupabaseConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default = "default_table")]
    pub table: String,
    #[serde(default = "default_bucket")]
    pub bucket: String,
}

fn default_table() -> String {
    "sm_records".to_string()
}

fn default_bucket() -> String {
    "ppt".to_string()
}

impl Default for SupabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            key: None,
            table: default_table(),
            bucket: default_bucket(),
        }
    }
}

impl SupabaseConfig {
    /// Base URL and key, or `NotConfigured` naming what is missing.
    pub(crate) fn credentials(&self) -> Result<(String, String), AppError> {
        let url = self
            .url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| AppError::NotConfigured("supabase url is missing".to_string()))?;
        let key = self
            .key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| AppError::NotConfigured("supabase key is missing".to_string()))?;
        Ok((url.trim_end_matches('/').to_string(), key.to_string()))
    }
}

/// Attach the auth headers every Supabase endpoint expects.
pub(crate) fn authed(req: RequestBuilder, key: &str) -> RequestBuilder {
    req.header("apikey", key)
        .header("Authorization", format!("Bearer {}", key))
}

/// Turn a non-success response into the matching error.
pub(crate) async fn check(resp: Response, what: &str) -> Result<Response, AppError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    log::warn!("Supabase {} failed with {}: {}", what, status, body);
    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AppError::Unauthorized(status.as_u16()),
        StatusCode::NOT_FOUND => AppError::NotFound(what.to_string()),
        _ => AppError::Upstream {
            status: status.as_u16(),
            body,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_trim_trailing_slash() {
        let config = SupabaseConfig {
            url: Some("https://abc.supabase.co/".into()),
            key: Some("service-key".into()),
            ..Default::default()
        };
        let (url, key) = config.credentials().unwrap();
        assert_eq!(url, "https://abc.supabase.co");
        assert_eq!(key, "service-key");
    }

    #[test]
    fn missing_key_is_not_configured() {
        let config = SupabaseConfig {
            url: Some("https://abc.supabase.co".into()),
            key: Some("   ".into()),
            ..Default::default()
        };
        assert!(matches!(
            config.credentials(),
            Err(AppError::NotConfigured(_))
        ));
    }
}
