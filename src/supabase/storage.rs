//! Storage API client for the document bucket.
//!
//! Objects are addressed by key; keys are percent-encoded as a single path
//! segment so names with spaces or non-ASCII characters survive.

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use super::{authed, check, SupabaseConfig};
use crate::error::AppError;
use crate::gateway::FileStore;
use crate::types::{FileAsset, StoredObject};

/// The bucket listing endpoint caps one page at this many objects.
const LIST_LIMIT: u32 = 100;

#[derive(Debug, Deserialize)]
struct ListedObject {
    name: String,
    /// Folder placeholders have no id.
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    metadata: Option<ObjectMetadata>,
}

#[derive(Debug, Default, Deserialize)]
struct ObjectMetadata {
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    mimetype: Option<String>,
}

pub struct SupabaseStorage {
    client: reqwest::Client,
    base_url: String,
    key: String,
    bucket: String,
}

impl SupabaseStorage {
    pub fn new(config: &SupabaseConfig) -> Result<Self, AppError> {
        let (base_url, key) = config.credentials()?;
        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
            key,
            bucket: config.bucket.clone(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, AppError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| AppError::NotConfigured(format!("invalid supabase url: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| AppError::NotConfigured("supabase url cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(["storage", "v1", "object"])
            .extend(segments);
        Ok(url)
    }

    /// Publicly readable URL for `key`.
    pub fn public_url(&self, key: &str) -> Result<String, AppError> {
        Ok(self
            .endpoint(&["public", &self.bucket, key])?
            .to_string())
    }
}

#[async_trait]
impl FileStore for SupabaseStorage {
    async fn list(&self) -> Result<Vec<FileAsset>, AppError> {
        let body = serde_json::json!({
            "prefix": "",
            "limit": LIST_LIMIT,
            "offset": 0,
            "sortBy": { "column": "created_at", "order": "desc" },
        });
        let resp = authed(
            self.client.post(self.endpoint(&["list", &self.bucket])?),
            &self.key,
        )
        .json(&body)
        .send()
        .await?;
        let objects: Vec<ListedObject> = check(resp, "list files")
            .await?
            .json()
            .await
            .map_err(|e| AppError::Parse(format!("list files response: {}", e)))?;

        let mut assets = Vec::with_capacity(objects.len());
        for object in objects.into_iter().filter(|o| o.id.is_some()) {
            let meta = object.metadata.unwrap_or_default();
            assets.push(FileAsset {
                id: object.name.clone(),
                url: self.public_url(&object.name)?,
                name: object.name,
                size: meta.size.unwrap_or(0),
                mime_type: meta.mimetype.unwrap_or_default(),
                uploaded_at: object.created_at.unwrap_or_default(),
            });
        }
        Ok(assets)
    }

    async fn put(
        &self,
        bytes: Vec<u8>,
        key: &str,
        mime_type: &str,
    ) -> Result<StoredObject, AppError> {
        let size = bytes.len();
        let resp = authed(
            self.client.post(self.endpoint(&[&self.bucket, key])?),
            &self.key,
        )
        .header("Content-Type", mime_type)
        .header("Cache-Control", "max-age=3600")
        .header("x-upsert", "false")
        .body(bytes)
        .send()
        .await?;
        check(resp, "upload file").await?;
        log::info!("Uploaded {} ({} bytes) to bucket {}", key, size, self.bucket);
        Ok(StoredObject {
            key: key.to_string(),
            url: self.public_url(key)?,
        })
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, AppError> {
        let resp = authed(
            self.client.get(self.endpoint(&[&self.bucket, key])?),
            &self.key,
        )
        .send()
        .await?;
        let bytes = check(resp, &format!("file {}", key)).await?.bytes().await?;
        Ok(bytes.to_vec())
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        let resp = authed(
            self.client.delete(self.endpoint(&[&self.bucket])?),
            &self.key,
        )
        .json(&serde_json::json!({ "prefixes": [key] }))
        .send()
        .await?;
        let removed: Vec<serde_json::Value> = check(resp, "delete file")
            .await?
            .json()
            .await
            .map_err(|e| AppError::Parse(format!("delete file response: {}", e)))?;
        if removed.is_empty() {
            return Err(AppError::NotFound(format!("file {}", key)));
        }
        log::info!("Deleted {} from bucket {}", key, self.bucket);
        Ok(())
    }
}
