// File service: validation and naming around the document bucket.

use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::error::AppError;
use crate::gateway::FileStore;
use crate::records::timestamp;
use crate::types::FileAsset;

pub const MAX_FILE_MB: u64 = 50;
const MAX_FILE_BYTES: u64 = MAX_FILE_MB * 1024 * 1024;

/// Accepted document types, keyed by extension.
const ALLOWED_TYPES: [(&str, &str); 7] = [
    ("ppt", "application/vnd.ms-powerpoint"),
    (
        "pptx",
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    ),
    ("pdf", "application/pdf"),
    ("doc", "application/msword"),
    (
        "docx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ),
    ("xls", "application/vnd.ms-excel"),
    (
        "xlsx",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    ),
];

const OCTET_STREAM: &str = "application/octet-stream";

fn stamp_suffix_regex() -> &'static Regex {
    static STAMP_SUFFIX_RE: OnceLock<Regex> = OnceLock::new();
    STAMP_SUFFIX_RE.get_or_init(|| {
        Regex::new(r"_\d+(\.[^.]+)?$").expect("stamp suffix regex should compile")
    })
}

/// Bytes and headers for a download response.
#[derive(Debug, Clone)]
pub struct Download {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub mime_type: String,
}

pub fn is_allowed_type(mime_type: &str) -> bool {
    ALLOWED_TYPES.iter().any(|(_, mime)| *mime == mime_type)
}

/// MIME type for a key, from its extension.
pub fn mime_for(key: &str) -> &'static str {
    let ext = key.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
    ALLOWED_TYPES
        .iter()
        .find(|(known, _)| Some(*known) == ext.as_deref())
        .map(|(_, mime)| *mime)
        .unwrap_or(OCTET_STREAM)
}

/// Storage key `{stem}_{unixMillis}.{ext}`, unique per upload instant.
pub fn storage_key(file_name: &str, now: DateTime<Utc>) -> String {
    let millis = now.timestamp_millis();
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{}_{}.{}", stem, millis, ext),
        _ => format!("{}_{}", file_name, millis),
    }
}

/// Strip the upload stamp from a storage key to get the name the user chose.
pub fn original_name(key: &str) -> String {
    stamp_suffix_regex().replace(key, "${1}").into_owned()
}

pub fn validate_upload(mime_type: &str, size: u64) -> Result<(), AppError> {
    if size > MAX_FILE_BYTES {
        return Err(AppError::FileTooLarge {
            size,
            limit_mb: MAX_FILE_MB,
        });
    }
    if !is_allowed_type(mime_type) {
        return Err(AppError::UnsupportedFileType(mime_type.to_string()));
    }
    Ok(())
}

pub struct FileService {
    store: Arc<dyn FileStore>,
}

impl FileService {
    pub fn new(store: Arc<dyn FileStore>) -> Self {
        Self { store }
    }

    /// Bucket contents with display names restored.
    pub async fn list(&self) -> Result<Vec<FileAsset>, AppError> {
        let mut files = self.store.list().await?;
        for file in &mut files {
            file.name = original_name(&file.id);
            if file.mime_type.is_empty() {
                file.mime_type = mime_for(&file.id).to_string();
            }
        }
        Ok(files)
    }

    pub async fn upload(
        &self,
        file_name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<FileAsset, AppError> {
        let file_name = file_name.trim();
        if file_name.is_empty() {
            return Err(AppError::InvalidInput("file name is empty".to_string()));
        }
        let size = bytes.len() as u64;
        validate_upload(mime_type, size)?;

        let now = Utc::now();
        let key = storage_key(file_name, now);
        let stored = self.store.put(bytes, &key, mime_type).await?;
        Ok(FileAsset {
            id: stored.key,
            name: file_name.to_string(),
            size,
            mime_type: mime_type.to_string(),
            url: stored.url,
            uploaded_at: timestamp(now),
        })
    }

    pub async fn download(&self, key: &str) -> Result<Download, AppError> {
        let bytes = self.store.get(key).await?;
        Ok(Download {
            bytes,
            file_name: original_name(key),
            mime_type: mime_for(key).to_string(),
        })
    }

    pub async fn delete(&self, key: &str) -> Result<(), AppError> {
        if key.trim().is_empty() {
            return Err(AppError::InvalidInput("fileId is required".to_string()));
        }
        self.store.delete(key).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::gateway::fakes::MemoryFiles;

    const PDF: &str = "application/pdf";

    #[test]
    fn key_embeds_upload_millis() {
        let now = Utc.with_ymd_and_hms(2023, 11, 14, 22, 13, 20).unwrap();
        assert_eq!(
            storage_key("weekly.report.pptx", now),
            "weekly.report_1700000000000.pptx"
        );
        assert_eq!(storage_key("README", now), "README_1700000000000");
    }

    #[test]
    fn original_name_strips_stamp() {
        assert_eq!(original_name("plan_1700000000000.pdf"), "plan.pdf");
        assert_eq!(original_name("plan_v2.pdf"), "plan_v2.pdf");
        assert_eq!(original_name("README_1700000000000"), "README");
    }

    #[test]
    fn oversize_and_unknown_types_are_rejected() {
        assert!(matches!(
            validate_upload(PDF, MAX_FILE_BYTES + 1),
            Err(AppError::FileTooLarge { limit_mb: 50, .. })
        ));
        assert!(matches!(
            validate_upload("image/png", 10),
            Err(AppError::UnsupportedFileType(_))
        ));
        assert!(validate_upload(PDF, MAX_FILE_BYTES).is_ok());
    }

    #[test]
    fn mime_follows_extension() {
        assert_eq!(mime_for("a_1.XLSX"), ALLOWED_TYPES[6].1);
        assert_eq!(mime_for("notes_1.txt"), OCTET_STREAM);
    }

    #[tokio::test]
    async fn upload_then_download_restores_name() {
        let svc = FileService::new(Arc::new(MemoryFiles::default()));
        let asset = svc.upload("plan.pdf", PDF, b"%PDF".to_vec()).await.unwrap();
        assert_eq!(asset.name, "plan.pdf");
        assert!(asset.id.starts_with("plan_"));
        assert_eq!(asset.size, 4);

        let listed = svc.list().await.unwrap();
        assert_eq!(listed[0].name, "plan.pdf");

        let download = svc.download(&asset.id).await.unwrap();
        assert_eq!(download.file_name, "plan.pdf");
        assert_eq!(download.mime_type, PDF);
        assert_eq!(download.bytes, b"%PDF");

        svc.delete(&asset.id).await.unwrap();
        assert!(matches!(
            svc.download(&asset.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn rejected_upload_stores_nothing() {
        let store = Arc::new(MemoryFiles::default());
        let svc = FileService::new(store.clone());
        assert!(svc.upload("x.png", "image/png", vec![1]).await.is_err());
        assert!(store.objects.lock().is_empty());
    }
}
