//! Boundary to the hosted backend.
//!
//! Each method is exactly one remote call: no retry, no batching. Callers
//! decide what a failure means.

use async_trait::async_trait;

use crate::error::AppError;
use crate::records::Record;
use crate::types::{FileAsset, StoredObject};

/// The managed record table.
#[async_trait]
pub trait RecordGateway: Send + Sync {
    /// All rows, newest first.
    async fn list(&self) -> Result<Vec<Record>, AppError>;
    async fn create(&self, record: &Record) -> Result<Record, AppError>;
    /// Replace every mutable column of row `id`.
    async fn update(&self, id: &str, record: &Record) -> Result<Record, AppError>;
    async fn delete(&self, id: &str) -> Result<(), AppError>;
}

/// The managed object-storage bucket.
#[async_trait]
pub trait FileStore: Send + Sync {
    async fn list(&self) -> Result<Vec<FileAsset>, AppError>;
    async fn put(&self, bytes: Vec<u8>, key: &str, mime_type: &str)
        -> Result<StoredObject, AppError>;
    async fn get(&self, key: &str) -> Result<Vec<u8>, AppError>;
    async fn delete(&self, key: &str) -> Result<(), AppError>;
}

/// Stand-in used when no backend credentials are configured. Every call
/// fails with `NotConfigured` so the HTTP layer can say what to set.
pub struct Unconfigured {
    reason: String,
}

impl Unconfigured {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn fail<T>(&self) -> Result<T, AppError> {
        Err(AppError::NotConfigured(self.reason.clone()))
    }
}

#[async_trait]
impl RecordGateway for Unconfigured {
    async fn list(&self) -> Result<Vec<Record>, AppError> {
        self.fail()
    }

    async fn create(&self, _record: &Record) -> Result<Record, AppError> {
        self.fail()
    }

    async fn update(&self, _id: &str, _record: &Record) -> Result<Record, AppError> {
        self.fail()
    }

    async fn delete(&self, _id: &str) -> Result<(), AppError> {
        self.fail()
    }
}

#[async_trait]
impl FileStore for Unconfigured {
    async fn list(&self) -> Result<Vec<FileAsset>, AppError> {
        self.fail()
    }

    async fn put(&self, _bytes: Vec<u8>, _key: &str, _mime_type: &str)
        -> Result<StoredObject, AppError> {
        self.fail()
    }

    async fn get(&self, _key: &str) -> Result<Vec<u8>, AppError> {
        self.fail()
    }

    async fn delete(&self, _key: &str) -> Result<(), AppError> {
        self.fail()
    }
}
