//! Error types for record, file and reminder operations
//!
//! Errors are classified by recoverability:
//! - Retryable: Network issues, timeouts, upstream 5xx
//! - NonRetryable: Validation failures, missing rows/files, bad input
//! - RequiresUserAction: Missing or rejected backend credentials

use serde::Serialize;
use thiserror::Error;

use crate::types::FieldError;

/// Error types surfaced by the services and the HTTP layer
#[derive(Debug, Error)]
pub enum AppError {
    // Retryable errors
    #[error("Network error: {0}")]
    Network(String),

    #[error("Backend returned {status}: {body}")]
    Upstream { status: u16, body: String },

    // Non-retryable errors
    #[error("{} required field(s) missing", .0.len())]
    Validation(Vec<FieldError>),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    InvalidInput(String),

    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("File exceeds the {limit_mb}MB limit ({size} bytes)")]
    FileTooLarge { size: u64, limit_mb: u64 },

    #[error("Invalid cron expression '{expr}': {reason}")]
    InvalidCron { expr: String, reason: String },

    #[error("Failed to parse backend response: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(String),

    // Requires user action
    #[error("Backend is not configured: {0}")]
    NotConfigured(String),

    #[error("Backend rejected the credentials ({0})")]
    Unauthorized(u16),
}

impl AppError {
    /// Returns true if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Network(_) => true,
            AppError::Upstream { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Returns true if this error requires user action to resolve
    pub fn requires_user_action(&self) -> bool {
        matches!(
            self,
            AppError::NotConfigured(_) | AppError::Unauthorized(_)
        )
    }

    /// Get a user-friendly recovery suggestion
    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            AppError::Network(_) => "Check your network connection and try again.",
            AppError::Upstream { .. } => "The backend reported an error. Try again shortly.",
            AppError::Validation(_) => "Fill in the highlighted required fields.",
            AppError::NotFound(_) => "Refresh the list; the item may have been removed.",
            AppError::InvalidInput(_) => "Check the submitted values.",
            AppError::UnsupportedFileType(_) => {
                "Upload a PowerPoint, PDF, Word or Excel document."
            }
            AppError::FileTooLarge { .. } => "Upload a file smaller than 50MB.",
            AppError::InvalidCron { .. } => {
                "Use a 5-field cron expression: minute hour day month weekday."
            }
            AppError::Parse(_) => "Check the backend table schema.",
            AppError::Io(_) => "Check file permissions and disk space.",
            AppError::NotConfigured(_) => {
                "Set supabase.url and supabase.key in ~/.smledger/config.json, or SUPABASE_URL and SUPABASE_SERVICE_ROLE_KEY."
            }
            AppError::Unauthorized(_) => "Check the Supabase service key.",
        }
    }

    /// HTTP status the error maps to.
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::Validation(_)
            | AppError::InvalidInput(_)
            | AppError::UnsupportedFileType(_)
            | AppError::FileTooLarge { .. }
            | AppError::InvalidCron { .. } => 400,
            AppError::NotFound(_) => 404,
            AppError::Network(_) | AppError::Upstream { .. } | AppError::Parse(_) => 502,
            AppError::Unauthorized(_) | AppError::NotConfigured(_) => 503,
            AppError::Io(_) => 500,
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AppError::Parse(err.to_string())
        } else {
            AppError::Network(err.to_string())
        }
    }
}

/// Serializable error representation for HTTP responses
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    pub message: String,
    pub error_type: ErrorType,
    pub can_retry: bool,
    pub recovery_suggestion: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorType {
    Retryable,
    NonRetryable,
    RequiresUserAction,
}

impl From<&AppError> for ApiError {
    fn from(err: &AppError) -> Self {
        let error_type = if err.requires_user_action() {
            ErrorType::RequiresUserAction
        } else if err.is_retryable() {
            ErrorType::Retryable
        } else {
            ErrorType::NonRetryable
        };

        let fields = match err {
            AppError::Validation(fields) => fields.clone(),
            _ => Vec::new(),
        };

        ApiError {
            message: err.to_string(),
            error_type,
            can_retry: err.is_retryable(),
            recovery_suggestion: err.recovery_suggestion().to_string(),
            fields,
        }
    }
}
