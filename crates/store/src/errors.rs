//! Error types for the Ledgerdesk store
//!
//! Provides the failure taxonomy shared by every layer:
//! - Distinct error types for validation, missing records, and backend failures
//! - Remote-store error codes with HTTP status mapping
//! - Retryability classification for the transport layer
//! - A partial-cascade variant carrying the work completed before the failure

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using StoreError
pub type Result<T> = std::result::Result<T, StoreError>;

/// Machine-readable codes for remote document-store failures
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Backend temporarily unreachable or overloaded
    Unavailable,
    /// Caller lacks permission for the addressed path
    PermissionDenied,
    /// Quota or rate limit exhausted
    ResourceExhausted,
    /// Request rejected because the target is in the wrong state
    FailedPrecondition,
    /// Concurrent write conflict
    Conflict,
    /// Backend-side fault
    Internal,
    /// Anything the backend did not classify
    Unknown,
}

impl ErrorCode {
    /// Map an HTTP status from the store's REST surface onto a code
    pub fn from_http_status(status: u16) -> Self {
        match status {
            401 | 403 => ErrorCode::PermissionDenied,
            409 => ErrorCode::Conflict,
            412 | 400 => ErrorCode::FailedPrecondition,
            429 => ErrorCode::ResourceExhausted,
            500 | 502 | 504 => ErrorCode::Internal,
            503 => ErrorCode::Unavailable,
            _ => ErrorCode::Unknown,
        }
    }

    /// Whether a request failing with this code is worth retrying
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCode::Unavailable | ErrorCode::ResourceExhausted | ErrorCode::Internal
        )
    }
}

/// Store error types
#[derive(Error, Debug)]
pub enum StoreError {
    /// Input rejected before any I/O was attempted
    #[error("Validation failed for {field}: {message}")]
    Validation { field: String, message: String },

    /// A reference resolved to nothing
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// A path was used at the wrong parity (document op on a collection
    /// path or vice versa)
    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    /// The remote document store rejected or failed the call
    #[error("Store backend error ({code:?}): {message}")]
    Backend { code: ErrorCode, message: String },

    /// Batch exceeds the store's per-commit ceiling
    #[error("Batch of {size} operations exceeds the commit ceiling of {limit}")]
    BatchTooLarge { size: usize, limit: usize },

    /// Cascade delete removed descendants but the root record survived
    #[error(
        "Cascade delete left the client record in place after removing \
         {deleted_years} years, {deleted_documents} documents, \
         {deleted_generic} generic documents: {reason}"
    )]
    PartialCascade {
        deleted_years: usize,
        deleted_documents: usize,
        deleted_generic: usize,
        reason: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl StoreError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        StoreError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        StoreError::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn backend(code: ErrorCode, message: impl Into<String>) -> Self {
        StoreError::Backend {
            code,
            message: message.into(),
        }
    }

    /// Whether retrying the same call could reasonably succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Backend { code, .. } => code.is_retryable(),
            StoreError::Transport(err) => err.is_timeout() || err.is_connect(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(ErrorCode::from_http_status(503), ErrorCode::Unavailable);
        assert_eq!(ErrorCode::from_http_status(429), ErrorCode::ResourceExhausted);
        assert_eq!(ErrorCode::from_http_status(403), ErrorCode::PermissionDenied);
        assert_eq!(ErrorCode::from_http_status(418), ErrorCode::Unknown);
    }

    #[test]
    fn test_retryability() {
        assert!(StoreError::backend(ErrorCode::Unavailable, "down").is_retryable());
        assert!(!StoreError::backend(ErrorCode::PermissionDenied, "no").is_retryable());
        assert!(!StoreError::validation("contact", "too short").is_retryable());
        assert!(!StoreError::not_found("client", "123").is_retryable());
    }

    #[test]
    fn test_partial_cascade_message() {
        let err = StoreError::PartialCascade {
            deleted_years: 2,
            deleted_documents: 7,
            deleted_generic: 1,
            reason: "permission denied".into(),
        };
        let text = err.to_string();
        assert!(text.contains("2 years"));
        assert!(text.contains("7 documents"));
        assert!(text.contains("permission denied"));
    }
}
