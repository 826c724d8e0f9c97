//! Document entity
//!
//! One record per uploaded file. Year-scoped documents carry the parent
//! year's label in `year`; generic documents leave it unset. The file
//! payload is either inline base64 (`fileInlineData`) or a blob
//! reference (`fileRef`), never both.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::attachment::{BlobRef, FileAttachment};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    pub name: String,
    pub file_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_ref: Option<BlobRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_inline_data: Option<String>,
    /// Label of the owning fiscal year; `None` for generic documents
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

impl DocumentRecord {
    /// The payload view. Prefers the blob reference if a corrupt record
    /// somehow carries both forms.
    pub fn attachment(&self) -> Option<FileAttachment> {
        if let Some(blob) = &self.file_ref {
            return Some(FileAttachment::Blob(blob.clone()));
        }
        self.file_inline_data
            .clone()
            .map(FileAttachment::Inline)
    }
}

/// Upload request: the attachment enum makes exactly one payload form
/// present by construction.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DocumentInput {
    #[validate(length(min = 1, max = 300))]
    pub name: String,

    #[validate(length(min = 1, max = 300))]
    pub file_name: String,

    pub file: FileAttachment,
}

impl DocumentInput {
    pub fn inline(
        name: impl Into<String>,
        file_name: impl Into<String>,
        data: impl Into<String>,
    ) -> Self {
        DocumentInput {
            name: name.into(),
            file_name: file_name.into(),
            file: FileAttachment::Inline(data.into()),
        }
    }

    pub fn blob(
        name: impl Into<String>,
        file_name: impl Into<String>,
        blob: BlobRef,
    ) -> Self {
        DocumentInput {
            name: name.into(),
            file_name: file_name.into(),
            file: FileAttachment::Blob(blob),
        }
    }
}
