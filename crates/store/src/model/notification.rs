//! Notification entity
//!
//! Broadcast announcements stored per tenant. Delivery happens in an
//! external push layer; this record is only what that layer reads.

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::attachment::{BlobRef, FileAttachment};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub title: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<BlobRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_inline_data: Option<String>,
}

impl Notification {
    pub fn image(&self) -> Option<FileAttachment> {
        if let Some(blob) = &self.image_ref {
            return Some(FileAttachment::Blob(blob.clone()));
        }
        self.image_inline_data
            .clone()
            .map(FileAttachment::Inline)
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NotificationInput {
    #[validate(length(min = 1, max = 200))]
    pub title: String,

    #[validate(length(min = 1, max = 2000))]
    pub message: String,

    /// Optional image, inline or blob-backed
    pub image: Option<FileAttachment>,
}

impl NotificationInput {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        NotificationInput {
            title: title.into(),
            message: message.into(),
            image: None,
        }
    }

    pub fn with_image(mut self, image: FileAttachment) -> Self {
        self.image = Some(image);
        self
    }
}
