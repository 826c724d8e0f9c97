//! File payload shapes shared by documents and notification images

use serde::{Deserialize, Serialize};

/// Pointer to an externally stored blob. Both fields are opaque here:
/// this layer never performs blob I/O.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobRef {
    /// Download URL
    pub url: String,
    /// Storage path the blob lives under
    pub path: String,
}

/// A file payload is carried one of two ways: inline base64 for small
/// files, or a reference into blob storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FileAttachment {
    Blob(BlobRef),
    Inline(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_attachment_wire_shapes() {
        let blob: FileAttachment =
            serde_json::from_value(json!({"url": "https://cdn/x", "path": "docs/x"})).unwrap();
        assert!(matches!(blob, FileAttachment::Blob(_)));

        let inline: FileAttachment = serde_json::from_value(json!("aGVsbG8=")).unwrap();
        assert!(matches!(inline, FileAttachment::Inline(_)));
    }
}
