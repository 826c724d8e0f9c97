//! Canonical storage paths for the Ledgerdesk document store
//!
//! This module is the single source of truth for the hierarchy layout.
//! Every reference the rest of the crate builds goes through the types
//! here; no hardcoded path strings exist outside this module and the
//! reference builder on top of it.
//!
//! # Path Layout
//!
//! ```text
//! tenants/{tenantId}/                         # tenant supernode
//! ├── clients/{contact}/                      # one doc per client, keyed by contact
//! │   ├── years/{year}/                       # fiscal-year folder, e.g. 2024-25
//! │   │   └── documents/{docId}
//! │   └── genericDocuments/{docId}            # year-independent files
//! ├── notifications/{notificationId}
//! ├── banners/{bannerId}
//! └── adminDocs/{docId}/
//!     └── images/{imageId}
//! ```
//!
//! The legacy flat layout migrated away from lives under `users/{tenantId}`
//! with the same child shapes.
//!
//! A path with an even number of segments addresses a document, an odd
//! number a collection. That parity rule is load-bearing: every API in
//! the store checks it, so the constructors here never produce a path of
//! the wrong shape.

use std::fmt;
use std::sync::LazyLock;

use regex_lite::Regex;

use crate::errors::{Result, StoreError};

/// Root collection of the migrated supernode structure
pub const TENANT_ROOT: &str = "tenants";
/// Root collection of the legacy flat layout
pub const LEGACY_ROOT: &str = "users";

pub const CLIENTS: &str = "clients";
pub const YEARS: &str = "years";
pub const DOCUMENTS: &str = "documents";
pub const GENERIC_DOCUMENTS: &str = "genericDocuments";
pub const NOTIFICATIONS: &str = "notifications";
pub const BANNERS: &str = "banners";
pub const ADMIN_DOCS: &str = "adminDocs";
pub const IMAGES: &str = "images";

static YEAR_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}$").unwrap());

/// Tenant identifier: the account email with every `.` replaced by `_`
///
/// Document ids in the store cannot contain dots, so `a.b@x.com` becomes
/// `a_b@x_com`. The underscore form is what appears in paths and what
/// the migration runner accepts on the command line.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TenantId(String);

impl TenantId {
    /// Build a tenant id from a raw email address.
    pub fn from_email(raw: &str) -> Result<Self> {
        let email = raw.trim();
        let (local, domain) = email
            .split_once('@')
            .ok_or_else(|| StoreError::validation("email", "missing @"))?;
        if local.is_empty() || domain.is_empty() || !domain.contains('.') {
            return Err(StoreError::validation("email", "not a plausible address"));
        }
        if email.chars().any(|c| c.is_whitespace() || c == '/') {
            return Err(StoreError::validation("email", "contains forbidden characters"));
        }
        Ok(TenantId(email.replace('.', "_")))
    }

    /// Accept an already-sanitized id, e.g. from the migrator's argv.
    pub fn from_safe(safe: &str) -> Result<Self> {
        let safe = safe.trim();
        if safe.is_empty() {
            return Err(StoreError::validation("tenant", "empty id"));
        }
        if !safe.contains('@') {
            return Err(StoreError::validation("tenant", "not a sanitized email"));
        }
        if safe.contains(['.', '/']) || safe.chars().any(char::is_whitespace) {
            return Err(StoreError::validation("tenant", "contains unsanitized characters"));
        }
        Ok(TenantId(safe.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Client identity: a normalized 10-digit contact number
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContactNumber(String);

impl ContactNumber {
    /// Normalize and validate a contact number. Spaces and hyphens are
    /// stripped; exactly ten ASCII digits must remain.
    pub fn parse(raw: &str) -> Result<Self> {
        let digits: String = raw.chars().filter(|c| !matches!(c, ' ' | '-')).collect();
        if digits.len() != 10 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(StoreError::validation(
                "contact",
                format!("expected 10 digits, got {raw:?}"),
            ));
        }
        Ok(ContactNumber(digits))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContactNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fiscal-year label in `NNNN-NN` form, e.g. `2024-25`
///
/// The suffix must be the following calendar year's last two digits.
/// Labels are structural path segments, so malformed ones are rejected
/// before any I/O happens.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct YearLabel(String);

impl YearLabel {
    pub fn parse(raw: &str) -> Result<Self> {
        let label = raw.trim();
        if !YEAR_LABEL.is_match(label) {
            return Err(StoreError::validation(
                "year",
                format!("expected NNNN-NN, got {raw:?}"),
            ));
        }
        let start: u32 = label[..4]
            .parse()
            .map_err(|_| StoreError::validation("year", "unparseable start year"))?;
        let expected = format!("{:02}", (start + 1) % 100);
        if label[5..] != expected {
            return Err(StoreError::validation(
                "year",
                format!("suffix must be {expected} for start year {start}"),
            ));
        }
        Ok(YearLabel(label.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for YearLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A slash-joined sequence of non-empty segments addressing a document
/// (even count) or a collection (odd count) in the store
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorePath {
    segments: Vec<String>,
}

impl StorePath {
    pub fn from_segments<I, S>(segments: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            return Err(StoreError::InvalidReference("empty path".into()));
        }
        for seg in &segments {
            if seg.is_empty() || seg.contains('/') {
                return Err(StoreError::InvalidReference(format!(
                    "bad path segment {seg:?}"
                )));
            }
        }
        Ok(StorePath { segments })
    }

    /// Parse a `a/b/c` string into a path.
    pub fn parse(raw: &str) -> Result<Self> {
        Self::from_segments(raw.split('/').map(str::to_string))
    }

    /// Build from segments already validated by the caller. The typed
    /// reference layer uses this so navigation stays infallible.
    pub(crate) fn from_validated(segments: Vec<String>) -> Self {
        StorePath { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Even segment counts address documents.
    pub fn is_document(&self) -> bool {
        self.segments.len() % 2 == 0
    }

    /// Odd segment counts address collections.
    pub fn is_collection(&self) -> bool {
        !self.is_document()
    }

    /// Final segment: the document id for document paths, the collection
    /// name for collection paths.
    pub fn id(&self) -> &str {
        self.segments
            .last()
            .map(String::as_str)
            .unwrap_or_default()
    }

    pub fn parent(&self) -> Option<StorePath> {
        if self.segments.len() <= 1 {
            return None;
        }
        Some(StorePath {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    pub fn child(&self, segment: &str) -> Result<StorePath> {
        if segment.is_empty() || segment.contains('/') {
            return Err(StoreError::InvalidReference(format!(
                "bad path segment {segment:?}"
            )));
        }
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        Ok(StorePath { segments })
    }

    /// Whether `self` addresses something at or below `prefix`.
    pub fn starts_with(&self, prefix: &StorePath) -> bool {
        self.segments.len() >= prefix.segments.len()
            && self.segments[..prefix.segments.len()] == prefix.segments[..]
    }
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

/// Derive the canonical path for a tenant, or for one of its clients,
/// fiscal years, or documents.
///
/// Trailing arguments may be omitted for coarser references. Invalid or
/// missing required input yields `None`, never a panic: callers must
/// check before use. A deeper segment without its parent (a year without
/// a contact, a document without a year) also yields `None`.
pub fn resolve(
    tenant_email: &str,
    contact: Option<&str>,
    year: Option<&str>,
    document_id: Option<&str>,
) -> Option<StorePath> {
    let tenant = TenantId::from_email(tenant_email).ok()?;
    let mut segments = vec![TENANT_ROOT.to_string(), tenant.as_str().to_string()];

    match (contact, year, document_id) {
        (None, None, None) => {}
        (None, _, _) => return None,
        (Some(contact), year, document_id) => {
            let contact = ContactNumber::parse(contact).ok()?;
            segments.push(CLIENTS.to_string());
            segments.push(contact.as_str().to_string());
            match (year, document_id) {
                (None, None) => {}
                (None, Some(_)) => return None,
                (Some(year), document_id) => {
                    let year = YearLabel::parse(year).ok()?;
                    segments.push(YEARS.to_string());
                    segments.push(year.as_str().to_string());
                    if let Some(doc) = document_id {
                        if doc.is_empty() || doc.contains('/') {
                            return None;
                        }
                        segments.push(DOCUMENTS.to_string());
                        segments.push(doc.to_string());
                    }
                }
            }
        }
    }

    StorePath::from_segments(segments).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tenant_id_sanitizes_dots() {
        let id = TenantId::from_email("a.b@x.com").unwrap();
        assert_eq!(id.as_str(), "a_b@x_com");

        let id = TenantId::from_email("  plain@firm.example  ").unwrap();
        assert_eq!(id.as_str(), "plain@firm_example");
    }

    #[test]
    fn test_tenant_id_rejects_bad_emails() {
        assert!(TenantId::from_email("").is_err());
        assert!(TenantId::from_email("no-at-sign").is_err());
        assert!(TenantId::from_email("@x.com").is_err());
        assert!(TenantId::from_email("a@").is_err());
        assert!(TenantId::from_email("a@nodot").is_err());
        assert!(TenantId::from_email("a b@x.com").is_err());
    }

    #[test]
    fn test_tenant_id_from_safe() {
        assert!(TenantId::from_safe("a_b@x_com").is_ok());
        assert!(TenantId::from_safe("a.b@x.com").is_err());
        assert!(TenantId::from_safe("not-an-email").is_err());
        assert!(TenantId::from_safe("").is_err());
    }

    #[test]
    fn test_contact_normalization() {
        assert_eq!(ContactNumber::parse("98765 43210").unwrap().as_str(), "9876543210");
        assert_eq!(ContactNumber::parse("98765-43210").unwrap().as_str(), "9876543210");
        assert!(ContactNumber::parse("12345").is_err());
        assert!(ContactNumber::parse("98765432100").is_err());
        assert!(ContactNumber::parse("98765x3210").is_err());
    }

    #[test]
    fn test_year_label() {
        assert!(YearLabel::parse("2024-25").is_ok());
        assert!(YearLabel::parse("1999-00").is_ok());
        assert!(YearLabel::parse("2024-26").is_err());
        assert!(YearLabel::parse("2024").is_err());
        assert!(YearLabel::parse("2024-2025").is_err());
        assert!(YearLabel::parse("24-25").is_err());
    }

    #[test]
    fn test_store_path_parity() {
        let doc = StorePath::parse("tenants/a_b@x_com").unwrap();
        assert!(doc.is_document());
        let coll = StorePath::parse("tenants/a_b@x_com/clients").unwrap();
        assert!(coll.is_collection());
        assert_eq!(coll.parent().unwrap(), doc);
        assert_eq!(coll.id(), "clients");
    }

    #[test]
    fn test_store_path_rejects_bad_segments() {
        assert!(StorePath::parse("tenants//clients").is_err());
        assert!(StorePath::from_segments(Vec::<String>::new()).is_err());
        let base = StorePath::parse("tenants/t@x_com").unwrap();
        assert!(base.child("a/b").is_err());
    }

    #[test]
    fn test_resolve_full_chain() {
        let path = resolve("a.b@x.com", Some("9876543210"), Some("2024-25"), Some("doc1"))
            .unwrap();
        assert_eq!(
            path.to_string(),
            "tenants/a_b@x_com/clients/9876543210/years/2024-25/documents/doc1"
        );
        assert!(path.is_document());
    }

    #[test]
    fn test_resolve_prefixes_keep_parity() {
        let tenant = resolve("a.b@x.com", None, None, None).unwrap();
        assert_eq!(tenant.len(), 2);
        assert!(tenant.is_document());

        let client = resolve("a.b@x.com", Some("9876543210"), None, None).unwrap();
        assert_eq!(client.len(), 4);
        assert!(client.is_document());

        let year = resolve("a.b@x.com", Some("9876543210"), Some("2024-25"), None).unwrap();
        assert_eq!(year.len(), 6);
        assert!(year.is_document());
    }

    #[test]
    fn test_resolve_requires_parents() {
        assert!(resolve("a.b@x.com", None, Some("2024-25"), None).is_none());
        assert!(resolve("a.b@x.com", None, None, Some("doc1")).is_none());
        assert!(resolve("a.b@x.com", Some("9876543210"), None, Some("doc1")).is_none());
        assert!(resolve("bad-email", Some("9876543210"), None, None).is_none());
        assert!(resolve("a.b@x.com", Some("123"), None, None).is_none());
        assert!(resolve("a.b@x.com", Some("9876543210"), Some("24-25"), None).is_none());
    }
}
