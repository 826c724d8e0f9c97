//! Typed references into the tenant hierarchy
//!
//! Provides:
//! - `RefBuilder`, bound to one tenant and one root (supernode or legacy)
//! - One newtype per hierarchy level, so a function that needs a year
//!   document cannot be handed a clients collection
//! - Raw-string conveniences that propagate `None` instead of failing,
//!   for callers holding unvalidated input
//!
//! Parity is guaranteed by construction: a `*Ref` ending in an id wraps a
//! document path (even segments), the collection newtypes wrap odd ones.

use std::fmt;

use crate::errors::Result;
use crate::path::{
    self, ContactNumber, StorePath, TenantId, YearLabel, ADMIN_DOCS, BANNERS, CLIENTS, DOCUMENTS,
    GENERIC_DOCUMENTS, IMAGES, NOTIFICATIONS, YEARS,
};

macro_rules! path_ref {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub struct $name(StorePath);

        impl $name {
            pub fn path(&self) -> &StorePath {
                &self.0
            }

            pub fn into_path(self) -> StorePath {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

path_ref!(
    /// Document ref: `{root}/{tenantId}`
    TenantRef
);
path_ref!(
    /// Collection ref: `{root}/{tenantId}/clients`
    ClientsRef
);
path_ref!(
    /// Document ref: `{root}/{tenantId}/clients/{contact}`
    ClientRef
);
path_ref!(
    /// Collection ref: `.../clients/{contact}/years`
    YearsRef
);
path_ref!(
    /// Document ref: `.../years/{year}`
    YearRef
);
path_ref!(
    /// Collection ref: `.../years/{year}/documents`
    DocumentsRef
);
path_ref!(
    /// Document ref: `.../documents/{docId}` (also generic documents)
    DocumentRef
);
path_ref!(
    /// Collection ref: `.../clients/{contact}/genericDocuments`
    GenericDocumentsRef
);
path_ref!(
    /// Collection ref: `{root}/{tenantId}/notifications`
    NotificationsRef
);
path_ref!(
    /// Document ref: `.../notifications/{notificationId}`
    NotificationRef
);

impl TenantRef {
    pub fn clients(&self) -> ClientsRef {
        ClientsRef(extend(&self.0, &[CLIENTS]))
    }

    pub fn notifications(&self) -> NotificationsRef {
        NotificationsRef(extend(&self.0, &[NOTIFICATIONS]))
    }

    /// Migration-only collections are addressed as plain paths.
    pub fn banners(&self) -> StorePath {
        extend(&self.0, &[BANNERS])
    }

    pub fn admin_docs(&self) -> StorePath {
        extend(&self.0, &[ADMIN_DOCS])
    }

    /// Images nested under one admin document.
    pub fn admin_doc_images(&self, admin_doc_id: &str) -> Result<StorePath> {
        self.admin_docs().child(admin_doc_id)?.child(IMAGES)
    }
}

impl ClientsRef {
    pub fn client(&self, contact: &ContactNumber) -> ClientRef {
        ClientRef(extend(&self.0, &[contact.as_str()]))
    }
}

impl ClientRef {
    /// The contact number segment this ref is keyed by.
    pub fn contact(&self) -> &str {
        self.0.id()
    }

    pub fn years(&self) -> YearsRef {
        YearsRef(extend(&self.0, &[YEARS]))
    }

    pub fn year(&self, label: &YearLabel) -> YearRef {
        self.years().year(label)
    }

    pub fn generic_documents(&self) -> GenericDocumentsRef {
        GenericDocumentsRef(extend(&self.0, &[GENERIC_DOCUMENTS]))
    }
}

impl YearsRef {
    pub fn year(&self, label: &YearLabel) -> YearRef {
        YearRef(extend(&self.0, &[label.as_str()]))
    }
}

impl YearRef {
    /// The fiscal-year label segment.
    pub fn label(&self) -> &str {
        self.0.id()
    }

    pub fn documents(&self) -> DocumentsRef {
        DocumentsRef(extend(&self.0, &[DOCUMENTS]))
    }

    pub fn document(&self, id: &str) -> Result<DocumentRef> {
        self.documents().document(id)
    }
}

impl DocumentsRef {
    pub fn document(&self, id: &str) -> Result<DocumentRef> {
        Ok(DocumentRef(self.0.child(id)?))
    }
}

impl GenericDocumentsRef {
    pub fn document(&self, id: &str) -> Result<DocumentRef> {
        Ok(DocumentRef(self.0.child(id)?))
    }
}

impl NotificationsRef {
    pub fn notification(&self, id: &str) -> Result<NotificationRef> {
        Ok(NotificationRef(self.0.child(id)?))
    }
}

/// Builds references for one tenant against one hierarchy root.
#[derive(Debug, Clone)]
pub struct RefBuilder {
    root: &'static str,
    tenant: TenantId,
}

impl RefBuilder {
    /// References under the migrated supernode structure (`tenants/...`).
    pub fn supernode(tenant: TenantId) -> Self {
        RefBuilder {
            root: path::TENANT_ROOT,
            tenant,
        }
    }

    /// References under the legacy flat layout (`users/...`). Used by the
    /// migration engine and the cascade engine's legacy re-delete.
    pub fn legacy(tenant: TenantId) -> Self {
        RefBuilder {
            root: path::LEGACY_ROOT,
            tenant,
        }
    }

    /// Supernode builder from a raw email; `None` when the email is not
    /// a plausible address.
    pub fn try_from_email(raw_email: &str) -> Option<Self> {
        TenantId::from_email(raw_email).ok().map(Self::supernode)
    }

    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant
    }

    pub fn tenant(&self) -> TenantRef {
        TenantRef(StorePath::from_validated(vec![
            self.root.to_string(),
            self.tenant.as_str().to_string(),
        ]))
    }

    pub fn clients(&self) -> ClientsRef {
        self.tenant().clients()
    }

    pub fn client(&self, contact: &ContactNumber) -> ClientRef {
        self.clients().client(contact)
    }

    pub fn years(&self, contact: &ContactNumber) -> YearsRef {
        self.client(contact).years()
    }

    pub fn year(&self, contact: &ContactNumber, label: &YearLabel) -> YearRef {
        self.client(contact).year(label)
    }

    pub fn documents(&self, contact: &ContactNumber, label: &YearLabel) -> DocumentsRef {
        self.year(contact, label).documents()
    }

    pub fn generic_documents(&self, contact: &ContactNumber) -> GenericDocumentsRef {
        self.client(contact).generic_documents()
    }

    pub fn notifications(&self) -> NotificationsRef {
        self.tenant().notifications()
    }

    /// Client ref from an unvalidated contact string; `None` on bad input.
    pub fn client_raw(&self, raw_contact: &str) -> Option<ClientRef> {
        let contact = ContactNumber::parse(raw_contact).ok()?;
        Some(self.client(&contact))
    }

    /// Year ref from unvalidated strings; `None` on bad input.
    pub fn year_raw(&self, raw_contact: &str, raw_label: &str) -> Option<YearRef> {
        let contact = ContactNumber::parse(raw_contact).ok()?;
        let label = YearLabel::parse(raw_label).ok()?;
        Some(self.year(&contact, &label))
    }
}

fn extend(base: &StorePath, extra: &[&str]) -> StorePath {
    let mut segments: Vec<String> = base.segments().to_vec();
    segments.extend(extra.iter().map(|s| s.to_string()));
    StorePath::from_validated(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> RefBuilder {
        RefBuilder::supernode(TenantId::from_email("a.b@x.com").unwrap())
    }

    #[test]
    fn test_every_level_has_the_right_parity() {
        let refs = builder();
        let contact = ContactNumber::parse("9876543210").unwrap();
        let label = YearLabel::parse("2024-25").unwrap();

        assert!(refs.tenant().path().is_document());
        assert!(refs.clients().path().is_collection());
        assert!(refs.client(&contact).path().is_document());
        assert!(refs.years(&contact).path().is_collection());
        assert!(refs.year(&contact, &label).path().is_document());
        assert!(refs.documents(&contact, &label).path().is_collection());
        assert!(refs
            .documents(&contact, &label)
            .document("d1")
            .unwrap()
            .path()
            .is_document());
        assert!(refs.generic_documents(&contact).path().is_collection());
        assert!(refs.notifications().path().is_collection());
        assert!(refs.notifications().notification("n1").unwrap().path().is_document());
        assert!(refs.tenant().banners().is_collection());
        assert!(refs.tenant().admin_docs().is_collection());
        assert!(refs.tenant().admin_doc_images("ad1").unwrap().is_collection());
    }

    #[test]
    fn test_supernode_and_legacy_roots() {
        let tenant = TenantId::from_email("a.b@x.com").unwrap();
        let contact = ContactNumber::parse("9876543210").unwrap();

        let new = RefBuilder::supernode(tenant.clone()).client(&contact);
        assert_eq!(new.to_string(), "tenants/a_b@x_com/clients/9876543210");

        let old = RefBuilder::legacy(tenant).client(&contact);
        assert_eq!(old.to_string(), "users/a_b@x_com/clients/9876543210");
        assert_eq!(old.contact(), "9876543210");
    }

    #[test]
    fn test_raw_conveniences_propagate_none() {
        assert!(RefBuilder::try_from_email("not-an-email").is_none());

        let refs = builder();
        assert!(refs.client_raw("123").is_none());
        assert!(refs.year_raw("9876543210", "24-25").is_none());
        assert!(refs.year_raw("9876543210", "2024-25").is_some());
    }

    #[test]
    fn test_document_ids_are_checked() {
        let refs = builder();
        let contact = ContactNumber::parse("9876543210").unwrap();
        let label = YearLabel::parse("2024-25").unwrap();
        assert!(refs.documents(&contact, &label).document("a/b").is_err());
        assert!(refs.notifications().notification("").is_err());
    }
}
