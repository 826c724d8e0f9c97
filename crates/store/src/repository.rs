//! Tenant-scoped CRUD orchestration
//!
//! Provides:
//! - Profile, client, year, document and notification operations over any
//!   `DocumentStore`
//! - The identity rules of the hierarchy: clients keyed by normalized
//!   contact number, years by label, both sides of the client/year link
//!   maintained on every year mutation
//! - The push contract: recipient listing and stale-token pruning
//!
//! Validation happens here, before any I/O. Counter bumps ride on
//! document mutations fire-and-forget; a bump failure never fails the
//! upload or delete that triggered it.

use std::sync::Arc;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{info, warn};
use validator::Validate;

use crate::counter::CounterAggregator;
use crate::errors::{Result, StoreError};
use crate::model::{
    Client, ClientInput, DocumentInput, DocumentRecord, FiscalYear, FileAttachment, Notification,
    NotificationInput, TenantProfile,
};
use crate::path::{ContactNumber, TenantId, YearLabel};
use crate::push::DeliveryFailure;
use crate::refs::RefBuilder;
use crate::store::{
    to_document_data, DocumentStore, ListFilter, Patch, StoredDocument, WriteMode,
};

/// High-level operations over one document store.
#[derive(Clone)]
pub struct Repository {
    store: Arc<dyn DocumentStore>,
    counters: CounterAggregator,
}

impl Repository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        let counters = CounterAggregator::new(Arc::clone(&store));
        Repository { store, counters }
    }

    fn refs(&self, tenant: &TenantId) -> RefBuilder {
        RefBuilder::supernode(tenant.clone())
    }

    // ---- Tenant profile ----

    /// Create the tenant's supernode document if it does not exist yet.
    /// The display name defaults to the local part of the email.
    pub async fn ensure_profile(&self, raw_email: &str) -> Result<TenantProfile> {
        let tenant = TenantId::from_email(raw_email)?;
        let refs = self.refs(&tenant);

        if let Some(doc) = self.store.get(refs.tenant().path()).await? {
            if let Ok(profile) = doc.decode::<TenantProfile>() {
                return Ok(profile);
            }
        }

        let profile = TenantProfile::from_safe_email(tenant.as_str());
        self.store
            .set(refs.tenant().path(), to_document_data(&profile)?, WriteMode::Merge)
            .await?;
        info!(tenant = %tenant, "Created tenant profile");
        Ok(profile)
    }

    pub async fn get_profile(&self, tenant: &TenantId) -> Result<Option<TenantProfile>> {
        match self.store.get(self.refs(tenant).tenant().path()).await? {
            Some(doc) => Ok(Some(doc.decode()?)),
            None => Ok(None),
        }
    }

    // ---- Clients ----

    /// Create or update a client. The contact number is the identity:
    /// submitting the same contact again replaces every field except the
    /// year list. Optionals left out of the submission are cleared, not
    /// carried over from the stored record.
    pub async fn upsert_client(&self, tenant: &TenantId, input: ClientInput) -> Result<Client> {
        validated(&input)?;
        let contact = ContactNumber::parse(&input.contact)?;
        let client_ref = self.refs(tenant).client(&contact);

        let client = Client {
            name: input.name,
            contact: contact.as_str().to_string(),
            pan: input.pan,
            email: input.email,
            is_active: input.is_active,
            years: Default::default(),
            push_token: input.push_token,
        };

        // The year list belongs to year mutations; a merge write without
        // the field leaves it untouched. Omitted optionals go out as
        // explicit nulls so the merge clears them instead of keeping a
        // value from an earlier submission.
        let mut data = to_document_data(&client)?;
        data.remove("years");
        for field in ["email", "pushToken"] {
            data.entry(field).or_insert(Value::Null);
        }
        self.store
            .set(client_ref.path(), data, WriteMode::Merge)
            .await?;
        info!(client = %client_ref, "Upserted client");

        match self.store.get(client_ref.path()).await? {
            Some(doc) => doc.decode(),
            None => Ok(client),
        }
    }

    pub async fn get_client(&self, tenant: &TenantId, contact: &ContactNumber) -> Result<Client> {
        let client_ref = self.refs(tenant).client(contact);
        match self.store.get(client_ref.path()).await? {
            Some(doc) => doc.decode(),
            None => Err(StoreError::not_found("client", contact.as_str())),
        }
    }

    /// All clients of a tenant, sorted by contact number. Filtering on
    /// activity happens after decode so records predating the flag count
    /// as active, same as they decode.
    pub async fn list_clients(&self, tenant: &TenantId, only_active: bool) -> Result<Vec<Client>> {
        let docs = self
            .store
            .list(self.refs(tenant).clients().path(), None)
            .await?;
        let mut clients: Vec<Client> = decode_all(docs, "client")
            .into_iter()
            .map(|(_, client)| client)
            .collect();
        if only_active {
            clients.retain(|client| client.is_active);
        }
        Ok(clients)
    }

    pub async fn set_client_active(
        &self,
        tenant: &TenantId,
        contact: &ContactNumber,
        active: bool,
    ) -> Result<()> {
        let client_ref = self.refs(tenant).client(contact);
        self.store
            .update(client_ref.path(), Patch::new().set("isActive", Value::Bool(active)))
            .await
    }

    // ---- Fiscal years ----

    /// Create a fiscal year under a client and link its label into the
    /// client's year list. Re-adding an existing year repairs the link
    /// and leaves the year document untouched.
    pub async fn add_year(
        &self,
        tenant: &TenantId,
        contact: &ContactNumber,
        label: &YearLabel,
    ) -> Result<FiscalYear> {
        let refs = self.refs(tenant);

        // Linking first also proves the client exists.
        let link = Patch::new().array_union("years", vec![Value::from(label.as_str())]);
        self.store.update(refs.client(contact).path(), link).await?;

        let year_ref = refs.year(contact, label);
        if let Some(existing) = self.store.get(year_ref.path()).await? {
            return existing.decode();
        }

        let year = FiscalYear::new();
        self.store
            .set(year_ref.path(), to_document_data(&year)?, WriteMode::Overwrite)
            .await?;
        info!(year = %year_ref, "Created fiscal year");
        Ok(year)
    }

    /// Year label / body pairs, sorted by label.
    pub async fn list_years(
        &self,
        tenant: &TenantId,
        contact: &ContactNumber,
    ) -> Result<Vec<(String, FiscalYear)>> {
        let docs = self
            .store
            .list(self.refs(tenant).years(contact).path(), None)
            .await?;
        Ok(decode_all(docs, "year"))
    }

    // ---- Documents ----

    /// Store an uploaded file's record under a year and bump the year's
    /// counter. The year must exist; the record's `year` field is set
    /// from the target label.
    pub async fn upload_document(
        &self,
        tenant: &TenantId,
        contact: &ContactNumber,
        year: &YearLabel,
        input: DocumentInput,
    ) -> Result<(String, DocumentRecord)> {
        validated(&input)?;
        let year_ref = self.refs(tenant).year(contact, year);
        if self.store.get(year_ref.path()).await?.is_none() {
            return Err(StoreError::not_found("year", year.as_str()));
        }

        let record = build_record(input, Some(year.as_str().to_string()));
        let id = self
            .store
            .create(year_ref.documents().path(), to_document_data(&record)?)
            .await?;
        self.counters.on_document_created(&year_ref).await;
        info!(document = %id, year = %year_ref, "Uploaded document");
        Ok((id, record))
    }

    pub async fn list_documents(
        &self,
        tenant: &TenantId,
        contact: &ContactNumber,
        year: &YearLabel,
    ) -> Result<Vec<(String, DocumentRecord)>> {
        let docs = self
            .store
            .list(self.refs(tenant).documents(contact, year).path(), None)
            .await?;
        Ok(decode_all(docs, "document"))
    }

    pub async fn get_document(
        &self,
        tenant: &TenantId,
        contact: &ContactNumber,
        year: &YearLabel,
        id: &str,
    ) -> Result<DocumentRecord> {
        let doc_ref = self.refs(tenant).year(contact, year).document(id)?;
        match self.store.get(doc_ref.path()).await? {
            Some(doc) => doc.decode(),
            None => Err(StoreError::not_found("document", id)),
        }
    }

    /// Delete one document and drop the year's counter. Deleting a
    /// document that is already gone is a no-op and does not touch the
    /// counter.
    pub async fn delete_document(
        &self,
        tenant: &TenantId,
        contact: &ContactNumber,
        year: &YearLabel,
        id: &str,
    ) -> Result<()> {
        let year_ref = self.refs(tenant).year(contact, year);
        let doc_ref = year_ref.document(id)?;
        if self.store.get(doc_ref.path()).await?.is_none() {
            return Ok(());
        }

        self.store.delete(doc_ref.path()).await?;
        self.counters.on_document_deleted(&year_ref).await;
        info!(document = %id, year = %year_ref, "Deleted document");
        Ok(())
    }

    // ---- Generic documents (client-scoped, no year, no counter) ----

    pub async fn upload_generic_document(
        &self,
        tenant: &TenantId,
        contact: &ContactNumber,
        input: DocumentInput,
    ) -> Result<(String, DocumentRecord)> {
        validated(&input)?;
        let refs = self.refs(tenant);
        if self.store.get(refs.client(contact).path()).await?.is_none() {
            return Err(StoreError::not_found("client", contact.as_str()));
        }

        let record = build_record(input, None);
        let id = self
            .store
            .create(refs.generic_documents(contact).path(), to_document_data(&record)?)
            .await?;
        info!(document = %id, client = %contact.as_str(), "Uploaded generic document");
        Ok((id, record))
    }

    pub async fn list_generic_documents(
        &self,
        tenant: &TenantId,
        contact: &ContactNumber,
    ) -> Result<Vec<(String, DocumentRecord)>> {
        let docs = self
            .store
            .list(self.refs(tenant).generic_documents(contact).path(), None)
            .await?;
        Ok(decode_all(docs, "document"))
    }

    pub async fn delete_generic_document(
        &self,
        tenant: &TenantId,
        contact: &ContactNumber,
        id: &str,
    ) -> Result<()> {
        let doc_ref = self.refs(tenant).generic_documents(contact).document(id)?;
        self.store.delete(doc_ref.path()).await
    }

    // ---- Notifications ----

    pub async fn create_notification(
        &self,
        tenant: &TenantId,
        input: NotificationInput,
    ) -> Result<(String, Notification)> {
        validated(&input)?;
        let (image_ref, image_inline_data) = match input.image {
            Some(FileAttachment::Blob(blob)) => (Some(blob), None),
            Some(FileAttachment::Inline(data)) => (None, Some(data)),
            None => (None, None),
        };
        let notification = Notification {
            title: input.title,
            message: input.message,
            image_ref,
            image_inline_data,
        };

        let id = self
            .store
            .create(
                self.refs(tenant).notifications().path(),
                to_document_data(&notification)?,
            )
            .await?;
        info!(notification = %id, tenant = %tenant, "Created notification");
        Ok((id, notification))
    }

    /// Newest first.
    pub async fn list_notifications(
        &self,
        tenant: &TenantId,
    ) -> Result<Vec<(String, Notification)>> {
        let filter = ListFilter::default().order_by_desc("createdAt");
        let docs = self
            .store
            .list(self.refs(tenant).notifications().path(), Some(filter))
            .await?;
        Ok(decode_all(docs, "notification"))
    }

    pub async fn delete_notification(&self, tenant: &TenantId, id: &str) -> Result<()> {
        let doc_ref = self.refs(tenant).notifications().notification(id)?;
        self.store.delete(doc_ref.path()).await
    }

    // ---- Push contract ----

    /// Active clients that can actually receive a push.
    pub async fn clients_for_broadcast(&self, tenant: &TenantId) -> Result<Vec<Client>> {
        let mut clients = self.list_clients(tenant, true).await?;
        clients.retain(|client| client.push_token.is_some());
        Ok(clients)
    }

    /// Clear one client's push token. A client that is already gone
    /// counts as cleared.
    pub async fn remove_push_token(
        &self,
        tenant: &TenantId,
        contact: &ContactNumber,
    ) -> Result<()> {
        let client_ref = self.refs(tenant).client(contact);
        let patch = Patch::new().set("pushToken", Value::Null);
        match self.store.update(client_ref.path(), patch).await {
            Ok(()) | Err(StoreError::NotFound { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Drop tokens the push service reported as dead. Failure codes that
    /// may be transient leave the token in place. Returns how many tokens
    /// were cleared.
    pub async fn prune_stale_tokens(
        &self,
        tenant: &TenantId,
        failures: &[DeliveryFailure],
    ) -> usize {
        let mut pruned = 0;

        for failure in failures {
            if !failure.code.should_prune() {
                continue;
            }
            let contact = match ContactNumber::parse(&failure.contact) {
                Ok(contact) => contact,
                Err(e) => {
                    warn!(contact = %failure.contact, error = %e, "Ignoring failure report for malformed contact");
                    continue;
                }
            };
            match self.remove_push_token(tenant, &contact).await {
                Ok(()) => pruned += 1,
                Err(e) => {
                    warn!(contact = %contact.as_str(), error = %e, "Failed to prune push token");
                }
            }
        }

        pruned
    }
}

/// Map the first derive-validation failure into the store's error shape.
fn validated<T: Validate>(input: &T) -> Result<()> {
    input.validate().map_err(|errors| {
        let field = errors
            .field_errors()
            .into_keys()
            .next()
            .map(|field| field.to_string())
            .unwrap_or_else(|| "input".to_string());
        StoreError::validation(field, errors.to_string())
    })
}

/// Decode listed documents, skipping records this version cannot read.
fn decode_all<T: DeserializeOwned>(docs: Vec<StoredDocument>, kind: &str) -> Vec<(String, T)> {
    let mut out = Vec::with_capacity(docs.len());
    for doc in docs {
        match doc.decode::<T>() {
            Ok(value) => out.push((doc.id, value)),
            Err(e) => warn!(kind, id = %doc.id, error = %e, "Skipping undecodable record"),
        }
    }
    out
}

fn build_record(input: DocumentInput, year: Option<String>) -> DocumentRecord {
    let (file_ref, file_inline_data) = match input.file {
        FileAttachment::Blob(blob) => (Some(blob), None),
        FileAttachment::Inline(data) => (None, Some(data)),
    };
    DocumentRecord {
        name: input.name,
        file_name: input.file_name,
        file_ref,
        file_inline_data,
        year,
        uploaded_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::push::PushFailureCode;
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::time::Duration;

    fn repo() -> (Repository, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (Repository::new(store.clone()), store)
    }

    fn tenant() -> TenantId {
        TenantId::from_email("a.b@x.com").unwrap()
    }

    fn contact() -> ContactNumber {
        ContactNumber::parse("98765 43210").unwrap()
    }

    fn year() -> YearLabel {
        YearLabel::parse("2024-25").unwrap()
    }

    #[tokio::test]
    async fn test_upsert_preserves_years_and_overwrites_fields() {
        let (repo, _) = repo();
        let tenant = tenant();

        repo.upsert_client(&tenant, ClientInput::new("Acme", "9876543210", "ABCDE1234F"))
            .await
            .unwrap();
        repo.add_year(&tenant, &contact(), &year()).await.unwrap();

        let updated = repo
            .upsert_client(
                &tenant,
                ClientInput::new("Acme & Sons", "98765-43210", "ABCDE1234F")
                    .with_email("acme@x.com"),
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "Acme & Sons");
        assert_eq!(updated.contact, "9876543210");
        assert_eq!(updated.email.as_deref(), Some("acme@x.com"));
        assert!(updated.years.contains("2024-25"));
    }

    #[tokio::test]
    async fn test_upsert_clears_optionals_omitted_on_resubmission() {
        let (repo, _) = repo();
        let tenant = tenant();

        repo.upsert_client(
            &tenant,
            ClientInput::new("Acme", "9876543210", "ABCDE1234F")
                .with_email("old@x.com")
                .with_push_token("tok-1"),
        )
        .await
        .unwrap();
        repo.add_year(&tenant, &contact(), &year()).await.unwrap();

        let resubmitted = repo
            .upsert_client(&tenant, ClientInput::new("Acme", "9876543210", "ABCDE1234F"))
            .await
            .unwrap();

        assert_eq!(resubmitted.email, None);
        assert_eq!(resubmitted.push_token, None);
        // The clearing write still leaves the year list alone.
        assert!(resubmitted.years.contains("2024-25"));

        // A cleared token also drops the client from broadcasts.
        assert!(repo.clients_for_broadcast(&tenant).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upsert_rejects_invalid_input() {
        let (repo, _) = repo();
        let tenant = tenant();

        let bad_pan = repo
            .upsert_client(&tenant, ClientInput::new("Acme", "9876543210", "NOPE"))
            .await
            .unwrap_err();
        assert!(matches!(bad_pan, StoreError::Validation { .. }));

        let bad_contact = repo
            .upsert_client(&tenant, ClientInput::new("Acme", "12345", "ABCDE1234F"))
            .await
            .unwrap_err();
        assert!(matches!(bad_contact, StoreError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_add_year_needs_the_client() {
        let (repo, _) = repo();
        let err = repo
            .add_year(&tenant(), &contact(), &year())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_re_adding_a_year_keeps_its_counter() {
        let (repo, _) = repo();
        let tenant = tenant();
        repo.upsert_client(&tenant, ClientInput::new("Acme", "9876543210", "ABCDE1234F"))
            .await
            .unwrap();
        repo.add_year(&tenant, &contact(), &year()).await.unwrap();
        repo.upload_document(
            &tenant,
            &contact(),
            &year(),
            DocumentInput::inline("ITR", "itr.pdf", "aGVsbG8="),
        )
        .await
        .unwrap();

        let again = repo.add_year(&tenant, &contact(), &year()).await.unwrap();
        assert_eq!(again.document_count, 1);

        let years = repo.list_years(&tenant, &contact()).await.unwrap();
        assert_eq!(years.len(), 1);
        assert_eq!(years[0].0, "2024-25");
    }

    #[tokio::test]
    async fn test_document_lifecycle_moves_the_counter() {
        let (repo, store) = repo();
        let tenant = tenant();
        repo.upsert_client(&tenant, ClientInput::new("Acme", "9876543210", "ABCDE1234F"))
            .await
            .unwrap();
        repo.add_year(&tenant, &contact(), &year()).await.unwrap();

        let (first, _) = repo
            .upload_document(
                &tenant,
                &contact(),
                &year(),
                DocumentInput::inline("ITR", "itr.pdf", "aGVsbG8="),
            )
            .await
            .unwrap();
        repo.upload_document(
            &tenant,
            &contact(),
            &year(),
            DocumentInput::inline("Audit", "audit.pdf", "aGVsbG8="),
        )
        .await
        .unwrap();

        let year_doc = store
            .get(
                RefBuilder::supernode(tenant.clone())
                    .year(&contact(), &year())
                    .path(),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(year_doc.data["documentCount"], json!(2));

        repo.delete_document(&tenant, &contact(), &year(), &first)
            .await
            .unwrap();
        // Deleting the same id again must not decrement twice.
        repo.delete_document(&tenant, &contact(), &year(), &first)
            .await
            .unwrap();

        let year_doc = store
            .get(
                RefBuilder::supernode(tenant.clone())
                    .year(&contact(), &year())
                    .path(),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(year_doc.data["documentCount"], json!(1));

        let remaining = repo
            .list_documents(&tenant, &contact(), &year())
            .await
            .unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].1.name, "Audit");
        assert_eq!(remaining[0].1.year.as_deref(), Some("2024-25"));
    }

    #[tokio::test]
    async fn test_upload_needs_the_year() {
        let (repo, _) = repo();
        let tenant = tenant();
        repo.upsert_client(&tenant, ClientInput::new("Acme", "9876543210", "ABCDE1234F"))
            .await
            .unwrap();

        let err = repo
            .upload_document(
                &tenant,
                &contact(),
                &year(),
                DocumentInput::inline("ITR", "itr.pdf", "aGVsbG8="),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { kind: "year", .. }));
    }

    #[tokio::test]
    async fn test_generic_documents_skip_the_counter() {
        let (repo, store) = repo();
        let tenant = tenant();
        repo.upsert_client(&tenant, ClientInput::new("Acme", "9876543210", "ABCDE1234F"))
            .await
            .unwrap();
        repo.add_year(&tenant, &contact(), &year()).await.unwrap();

        let (id, record) = repo
            .upload_generic_document(
                &tenant,
                &contact(),
                DocumentInput::inline("PAN card", "pan.png", "aGVsbG8="),
            )
            .await
            .unwrap();
        assert!(record.year.is_none());

        let year_doc = store
            .get(
                RefBuilder::supernode(tenant.clone())
                    .year(&contact(), &year())
                    .path(),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(year_doc.data["documentCount"], json!(0));

        repo.delete_generic_document(&tenant, &contact(), &id)
            .await
            .unwrap();
        assert!(repo
            .list_generic_documents(&tenant, &contact())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_notifications_list_newest_first() {
        let (repo, _) = repo();
        let tenant = tenant();

        for title in ["first", "second", "third"] {
            repo.create_notification(&tenant, NotificationInput::new(title, "body"))
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_millis(2)).await;
        }

        let listed = repo.list_notifications(&tenant).await.unwrap();
        let titles: Vec<&str> = listed.iter().map(|(_, n)| n.title.as_str()).collect();
        assert_eq!(titles, vec!["third", "second", "first"]);
    }

    #[tokio::test]
    async fn test_broadcast_list_and_token_pruning() {
        let (repo, _) = repo();
        let tenant = tenant();

        repo.upsert_client(
            &tenant,
            ClientInput::new("Acme", "9876543210", "ABCDE1234F").with_push_token("tok-1"),
        )
        .await
        .unwrap();
        repo.upsert_client(
            &tenant,
            ClientInput::new("Globex", "9123456780", "FGHIJ5678K").with_push_token("tok-2"),
        )
        .await
        .unwrap();
        repo.upsert_client(&tenant, ClientInput::new("NoToken", "9000000001", "KLMNO9012P"))
            .await
            .unwrap();

        let recipients = repo.clients_for_broadcast(&tenant).await.unwrap();
        assert_eq!(recipients.len(), 2);

        let failures = vec![
            DeliveryFailure::new("9876543210", PushFailureCode::NotRegistered),
            DeliveryFailure::new("9123456780", PushFailureCode::Other),
            DeliveryFailure::new("not-a-contact", PushFailureCode::Invalid),
        ];
        let pruned = repo.prune_stale_tokens(&tenant, &failures).await;
        assert_eq!(pruned, 1);

        let recipients = repo.clients_for_broadcast(&tenant).await.unwrap();
        assert_eq!(recipients.len(), 1);
        assert_eq!(recipients[0].contact, "9123456780");
    }

    #[tokio::test]
    async fn test_inactive_clients_stay_out_of_broadcasts() {
        let (repo, _) = repo();
        let tenant = tenant();

        repo.upsert_client(
            &tenant,
            ClientInput::new("Acme", "9876543210", "ABCDE1234F").with_push_token("tok-1"),
        )
        .await
        .unwrap();
        repo.set_client_active(&tenant, &contact(), false)
            .await
            .unwrap();

        assert!(repo.clients_for_broadcast(&tenant).await.unwrap().is_empty());
        assert_eq!(repo.list_clients(&tenant, false).await.unwrap().len(), 1);
        assert!(repo.list_clients(&tenant, true).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_profile_bootstrap() {
        let (repo, _) = repo();

        let profile = repo.ensure_profile("a.b@x.com").await.unwrap();
        assert_eq!(profile.name, "a_b");
        assert_eq!(profile.email, "a_b@x_com");

        // Second call sees the stored profile.
        let again = repo.ensure_profile("a.b@x.com").await.unwrap();
        assert_eq!(again, profile);

        assert!(repo.get_profile(&tenant()).await.unwrap().is_some());
        let other = TenantId::from_email("c.d@y.com").unwrap();
        assert!(repo.get_profile(&other).await.unwrap().is_none());
    }
}
