//! Client cascade deletes
//!
//! Provides:
//! - `delete_client`: removes a client and every descendant (years, their
//!   documents, generic documents), then re-runs the same deletion under
//!   the legacy layout
//! - `delete_year`: removes one fiscal year and unlinks it from the client
//!
//! The fan-out is unbounded, so the cascade is deliberately best-effort
//! rather than transactional: every descendant delete runs behind its own
//! error guard and failures are recorded, not raised. Only a failure to
//! delete the client document itself fails the call, as `PartialCascade`
//! with the counts reached. Re-running a cascade is always safe; deletes
//! of already-missing documents succeed.

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::{error, info, instrument, warn};

use crate::errors::{Result, StoreError};
use crate::metrics;
use crate::path::{ContactNumber, StorePath, TenantId, YearLabel, DOCUMENTS};
use crate::refs::{ClientRef, RefBuilder};
use crate::store::{DocumentStore, Patch};

/// One descendant that could not be deleted
#[derive(Debug, Clone, PartialEq)]
pub struct CascadeError {
    pub path: String,
    pub message: String,
}

/// Outcome of a client cascade
#[derive(Debug, Clone, Default)]
pub struct CascadeReport {
    pub deleted_years: usize,
    pub deleted_documents: usize,
    pub deleted_generic: usize,
    pub errors: Vec<CascadeError>,
}

impl CascadeReport {
    pub fn total_deleted(&self) -> usize {
        self.deleted_years + self.deleted_documents + self.deleted_generic
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    fn record(&mut self, path: impl Into<String>, error: &StoreError) {
        self.errors.push(CascadeError {
            path: path.into(),
            message: error.to_string(),
        });
    }
}

/// Outcome of a single-year delete
#[derive(Debug, Clone, Default)]
pub struct YearDeletion {
    pub deleted_documents: usize,
    pub errors: Vec<CascadeError>,
}

/// Deletes client subtrees from the bottom up.
#[derive(Clone)]
pub struct CascadeDeleteEngine {
    store: Arc<dyn DocumentStore>,
}

impl CascadeDeleteEngine {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        CascadeDeleteEngine { store }
    }

    /// Delete a client and everything under it.
    ///
    /// Runs in phases: the years subtree, then generic documents, then the
    /// client document, then the same subtree under the legacy layout.
    /// Descendant failures are recorded in the report and do not stop the
    /// remaining phases.
    #[instrument(skip(self), fields(tenant = %tenant, contact = %contact))]
    pub async fn delete_client(
        &self,
        tenant: &TenantId,
        contact: &ContactNumber,
    ) -> Result<CascadeReport> {
        let started = Instant::now();
        let client = RefBuilder::supernode(tenant.clone()).client(contact);
        info!(client = %client, "Starting cascade delete");

        let mut report = CascadeReport::default();
        self.drain_client_subtree(&client, &mut report).await;

        if let Err(e) = self.store.delete(client.path()).await {
            error!(client = %client, error = %e, "Cascade stopped at the client document");
            return Err(StoreError::PartialCascade {
                deleted_years: report.deleted_years,
                deleted_documents: report.deleted_documents,
                deleted_generic: report.deleted_generic,
                reason: e.to_string(),
            });
        }

        // The legacy layout may still carry a pre-migration copy of this
        // client. Same drain, same counters; a no-op when nothing is there.
        let legacy = RefBuilder::legacy(tenant.clone()).client(contact);
        self.drain_client_subtree(&legacy, &mut report).await;
        if let Err(e) = self.store.delete(legacy.path()).await {
            warn!(client = %legacy, error = %e, "Failed to delete legacy client document");
            report.record(legacy.path().to_string(), &e);
        }

        metrics::record_cascade(
            started.elapsed().as_secs_f64(),
            report.total_deleted(),
            report.errors.len(),
        );
        info!(
            client = %client,
            deleted_years = report.deleted_years,
            deleted_documents = report.deleted_documents,
            deleted_generic = report.deleted_generic,
            failures = report.errors.len(),
            "Cascade delete finished"
        );

        Ok(report)
    }

    /// Delete one fiscal year: its documents, the year document, and the
    /// label entry in the client's year list.
    ///
    /// Document failures are recorded; a failure on the year document or
    /// the unlink is the error case. Re-running converges to the same
    /// state either way.
    #[instrument(skip(self), fields(tenant = %tenant, contact = %contact, label = %label))]
    pub async fn delete_year(
        &self,
        tenant: &TenantId,
        contact: &ContactNumber,
        label: &YearLabel,
    ) -> Result<YearDeletion> {
        let refs = RefBuilder::supernode(tenant.clone());
        let year = refs.year(contact, label);

        let (deleted_documents, errors) = self.drain_collection(year.documents().path()).await;
        self.store.delete(year.path()).await?;

        // Unlink the label. A missing client means the cascade already took
        // it, and there is nothing left to unlink.
        let unlink = Patch::new().array_remove("years", vec![Value::from(label.as_str())]);
        match self.store.update(refs.client(contact).path(), unlink).await {
            Ok(()) | Err(StoreError::NotFound { .. }) => {}
            Err(e) => return Err(e),
        }

        info!(year = %year, deleted_documents, "Deleted fiscal year");
        Ok(YearDeletion {
            deleted_documents,
            errors,
        })
    }

    /// Phase worker: years (with their documents) and generic documents
    /// under one client root.
    async fn drain_client_subtree(&self, client: &ClientRef, report: &mut CascadeReport) {
        let years = client.years();
        let years_path = years.path();
        match self.store.list(years_path, None).await {
            Ok(years) => {
                for year in years {
                    let year_path = match years_path.child(&year.id) {
                        Ok(path) => path,
                        Err(e) => {
                            report.record(format!("{years_path}/{}", year.id), &e);
                            continue;
                        }
                    };

                    if let Ok(docs_path) = year_path.child(DOCUMENTS) {
                        let (deleted, mut errs) = self.drain_collection(&docs_path).await;
                        report.deleted_documents += deleted;
                        report.errors.append(&mut errs);
                    }

                    match self.store.delete(&year_path).await {
                        Ok(()) => report.deleted_years += 1,
                        Err(e) => {
                            warn!(year = %year_path, error = %e, "Failed to delete year document");
                            report.record(year_path.to_string(), &e);
                        }
                    }
                }
            }
            Err(e) => {
                warn!(path = %years_path, error = %e, "Could not enumerate years");
                report.record(years_path.to_string(), &e);
            }
        }

        let generic = client.generic_documents();
        let (deleted, mut errs) = self.drain_collection(generic.path()).await;
        report.deleted_generic += deleted;
        report.errors.append(&mut errs);
    }

    /// Delete every document directly inside `collection`. Failures are
    /// returned alongside the count, never raised.
    async fn drain_collection(&self, collection: &StorePath) -> (usize, Vec<CascadeError>) {
        let mut errors = Vec::new();

        let docs = match self.store.list(collection, None).await {
            Ok(docs) => docs,
            Err(e) => {
                warn!(path = %collection, error = %e, "Could not enumerate collection");
                errors.push(CascadeError {
                    path: collection.to_string(),
                    message: e.to_string(),
                });
                return (0, errors);
            }
        };

        let mut deleted = 0;
        for doc in docs {
            let doc_path = match collection.child(&doc.id) {
                Ok(path) => path,
                Err(e) => {
                    errors.push(CascadeError {
                        path: format!("{collection}/{}", doc.id),
                        message: e.to_string(),
                    });
                    continue;
                }
            };

            match self.store.delete(&doc_path).await {
                Ok(()) => deleted += 1,
                Err(e) => {
                    warn!(path = %doc_path, error = %e, "Failed to delete document");
                    errors.push(CascadeError {
                        path: doc_path.to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }

        (deleted, errors)
    }
}
