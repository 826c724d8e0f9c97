//! Per-year document counters
//!
//! Provides:
//! - Fire-and-forget counter bumps hooked into document create/delete
//! - `reconcile` to repair drift from an exact recount
//!
//! The cached `documentCount` on a year document is advisory. Bump
//! failures are logged and swallowed so a successful upload or delete is
//! never failed by its counter; `reconcile` is the repair path.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::errors::Result;
use crate::metrics;
use crate::refs::YearRef;
use crate::store::{to_document_data, DocumentStore, Patch, WriteMode};

/// Field on the year document carrying the cached count
pub const DOCUMENT_COUNT_FIELD: &str = "documentCount";

/// Maintains `documentCount` on year documents.
#[derive(Clone)]
pub struct CounterAggregator {
    store: Arc<dyn DocumentStore>,
}

impl CounterAggregator {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        CounterAggregator { store }
    }

    /// Bump the count after a document was created. Never fails the caller.
    pub async fn on_document_created(&self, year: &YearRef) {
        self.adjust(year, 1).await;
    }

    /// Drop the count after a document was deleted. Never fails the caller.
    pub async fn on_document_deleted(&self, year: &YearRef) {
        self.adjust(year, -1).await;
    }

    async fn adjust(&self, year: &YearRef, delta: i64) {
        let patch = Patch::new().increment(DOCUMENT_COUNT_FIELD, delta);

        match self.store.update(year.path(), patch).await {
            Ok(()) => {
                debug!(year = %year, delta, "Adjusted document count");
            }
            Err(e) => {
                metrics::record_counter_failure();
                warn!(
                    year = %year,
                    delta,
                    error = %e,
                    "Failed to adjust document count, drift until reconcile"
                );
            }
        }
    }

    /// Recount the documents subcollection and write the exact value.
    ///
    /// Safe to run at any time; last writer wins. Returns the count written.
    pub async fn reconcile(&self, year: &YearRef) -> Result<u64> {
        let documents = self.store.list(year.documents().path(), None).await?;
        let count = documents.len() as u64;

        let data = to_document_data(&serde_json::json!({ DOCUMENT_COUNT_FIELD: count }))?;
        self.store.set(year.path(), data, WriteMode::Merge).await?;

        metrics::record_reconciliation();
        debug!(year = %year, count, "Reconciled document count");

        Ok(count)
    }
}
