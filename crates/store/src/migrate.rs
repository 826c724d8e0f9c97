//! Legacy layout migration
//!
//! Provides:
//! - `migrate_tenant`: copies one tenant's flat legacy tree
//!   (`users/{tenantId}/...`) into the supernode structure
//!   (`tenants/{tenantId}/...`), committing in bounded batches
//! - `migrate_all`: drives a list of tenants with per-tenant isolation
//! - `verify_tenant`: re-reads the new structure and reports counts for
//!   human comparison; the engine never judges correctness itself
//!
//! Every entity keeps its document id across the move, and every written
//! record is tagged with `migratedAt` and the literal legacy path in
//! `migratedFrom`. Re-running a migration overwrites the same targets
//! with the same bodies, so convergence is the recovery path for any
//! partial run. Nothing is deleted from the legacy tree here; cleanup
//! happens through the cascade engine's legacy re-delete.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{error, info, instrument, warn};

use crate::errors::Result;
use crate::metrics;
use crate::model::TenantProfile;
use crate::path::{StorePath, TenantId, DOCUMENTS, YEARS};
use crate::refs::RefBuilder;
use crate::store::{to_document_data, DocumentStore, JsonMap, WriteBatch, WriteMode, MAX_BATCH_OPS};

/// One legacy subtree that was skipped
#[derive(Debug, Clone)]
pub struct MigrationError {
    pub scope: String,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl MigrationError {
    fn new(scope: impl Into<String>, error: &crate::errors::StoreError) -> Self {
        MigrationError {
            scope: scope.into(),
            message: error.to_string(),
            at: Utc::now(),
        }
    }
}

/// Outcome of one committed tenant migration
#[derive(Debug, Clone)]
pub struct TenantMigration {
    pub operation_count: usize,
    pub commit_count: usize,
    pub errors: Vec<MigrationError>,
}

impl TenantMigration {
    /// True when nothing had to be skipped.
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Per-tenant result inside a batch run
#[derive(Debug)]
pub struct TenantOutcome {
    pub tenant: TenantId,
    pub outcome: Result<TenantMigration>,
}

/// Outcome of a multi-tenant run
#[derive(Debug, Default)]
pub struct MigrationSummary {
    pub success_count: usize,
    pub failure_count: usize,
    pub results: Vec<TenantOutcome>,
}

/// Entity counts re-read from the new structure
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VerifyReport {
    pub profile: bool,
    pub clients: usize,
    pub years: usize,
    pub documents: usize,
    pub banners: usize,
    pub admin_docs: usize,
    pub images: usize,
}

/// Copies tenants from the legacy layout into the supernode structure.
#[derive(Clone)]
pub struct MigrationEngine {
    store: Arc<dyn DocumentStore>,
}

impl MigrationEngine {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        MigrationEngine { store }
    }

    /// Migrate one tenant. Client and admin-document subtrees that cannot
    /// be enumerated are skipped and recorded; a failure to read the
    /// tenant's top-level collections or to commit fails the whole tenant.
    #[instrument(skip(self), fields(tenant = %tenant))]
    pub async fn migrate_tenant(&self, tenant: &TenantId) -> Result<TenantMigration> {
        let started = Instant::now();
        let result = self.migrate_tenant_inner(tenant).await;

        match &result {
            Ok(outcome) => metrics::record_migration(
                started.elapsed().as_secs_f64(),
                outcome.operation_count,
                outcome.commit_count,
                true,
            ),
            Err(_) => metrics::record_migration(started.elapsed().as_secs_f64(), 0, 0, false),
        }

        result
    }

    async fn migrate_tenant_inner(&self, tenant: &TenantId) -> Result<TenantMigration> {
        let legacy = RefBuilder::legacy(tenant.clone());
        let target = RefBuilder::supernode(tenant.clone());
        let migrated_at = Utc::now();
        info!(tenant = %tenant, "Starting tenant migration");

        let mut staged = WriteBatch::new();
        let mut errors = Vec::new();

        // The profile is always written so the supernode document exists,
        // defaulting the display name when the legacy profile lacks one.
        let mut profile = match self.store.get(legacy.tenant().path()).await? {
            Some(doc) => doc.data,
            None => to_document_data(&TenantProfile::from_safe_email(tenant.as_str()))?,
        };
        if !profile.contains_key("name") {
            let fallback = TenantProfile::from_safe_email(tenant.as_str());
            profile.insert("name".into(), Value::String(fallback.name));
        }
        staged.set(
            target.tenant().path(),
            tag(profile, legacy.tenant().path(), migrated_at),
            WriteMode::Overwrite,
        );

        // Clients, then each client's years and per-year documents.
        let client_ids = self
            .stage_collection(
                legacy.clients().path(),
                target.clients().path(),
                migrated_at,
                &mut staged,
            )
            .await?;
        for client_id in &client_ids {
            if let Err(e) = self
                .stage_client_subtree(&legacy, &target, client_id, migrated_at, &mut staged)
                .await
            {
                let scope = format!("{}/{client_id}", legacy.clients().path());
                warn!(tenant = %tenant, scope = %scope, error = %e, "Skipping client subtree");
                errors.push(MigrationError::new(scope, &e));
            }
        }

        // Banners are flat.
        self.stage_collection(
            &legacy.tenant().banners(),
            &target.tenant().banners(),
            migrated_at,
            &mut staged,
        )
        .await?;

        // Admin documents, each with a nested image collection.
        let admin_ids = self
            .stage_collection(
                &legacy.tenant().admin_docs(),
                &target.tenant().admin_docs(),
                migrated_at,
                &mut staged,
            )
            .await?;
        for admin_id in &admin_ids {
            let from = legacy.tenant().admin_doc_images(admin_id)?;
            let to = target.tenant().admin_doc_images(admin_id)?;
            if let Err(e) = self
                .stage_collection(&from, &to, migrated_at, &mut staged)
                .await
            {
                warn!(tenant = %tenant, scope = %from, error = %e, "Skipping admin document images");
                errors.push(MigrationError::new(from.to_string(), &e));
            }
        }

        // Commit in bounded chunks; the store rejects anything larger.
        let ops = staged.into_ops();
        let operation_count = ops.len();
        let mut commit_count = 0;
        for chunk in ops.chunks(MAX_BATCH_OPS) {
            self.store
                .commit(WriteBatch::from_ops(chunk.to_vec()))
                .await?;
            commit_count += 1;
        }

        info!(
            tenant = %tenant,
            operation_count,
            commit_count,
            skipped = errors.len(),
            "Tenant migration committed"
        );

        Ok(TenantMigration {
            operation_count,
            commit_count,
            errors,
        })
    }

    /// Migrate a list of tenants. One tenant's failure never stops the
    /// run; the summary carries every outcome in input order.
    pub async fn migrate_all(&self, tenants: &[TenantId]) -> MigrationSummary {
        let mut summary = MigrationSummary::default();

        for tenant in tenants {
            match self.migrate_tenant(tenant).await {
                Ok(outcome) => {
                    summary.success_count += 1;
                    summary.results.push(TenantOutcome {
                        tenant: tenant.clone(),
                        outcome: Ok(outcome),
                    });
                }
                Err(e) => {
                    error!(tenant = %tenant, error = %e, "Tenant migration failed");
                    summary.failure_count += 1;
                    summary.results.push(TenantOutcome {
                        tenant: tenant.clone(),
                        outcome: Err(e),
                    });
                }
            }
        }

        summary
    }

    /// Count the entities now present in the new structure.
    pub async fn verify_tenant(&self, tenant: &TenantId) -> Result<VerifyReport> {
        let target = RefBuilder::supernode(tenant.clone());
        let mut report = VerifyReport {
            profile: self.store.get(target.tenant().path()).await?.is_some(),
            ..VerifyReport::default()
        };

        let clients = self.store.list(target.clients().path(), None).await?;
        report.clients = clients.len();
        for client in &clients {
            let years_path = target.clients().path().child(&client.id)?.child(YEARS)?;
            let years = self.store.list(&years_path, None).await?;
            for year in &years {
                let docs_path = years_path.child(&year.id)?.child(DOCUMENTS)?;
                report.documents += self.store.list(&docs_path, None).await?.len();
            }
            report.years += years.len();
        }

        report.banners = self.store.list(&target.tenant().banners(), None).await?.len();

        let admin_docs = self.store.list(&target.tenant().admin_docs(), None).await?;
        report.admin_docs = admin_docs.len();
        for doc in &admin_docs {
            let images_path = target.tenant().admin_doc_images(&doc.id)?;
            report.images += self.store.list(&images_path, None).await?.len();
        }

        Ok(report)
    }

    /// Stage every document of one legacy collection at its new path,
    /// keeping ids. Returns the ids for nested walks.
    async fn stage_collection(
        &self,
        legacy: &StorePath,
        target: &StorePath,
        migrated_at: DateTime<Utc>,
        staged: &mut WriteBatch,
    ) -> Result<Vec<String>> {
        let docs = self.store.list(legacy, None).await?;
        let mut ids = Vec::with_capacity(docs.len());

        for doc in docs {
            let from = legacy.child(&doc.id)?;
            let to = target.child(&doc.id)?;
            staged.set(&to, tag(doc.data, &from, migrated_at), WriteMode::Overwrite);
            ids.push(doc.id);
        }

        Ok(ids)
    }

    /// Stage one client's years and their documents.
    async fn stage_client_subtree(
        &self,
        legacy: &RefBuilder,
        target: &RefBuilder,
        client_id: &str,
        migrated_at: DateTime<Utc>,
        staged: &mut WriteBatch,
    ) -> Result<()> {
        let legacy_years = legacy.clients().path().child(client_id)?.child(YEARS)?;
        let target_years = target.clients().path().child(client_id)?.child(YEARS)?;

        let year_ids = self
            .stage_collection(&legacy_years, &target_years, migrated_at, staged)
            .await?;
        for year_id in &year_ids {
            let from = legacy_years.child(year_id)?.child(DOCUMENTS)?;
            let to = target_years.child(year_id)?.child(DOCUMENTS)?;
            self.stage_collection(&from, &to, migrated_at, staged)
                .await?;
        }

        Ok(())
    }
}

/// Audit tags carried by every migrated record.
fn tag(mut data: JsonMap, from: &StorePath, at: DateTime<Utc>) -> JsonMap {
    data.insert("migratedAt".into(), Value::String(at.to_rfc3339()));
    data.insert("migratedFrom".into(), Value::String(from.to_string()));
    data
}
