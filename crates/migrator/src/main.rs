//! Ledgerdesk Migration Runner
//!
//! Moves tenants from the legacy flat layout into the supernode
//! structure:
//! 1. Reads tenant emails (or already-sanitized ids) from the command line
//! 2. Migrates each tenant in isolation, committing in bounded batches
//! 3. Re-reads the new structure and prints per-tenant counts
//! 4. Exits with 1 after completing when at least one tenant failed,
//!    with 2 on usage errors

use ledgerdesk_store::config::AppConfig;
use ledgerdesk_store::migrate::{MigrationEngine, TenantOutcome};
use ledgerdesk_store::{HttpStore, StoreError, TenantId, VERSION};
use std::sync::Arc;
use tracing::{info, Level};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        eprintln!("usage: migrator <tenant-email-or-id>...");
        std::process::exit(2);
    }

    let mut tenants = Vec::with_capacity(args.len());
    for arg in &args {
        match parse_tenant(arg) {
            Ok(tenant) => tenants.push(tenant),
            Err(e) => {
                eprintln!("invalid tenant {arg:?}: {e}");
                std::process::exit(2);
            }
        }
    }

    // Load configuration (before logging is up; failures go to stderr)
    let config = AppConfig::load().map_err(|e| {
        eprintln!("failed to load configuration: {e}");
        e
    })?;

    // Initialize tracing
    let level: Level = config
        .observability
        .log_level
        .parse()
        .unwrap_or(Level::INFO);
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(true);
    if config.observability.json_logging {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!("Starting Ledgerdesk migrator v{}", VERSION);

    let store = Arc::new(HttpStore::new(config.store.clone())?);
    ledgerdesk_store::metrics::register_metrics();

    let engine = MigrationEngine::new(store);
    let summary = engine.migrate_all(&tenants).await;

    for result in &summary.results {
        print_outcome(&engine, result, config.migration.verify).await;
    }
    println!(
        "{} migrated, {} failed",
        summary.success_count, summary.failure_count
    );

    if summary.failure_count > 0 {
        std::process::exit(1);
    }

    Ok(())
}

async fn print_outcome(engine: &MigrationEngine, result: &TenantOutcome, verify: bool) {
    match &result.outcome {
        Ok(outcome) => {
            println!(
                "{}: {} operations in {} commits, {} skipped subtrees",
                result.tenant,
                outcome.operation_count,
                outcome.commit_count,
                outcome.errors.len()
            );
            for skipped in &outcome.errors {
                println!(
                    "  skipped {} at {}: {}",
                    skipped.scope,
                    skipped.at.to_rfc3339(),
                    skipped.message
                );
            }
            if !verify {
                return;
            }
            // Counts only; comparing them against the legacy side stays a
            // human decision.
            match engine.verify_tenant(&result.tenant).await {
                Ok(report) => println!(
                    "  now holds: profile={} clients={} years={} documents={} banners={} adminDocs={} images={}",
                    report.profile,
                    report.clients,
                    report.years,
                    report.documents,
                    report.banners,
                    report.admin_docs,
                    report.images
                ),
                Err(e) => println!("  verification failed: {e}"),
            }
        }
        Err(e) => {
            println!("{}: FAILED: {e}", result.tenant);
        }
    }
}

/// Accept either a raw email or an already-sanitized tenant id.
fn parse_tenant(raw: &str) -> Result<TenantId, StoreError> {
    TenantId::from_email(raw).or_else(|_| TenantId::from_safe(raw))
}
