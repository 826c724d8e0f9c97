//! Metrics and observability utilities
//!
//! Emits through the `metrics` facade with standardized naming; hosts
//! decide which recorder/exporter to install.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};

/// Metrics prefix for all Ledgerdesk metrics
pub const METRICS_PREFIX: &str = "ledgerdesk";

/// Register all metric descriptions
pub fn register_metrics() {
    // Cascade delete metrics
    describe_counter!(
        format!("{}_cascade_deletes_total", METRICS_PREFIX),
        Unit::Count,
        "Total client cascade deletes run"
    );

    describe_counter!(
        format!("{}_cascade_branch_failures_total", METRICS_PREFIX),
        Unit::Count,
        "Descendant deletions that failed inside a cascade"
    );

    describe_histogram!(
        format!("{}_cascade_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Cascade delete latency in seconds"
    );

    // Migration metrics
    describe_counter!(
        format!("{}_migration_tenants_total", METRICS_PREFIX),
        Unit::Count,
        "Tenants migrated, labeled by outcome"
    );

    describe_counter!(
        format!("{}_migration_operations_total", METRICS_PREFIX),
        Unit::Count,
        "Write operations committed by the migration engine"
    );

    describe_counter!(
        format!("{}_migration_commits_total", METRICS_PREFIX),
        Unit::Count,
        "Batch commits issued by the migration engine"
    );

    describe_histogram!(
        format!("{}_migration_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Per-tenant migration latency in seconds"
    );

    // Counter maintenance metrics
    describe_counter!(
        format!("{}_counter_reconciliations_total", METRICS_PREFIX),
        Unit::Count,
        "Document-count reconciliations run"
    );

    describe_counter!(
        format!("{}_counter_adjust_failures_total", METRICS_PREFIX),
        Unit::Count,
        "Fire-and-forget counter bumps that failed"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record one cascade delete
pub fn record_cascade(duration_secs: f64, deleted_total: usize, branch_failures: usize) {
    counter!(format!("{}_cascade_deletes_total", METRICS_PREFIX)).increment(1);

    if branch_failures > 0 {
        counter!(format!("{}_cascade_branch_failures_total", METRICS_PREFIX))
            .increment(branch_failures as u64);
    }

    histogram!(
        format!("{}_cascade_duration_seconds", METRICS_PREFIX),
        "deleted" => bucket_label(deleted_total)
    )
    .record(duration_secs);
}

/// Helper to record one tenant migration attempt
pub fn record_migration(duration_secs: f64, operations: usize, commits: usize, success: bool) {
    let status = if success { "success" } else { "failure" };

    counter!(
        format!("{}_migration_tenants_total", METRICS_PREFIX),
        "status" => status.to_string()
    )
    .increment(1);

    counter!(format!("{}_migration_operations_total", METRICS_PREFIX))
        .increment(operations as u64);

    counter!(format!("{}_migration_commits_total", METRICS_PREFIX)).increment(commits as u64);

    histogram!(format!("{}_migration_duration_seconds", METRICS_PREFIX)).record(duration_secs);
}

/// Helper to record counter maintenance events
pub fn record_reconciliation() {
    counter!(format!("{}_counter_reconciliations_total", METRICS_PREFIX)).increment(1);
}

pub fn record_counter_failure() {
    counter!(format!("{}_counter_adjust_failures_total", METRICS_PREFIX)).increment(1);
}

fn bucket_label(count: usize) -> String {
    match count {
        0 => "0",
        1..=10 => "1-10",
        11..=100 => "11-100",
        _ => "100+",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_does_not_panic() {
        register_metrics();
        record_cascade(0.05, 7, 1);
        record_migration(1.2, 42, 1, true);
        record_reconciliation();
        record_counter_failure();
    }

    #[test]
    fn test_bucket_labels() {
        assert_eq!(bucket_label(0), "0");
        assert_eq!(bucket_label(5), "1-10");
        assert_eq!(bucket_label(50), "11-100");
        assert_eq!(bucket_label(5000), "100+");
    }
}
