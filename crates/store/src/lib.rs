//! Ledgerdesk Store Library
//!
//! Tenant-scoped document storage for CA-firm back offices, including:
//! - Path layer and typed references over the tenant hierarchy
//! - The `DocumentStore` seam with in-memory and HTTP backends
//! - Repository CRUD with validation and counter maintenance
//! - Cascade deletes, legacy-layout migration and live subscriptions
//! - Error types, configuration and metrics

pub mod cascade;
pub mod config;
pub mod counter;
pub mod errors;
pub mod metrics;
pub mod migrate;
pub mod model;
pub mod path;
pub mod push;
pub mod refs;
pub mod repository;
pub mod store;
pub mod subscription;

// Re-export commonly used types
pub use cascade::{CascadeDeleteEngine, CascadeReport};
pub use config::AppConfig;
pub use counter::CounterAggregator;
pub use errors::{Result, StoreError};
pub use migrate::{MigrationEngine, MigrationSummary};
pub use path::{ContactNumber, StorePath, TenantId, YearLabel};
pub use push::{DeliveryFailure, PushFailureCode};
pub use refs::RefBuilder;
pub use repository::Repository;
pub use store::{DocumentStore, HttpStore, MemoryStore};
pub use subscription::{Subscription, SubscriptionManager};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
