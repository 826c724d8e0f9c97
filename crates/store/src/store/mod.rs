//! The document-store seam
//!
//! Provides:
//! - The `DocumentStore` trait every engine is constructed against
//! - `StoredDocument` with store-stamped create/update metadata
//! - `Patch` field transforms (set / increment / arrayUnion / arrayRemove)
//!   applied atomically by the store
//! - Bounded `WriteBatch` commits with a hard 500-operation ceiling
//! - Full-state `Snapshot` streams for live subscriptions
//!
//! Two implementations ship: `MemoryStore` (in-process, used by tests and
//! embedded setups) and `HttpStore` (the remote document database's REST
//! surface). Everything above this seam is backend-agnostic.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{Result, StoreError};
use crate::path::StorePath;

pub mod http;
pub mod memory;

pub use http::HttpStore;
pub use memory::MemoryStore;

/// JSON object shape of every document body
pub type JsonMap = serde_json::Map<String, Value>;

/// Hard per-commit operation ceiling of the backing store. Multi-step
/// writers must split; the store rejects oversized batches outright.
pub const MAX_BATCH_OPS: usize = 500;

/// A document read back from the store. `created_at` is stamped once at
/// creation, `updated_at` on every write; both live in metadata so an
/// overwrite-set cannot erase the creation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredDocument {
    pub id: String,
    pub data: JsonMap,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredDocument {
    /// Deserialize the document body into a typed record.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(Value::Object(self.data.clone())).map_err(Into::into)
    }
}

/// Serialize a typed record into a document body.
pub fn to_document_data<T: Serialize>(value: &T) -> Result<JsonMap> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(anyhow::anyhow!(
            "document payload must serialize to a JSON object, got {other}"
        )
        .into()),
    }
}

/// How `set` treats an existing document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Replace the whole body
    Overwrite,
    /// Union top-level fields into the existing body; fields absent from
    /// the payload survive
    Merge,
}

/// Atomic field transforms for `update`
///
/// Transforms apply in a fixed order: `set`, then `increment`, then
/// `arrayUnion`, then `arrayRemove`. `increment` on a missing or
/// non-numeric field writes the delta itself; the array transforms treat
/// a missing or non-array field as empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patch {
    #[serde(default, skip_serializing_if = "JsonMap::is_empty")]
    pub set: JsonMap,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub increment: BTreeMap<String, i64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub array_union: BTreeMap<String, Vec<Value>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub array_remove: BTreeMap<String, Vec<Value>>,
}

impl Patch {
    pub fn new() -> Self {
        Patch::default()
    }

    pub fn set(mut self, field: impl Into<String>, value: Value) -> Self {
        self.set.insert(field.into(), value);
        self
    }

    pub fn increment(mut self, field: impl Into<String>, delta: i64) -> Self {
        self.increment.insert(field.into(), delta);
        self
    }

    pub fn array_union(mut self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.array_union.insert(field.into(), values);
        self
    }

    pub fn array_remove(mut self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.array_remove.insert(field.into(), values);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
            && self.increment.is_empty()
            && self.array_union.is_empty()
            && self.array_remove.is_empty()
    }

    /// Apply every transform to a document body in place.
    pub fn apply_to(&self, data: &mut JsonMap) {
        for (field, value) in &self.set {
            data.insert(field.clone(), value.clone());
        }
        for (field, delta) in &self.increment {
            let current = data.get(field).and_then(Value::as_i64);
            let next = match current {
                Some(n) => n.saturating_add(*delta),
                None => *delta,
            };
            data.insert(field.clone(), Value::from(next));
        }
        for (field, values) in &self.array_union {
            let mut items = take_array(data, field);
            for value in values {
                if !items.contains(value) {
                    items.push(value.clone());
                }
            }
            data.insert(field.clone(), Value::Array(items));
        }
        for (field, values) in &self.array_remove {
            let mut items = take_array(data, field);
            items.retain(|item| !values.contains(item));
            data.insert(field.clone(), Value::Array(items));
        }
    }
}

fn take_array(data: &mut JsonMap, field: &str) -> Vec<Value> {
    match data.remove(field) {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderDirection {
    Asc,
    Desc,
}

/// Listing options: one equality filter, one sort field, one limit.
/// Ordering by `createdAt` / `updatedAt` reads document metadata; any
/// other field reads the body. Ties break by document id, which is also
/// the default order.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub field_equals: Option<(String, Value)>,
    pub order_by: Option<(String, OrderDirection)>,
    pub limit: Option<usize>,
}

impl ListFilter {
    pub fn equals(field: impl Into<String>, value: Value) -> Self {
        ListFilter {
            field_equals: Some((field.into(), value)),
            ..ListFilter::default()
        }
    }

    pub fn order_by_asc(mut self, field: impl Into<String>) -> Self {
        self.order_by = Some((field.into(), OrderDirection::Asc));
        self
    }

    pub fn order_by_desc(mut self, field: impl Into<String>) -> Self {
        self.order_by = Some((field.into(), OrderDirection::Desc));
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// One operation inside a batch commit
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "op")]
pub enum BatchOp {
    Set {
        path: String,
        data: JsonMap,
        merge: bool,
    },
    Update {
        path: String,
        patch: Patch,
    },
    Delete {
        path: String,
    },
}

/// An ordered group of writes applied atomically by `commit`
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        WriteBatch::default()
    }

    pub fn from_ops(ops: Vec<BatchOp>) -> Self {
        WriteBatch { ops }
    }

    pub fn set(&mut self, doc: &StorePath, data: JsonMap, mode: WriteMode) {
        self.ops.push(BatchOp::Set {
            path: doc.to_string(),
            data,
            merge: matches!(mode, WriteMode::Merge),
        });
    }

    pub fn update(&mut self, doc: &StorePath, patch: Patch) {
        self.ops.push(BatchOp::Update {
            path: doc.to_string(),
            patch,
        });
    }

    pub fn delete(&mut self, doc: &StorePath) {
        self.ops.push(BatchOp::Delete {
            path: doc.to_string(),
        });
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }
}

/// One materialized state of a watched target
#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot {
    /// Entire current collection, sorted by document id
    Collection(Vec<StoredDocument>),
    /// Current document, or `None` once deleted / while absent
    Document(Option<StoredDocument>),
}

/// Stream of materialized snapshots; the first item is always the state
/// at subscribe time
pub type SnapshotStream = BoxStream<'static, Result<Snapshot>>;

/// Remote document database operations
///
/// Contracts every implementation honors:
/// - every write stamps `updated_at`, creation additionally stamps
///   `created_at`
/// - `get` of a missing document is `Ok(None)`, never an error
/// - `delete` of a missing document succeeds (idempotent cleanup)
/// - `update` of a missing document is `NotFound`
/// - `commit` is atomic: a failing or oversized batch applies nothing
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Add a document with a store-generated id; returns the id.
    async fn create(&self, collection: &StorePath, data: JsonMap) -> Result<String>;

    /// Write a document at a known path.
    async fn set(&self, doc: &StorePath, data: JsonMap, mode: WriteMode) -> Result<()>;

    async fn get(&self, doc: &StorePath) -> Result<Option<StoredDocument>>;

    async fn list(
        &self,
        collection: &StorePath,
        filter: Option<ListFilter>,
    ) -> Result<Vec<StoredDocument>>;

    /// Apply field transforms to an existing document.
    async fn update(&self, doc: &StorePath, patch: Patch) -> Result<()>;

    async fn delete(&self, doc: &StorePath) -> Result<()>;

    /// Apply up to [`MAX_BATCH_OPS`] writes atomically.
    async fn commit(&self, batch: WriteBatch) -> Result<()>;

    /// Live full-state snapshots of one document or collection.
    async fn watch(&self, target: &StorePath) -> Result<SnapshotStream>;
}

pub(crate) fn require_document(path: &StorePath) -> Result<()> {
    if path.is_document() {
        Ok(())
    } else {
        Err(StoreError::InvalidReference(format!(
            "expected a document path, got collection {path}"
        )))
    }
}

pub(crate) fn require_collection(path: &StorePath) -> Result<()> {
    if path.is_collection() {
        Ok(())
    } else {
        Err(StoreError::InvalidReference(format!(
            "expected a collection path, got document {path}"
        )))
    }
}
