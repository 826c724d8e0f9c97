//! In-process document store
//!
//! Backs every test and any embedded deployment. Documents live in a
//! `BTreeMap` keyed by their full path, so a collection listing is a
//! prefix scan and comes back sorted by id for free. Change notices go
//! over a broadcast channel; watchers re-materialize the full state of
//! their target on every relevant notice, which makes a lagged receiver
//! harmless.
//!
//! Parent documents are not required to exist: writing
//! `tenants/t/clients/c/years/2024-25` never checks `tenants/t`. The
//! hierarchy is purely a path convention, same as the remote store.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use futures::stream;
use serde_json::Value;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use crate::errors::{Result, StoreError};
use crate::path::StorePath;

use super::{
    require_collection, require_document, BatchOp, DocumentStore, JsonMap, ListFilter,
    OrderDirection, Patch, Snapshot, SnapshotStream, StoredDocument, WriteBatch, WriteMode,
    MAX_BATCH_OPS,
};

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
struct Entry {
    data: JsonMap,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Entry {
    fn to_stored(&self, path: &str) -> StoredDocument {
        StoredDocument {
            id: path.rsplit('/').next().unwrap_or_default().to_string(),
            data: self.data.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

type State = BTreeMap<String, Entry>;

#[derive(Clone)]
pub struct MemoryStore {
    state: Arc<RwLock<State>>,
    events: broadcast::Sender<StorePath>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        MemoryStore {
            state: Arc::new(RwLock::new(BTreeMap::new())),
            events,
        }
    }

    /// Number of documents currently stored, across all collections.
    pub async fn document_count(&self) -> usize {
        self.state.read().await.len()
    }

    fn notify(&self, changed: Vec<StorePath>) {
        for path in changed {
            // Send only fails when nobody is watching.
            let _ = self.events.send(path);
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn create(&self, collection: &StorePath, data: JsonMap) -> Result<String> {
        require_collection(collection)?;
        let id = Uuid::new_v4().simple().to_string();
        let doc = collection.child(&id)?;
        let now = Utc::now();
        {
            let mut state = self.state.write().await;
            apply_set(&mut state, &doc, data, false, now);
        }
        self.notify(vec![doc]);
        Ok(id)
    }

    async fn set(&self, doc: &StorePath, data: JsonMap, mode: WriteMode) -> Result<()> {
        require_document(doc)?;
        let now = Utc::now();
        {
            let mut state = self.state.write().await;
            apply_set(&mut state, doc, data, matches!(mode, WriteMode::Merge), now);
        }
        self.notify(vec![doc.clone()]);
        Ok(())
    }

    async fn get(&self, doc: &StorePath) -> Result<Option<StoredDocument>> {
        require_document(doc)?;
        let key = doc.to_string();
        let state = self.state.read().await;
        Ok(state.get(&key).map(|entry| entry.to_stored(&key)))
    }

    async fn list(
        &self,
        collection: &StorePath,
        filter: Option<ListFilter>,
    ) -> Result<Vec<StoredDocument>> {
        require_collection(collection)?;
        let state = self.state.read().await;
        let docs = children(&state, collection);
        Ok(apply_filter(docs, filter.as_ref()))
    }

    async fn update(&self, doc: &StorePath, patch: Patch) -> Result<()> {
        require_document(doc)?;
        let now = Utc::now();
        {
            let mut state = self.state.write().await;
            apply_update(&mut state, doc, &patch, now)?;
        }
        self.notify(vec![doc.clone()]);
        Ok(())
    }

    async fn delete(&self, doc: &StorePath) -> Result<()> {
        require_document(doc)?;
        let removed = {
            let mut state = self.state.write().await;
            apply_delete(&mut state, doc)
        };
        if removed {
            self.notify(vec![doc.clone()]);
        }
        Ok(())
    }

    async fn commit(&self, batch: WriteBatch) -> Result<()> {
        if batch.len() > MAX_BATCH_OPS {
            return Err(StoreError::BatchTooLarge {
                size: batch.len(),
                limit: MAX_BATCH_OPS,
            });
        }
        let now = Utc::now();
        let changed = {
            let mut state = self.state.write().await;
            // Ops land on a scratch copy; a failing op leaves the live
            // state untouched.
            let mut scratch = state.clone();
            let mut changed = Vec::with_capacity(batch.len());
            for op in batch.ops() {
                match op {
                    BatchOp::Set { path, data, merge } => {
                        let doc = StorePath::parse(path)?;
                        require_document(&doc)?;
                        apply_set(&mut scratch, &doc, data.clone(), *merge, now);
                        changed.push(doc);
                    }
                    BatchOp::Update { path, patch } => {
                        let doc = StorePath::parse(path)?;
                        require_document(&doc)?;
                        apply_update(&mut scratch, &doc, patch, now)?;
                        changed.push(doc);
                    }
                    BatchOp::Delete { path } => {
                        let doc = StorePath::parse(path)?;
                        require_document(&doc)?;
                        if apply_delete(&mut scratch, &doc) {
                            changed.push(doc);
                        }
                    }
                }
            }
            *state = scratch;
            changed
        };
        self.notify(changed);
        Ok(())
    }

    async fn watch(&self, target: &StorePath) -> Result<SnapshotStream> {
        let state = Arc::clone(&self.state);
        let target = target.clone();
        let rx = self.events.subscribe();
        let initial = materialize(&state, &target).await;

        struct WatchState {
            state: Arc<RwLock<State>>,
            target: StorePath,
            rx: broadcast::Receiver<StorePath>,
            pending: Option<Snapshot>,
        }

        let stream = stream::unfold(
            WatchState {
                state,
                target,
                rx,
                pending: Some(initial),
            },
            |mut ws| async move {
                if let Some(snapshot) = ws.pending.take() {
                    return Some((Ok(snapshot), ws));
                }
                loop {
                    match ws.rx.recv().await {
                        Ok(changed) if is_relevant(&ws.target, &changed) => {
                            let snapshot = materialize(&ws.state, &ws.target).await;
                            return Some((Ok(snapshot), ws));
                        }
                        Ok(_) => continue,
                        // Missed notices don't matter: snapshots carry
                        // the full current state anyway.
                        Err(broadcast::error::RecvError::Lagged(_)) => {
                            let snapshot = materialize(&ws.state, &ws.target).await;
                            return Some((Ok(snapshot), ws));
                        }
                        Err(broadcast::error::RecvError::Closed) => return None,
                    }
                }
            },
        );
        Ok(Box::pin(stream))
    }
}

fn apply_set(state: &mut State, doc: &StorePath, data: JsonMap, merge: bool, now: DateTime<Utc>) {
    let key = doc.to_string();
    match state.get_mut(&key) {
        Some(entry) => {
            if merge {
                for (field, value) in data {
                    entry.data.insert(field, value);
                }
            } else {
                entry.data = data;
            }
            entry.updated_at = now;
        }
        None => {
            state.insert(
                key,
                Entry {
                    data,
                    created_at: now,
                    updated_at: now,
                },
            );
        }
    }
}

fn apply_update(state: &mut State, doc: &StorePath, patch: &Patch, now: DateTime<Utc>) -> Result<()> {
    let key = doc.to_string();
    let entry = state
        .get_mut(&key)
        .ok_or_else(|| StoreError::not_found("document", key.clone()))?;
    patch.apply_to(&mut entry.data);
    entry.updated_at = now;
    Ok(())
}

fn apply_delete(state: &mut State, doc: &StorePath) -> bool {
    state.remove(&doc.to_string()).is_some()
}

/// Direct children of a collection, in id order.
fn children(state: &State, collection: &StorePath) -> Vec<StoredDocument> {
    let prefix = format!("{collection}/");
    state
        .range(prefix.clone()..)
        .take_while(|(key, _)| key.starts_with(&prefix))
        .filter(|(key, _)| !key[prefix.len()..].contains('/'))
        .map(|(key, entry)| entry.to_stored(key))
        .collect()
}

fn is_relevant(target: &StorePath, changed: &StorePath) -> bool {
    if target.is_document() {
        changed == target
    } else {
        changed.parent().is_some_and(|parent| parent == *target)
    }
}

async fn materialize(state: &Arc<RwLock<State>>, target: &StorePath) -> Snapshot {
    let guard = state.read().await;
    if target.is_document() {
        let key = target.to_string();
        Snapshot::Document(guard.get(&key).map(|entry| entry.to_stored(&key)))
    } else {
        Snapshot::Collection(children(&guard, target))
    }
}

fn apply_filter(mut docs: Vec<StoredDocument>, filter: Option<&ListFilter>) -> Vec<StoredDocument> {
    let Some(filter) = filter else {
        return docs;
    };
    if let Some((field, expected)) = &filter.field_equals {
        docs.retain(|doc| field_value(doc, field).is_some_and(|v| &v == expected));
    }
    if let Some((field, direction)) = &filter.order_by {
        docs.sort_by(|a, b| {
            let ordering = compare_values(field_value(a, field), field_value(b, field))
                .then_with(|| a.id.cmp(&b.id));
            match direction {
                OrderDirection::Asc => ordering,
                OrderDirection::Desc => ordering.reverse(),
            }
        });
    }
    if let Some(limit) = filter.limit {
        docs.truncate(limit);
    }
    docs
}

/// Metadata timestamps are addressable alongside body fields. RFC 3339
/// with fixed precision keeps their string order chronological.
fn field_value(doc: &StoredDocument, field: &str) -> Option<Value> {
    match field {
        "createdAt" => Some(Value::String(
            doc.created_at.to_rfc3339_opts(SecondsFormat::Micros, true),
        )),
        "updatedAt" => Some(Value::String(
            doc.updated_at.to_rfc3339_opts(SecondsFormat::Micros, true),
        )),
        _ => doc.data.get(field).cloned(),
    }
}

fn compare_values(a: Option<Value>, b: Option<Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => {
            let rank = |v: &Value| match v {
                Value::Null => 0,
                Value::Bool(_) => 1,
                Value::Number(_) => 2,
                Value::String(_) => 3,
                Value::Array(_) => 4,
                Value::Object(_) => 5,
            };
            match (rank(&a), rank(&b)) {
                (ra, rb) if ra != rb => ra.cmp(&rb),
                _ => match (&a, &b) {
                    (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
                    (Value::Number(x), Value::Number(y)) => x
                        .as_f64()
                        .partial_cmp(&y.as_f64())
                        .unwrap_or(Ordering::Equal),
                    (Value::String(x), Value::String(y)) => x.cmp(y),
                    _ => a.to_string().cmp(&b.to_string()),
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;

    fn doc_path(raw: &str) -> StorePath {
        StorePath::parse(raw).unwrap()
    }

    fn body(pairs: &[(&str, Value)]) -> JsonMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_create_assigns_id_and_stamps_metadata() {
        let store = MemoryStore::new();
        let coll = doc_path("tenants/t@x_com/clients/9876543210/years/2024-25/documents");
        let id = store
            .create(&coll, body(&[("name", json!("itr.pdf"))]))
            .await
            .unwrap();

        let doc = store.get(&coll.child(&id).unwrap()).await.unwrap().unwrap();
        assert_eq!(doc.id, id);
        assert_eq!(doc.data["name"], json!("itr.pdf"));
        assert_eq!(doc.created_at, doc.updated_at);
    }

    #[tokio::test]
    async fn test_set_merge_preserves_omitted_fields() {
        let store = MemoryStore::new();
        let doc = doc_path("tenants/t@x_com/clients/9876543210");
        store
            .set(
                &doc,
                body(&[("name", json!("Acme")), ("years", json!(["2024-25"]))]),
                WriteMode::Overwrite,
            )
            .await
            .unwrap();
        store
            .set(&doc, body(&[("name", json!("Acme Ltd"))]), WriteMode::Merge)
            .await
            .unwrap();

        let stored = store.get(&doc).await.unwrap().unwrap();
        assert_eq!(stored.data["name"], json!("Acme Ltd"));
        assert_eq!(stored.data["years"], json!(["2024-25"]));
    }

    #[tokio::test]
    async fn test_overwrite_keeps_creation_time() {
        let store = MemoryStore::new();
        let doc = doc_path("tenants/t@x_com/clients/9876543210");
        store
            .set(&doc, body(&[("name", json!("one"))]), WriteMode::Overwrite)
            .await
            .unwrap();
        let first = store.get(&doc).await.unwrap().unwrap();

        store
            .set(&doc, body(&[("name", json!("two"))]), WriteMode::Overwrite)
            .await
            .unwrap();
        let second = store.get(&doc).await.unwrap().unwrap();

        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at >= first.updated_at);
        assert!(second.data.get("years").is_none());
    }

    #[tokio::test]
    async fn test_missing_document_semantics() {
        let store = MemoryStore::new();
        let doc = doc_path("tenants/t@x_com/clients/9876543210");

        assert!(store.get(&doc).await.unwrap().is_none());
        store.delete(&doc).await.unwrap();

        let err = store
            .update(&doc, Patch::new().increment("documentCount", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_parity_is_enforced() {
        let store = MemoryStore::new();
        assert!(store.get(&doc_path("tenants/t@x_com/clients")).await.is_err());
        assert!(store.list(&doc_path("tenants/t@x_com"), None).await.is_err());
        assert!(store.create(&doc_path("tenants/t@x_com"), JsonMap::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_list_returns_direct_children_in_id_order() {
        let store = MemoryStore::new();
        let clients = doc_path("tenants/t@x_com/clients");
        for contact in ["9999999999", "1111111111", "5555555555"] {
            let doc = clients.child(contact).unwrap();
            store
                .set(&doc, body(&[("contact", json!(contact))]), WriteMode::Overwrite)
                .await
                .unwrap();
            // Nested docs must not leak into the parent listing.
            let nested = doc.child("years").unwrap().child("2024-25").unwrap();
            store.set(&nested, JsonMap::new(), WriteMode::Overwrite).await.unwrap();
        }

        let listed = store.list(&clients, None).await.unwrap();
        let ids: Vec<_> = listed.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["1111111111", "5555555555", "9999999999"]);
    }

    #[tokio::test]
    async fn test_list_filter_order_and_limit() {
        let store = MemoryStore::new();
        let coll = doc_path("tenants/t@x_com/clients");
        for (contact, active, name) in [
            ("1111111111", true, "c"),
            ("2222222222", false, "a"),
            ("3333333333", true, "b"),
        ] {
            store
                .set(
                    &coll.child(contact).unwrap(),
                    body(&[("isActive", json!(active)), ("name", json!(name))]),
                    WriteMode::Overwrite,
                )
                .await
                .unwrap();
        }

        let active = store
            .list(&coll, Some(ListFilter::equals("isActive", json!(true))))
            .await
            .unwrap();
        assert_eq!(active.len(), 2);

        let by_name = store
            .list(&coll, Some(ListFilter::default().order_by_desc("name").with_limit(2)))
            .await
            .unwrap();
        let names: Vec<_> = by_name.iter().map(|d| d.data["name"].clone()).collect();
        assert_eq!(names, vec![json!("c"), json!("b")]);
    }

    #[tokio::test]
    async fn test_concurrent_increments_do_not_lose_updates() {
        let store = MemoryStore::new();
        let year = doc_path("tenants/t@x_com/clients/9876543210/years/2024-25");
        store
            .set(&year, body(&[("documentCount", json!(0))]), WriteMode::Overwrite)
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..20 {
            let store = store.clone();
            let year = year.clone();
            handles.push(tokio::spawn(async move {
                store
                    .update(&year, Patch::new().increment("documentCount", 1))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let stored = store.get(&year).await.unwrap().unwrap();
        assert_eq!(stored.data["documentCount"], json!(20));
    }

    #[tokio::test]
    async fn test_commit_is_atomic() {
        let store = MemoryStore::new();
        let existing = doc_path("tenants/t@x_com/clients/1111111111");
        let missing = doc_path("tenants/t@x_com/clients/2222222222");

        let mut batch = WriteBatch::new();
        batch.set(&existing, body(&[("name", json!("Acme"))]), WriteMode::Overwrite);
        batch.update(&missing, Patch::new().increment("documentCount", 1));

        assert!(store.commit(batch).await.is_err());
        // The set that preceded the failing update must not have applied.
        assert!(store.get(&existing).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_commit_rejects_oversized_batches() {
        let store = MemoryStore::new();
        let mut batch = WriteBatch::new();
        let coll = doc_path("tenants/t@x_com/clients");
        for i in 0..=MAX_BATCH_OPS {
            batch.delete(&coll.child(&format!("{i:010}")).unwrap());
        }
        let err = store.commit(batch).await.unwrap_err();
        assert!(matches!(err, StoreError::BatchTooLarge { size, limit }
            if size == MAX_BATCH_OPS + 1 && limit == MAX_BATCH_OPS));
    }

    #[tokio::test]
    async fn test_watch_document_emits_initial_then_changes() {
        let store = MemoryStore::new();
        let doc = doc_path("tenants/t@x_com/clients/9876543210");
        let mut snapshots = store.watch(&doc).await.unwrap();

        match snapshots.next().await.unwrap().unwrap() {
            Snapshot::Document(None) => {}
            other => panic!("expected empty initial snapshot, got {other:?}"),
        }

        store
            .set(&doc, body(&[("name", json!("Acme"))]), WriteMode::Overwrite)
            .await
            .unwrap();
        match snapshots.next().await.unwrap().unwrap() {
            Snapshot::Document(Some(stored)) => assert_eq!(stored.data["name"], json!("Acme")),
            other => panic!("expected document snapshot, got {other:?}"),
        }

        store.delete(&doc).await.unwrap();
        match snapshots.next().await.unwrap().unwrap() {
            Snapshot::Document(None) => {}
            other => panic!("expected deletion snapshot, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_watch_collection_materializes_full_state() {
        let store = MemoryStore::new();
        let coll = doc_path("tenants/t@x_com/notifications");
        let mut snapshots = store.watch(&coll).await.unwrap();

        match snapshots.next().await.unwrap().unwrap() {
            Snapshot::Collection(docs) => assert!(docs.is_empty()),
            other => panic!("expected collection snapshot, got {other:?}"),
        }

        store
            .set(
                &coll.child("n1").unwrap(),
                body(&[("title", json!("Due date"))]),
                WriteMode::Overwrite,
            )
            .await
            .unwrap();
        store
            .set(
                &coll.child("n2").unwrap(),
                body(&[("title", json!("Reminder"))]),
                WriteMode::Overwrite,
            )
            .await
            .unwrap();

        match snapshots.next().await.unwrap().unwrap() {
            Snapshot::Collection(docs) => assert_eq!(docs.len(), 1),
            other => panic!("unexpected {other:?}"),
        }
        match snapshots.next().await.unwrap().unwrap() {
            Snapshot::Collection(docs) => {
                assert_eq!(docs.len(), 2);
                assert_eq!(docs[0].id, "n1");
                assert_eq!(docs[1].id, "n2");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
