//! Live subscriptions over store snapshots
//!
//! Provides:
//! - `SubscriptionManager` with builder-style `watch_collection` /
//!   `watch_document`
//! - `Subscription` handles with explicit, idempotent `stop`
//!
//! Every delivery carries the full materialized state of the target, so a
//! callback never has to merge deltas and a missed intermediate state is
//! harmless. Callbacks run in event order on one task per subscription;
//! the first delivery is the state at subscribe time.

use std::sync::Arc;

use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::errors::{Result, StoreError};
use crate::path::StorePath;
use crate::store::{require_collection, require_document, DocumentStore, Snapshot, StoredDocument};

type CollectionFn = Box<dyn FnMut(Vec<StoredDocument>) + Send>;
type DocumentFn = Box<dyn FnMut(Option<StoredDocument>) + Send>;
type ErrorFn = Box<dyn FnMut(StoreError) + Send>;

/// Hands out live watches against one store.
#[derive(Clone)]
pub struct SubscriptionManager {
    store: Arc<dyn DocumentStore>,
}

impl SubscriptionManager {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        SubscriptionManager { store }
    }

    /// Watch every document in a collection.
    pub fn watch_collection(&self, target: &StorePath) -> CollectionWatch {
        CollectionWatch {
            store: Arc::clone(&self.store),
            target: target.clone(),
            on_update: None,
            on_error: None,
        }
    }

    /// Watch a single document.
    pub fn watch_document(&self, target: &StorePath) -> DocumentWatch {
        DocumentWatch {
            store: Arc::clone(&self.store),
            target: target.clone(),
            on_update: None,
            on_error: None,
        }
    }

    /// One-call form of `watch_collection().on_update(..).on_error(..)`.
    pub async fn subscribe_collection<F, E>(
        &self,
        target: &StorePath,
        on_update: F,
        on_error: E,
    ) -> Result<Subscription>
    where
        F: FnMut(Vec<StoredDocument>) + Send + 'static,
        E: FnMut(StoreError) + Send + 'static,
    {
        self.watch_collection(target)
            .on_update(on_update)
            .on_error(on_error)
            .start()
            .await
    }

    /// One-call form of `watch_document().on_update(..).on_error(..)`.
    pub async fn subscribe_document<F, E>(
        &self,
        target: &StorePath,
        on_update: F,
        on_error: E,
    ) -> Result<Subscription>
    where
        F: FnMut(Option<StoredDocument>) + Send + 'static,
        E: FnMut(StoreError) + Send + 'static,
    {
        self.watch_document(target)
            .on_update(on_update)
            .on_error(on_error)
            .start()
            .await
    }
}

/// Builder for a collection watch
pub struct CollectionWatch {
    store: Arc<dyn DocumentStore>,
    target: StorePath,
    on_update: Option<CollectionFn>,
    on_error: Option<ErrorFn>,
}

impl CollectionWatch {
    pub fn on_update(mut self, f: impl FnMut(Vec<StoredDocument>) + Send + 'static) -> Self {
        self.on_update = Some(Box::new(f));
        self
    }

    pub fn on_error(mut self, f: impl FnMut(StoreError) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    pub async fn start(self) -> Result<Subscription> {
        require_collection(&self.target)?;
        let stream = self.store.watch(&self.target).await?;
        debug!(target = %self.target, "Collection subscription started");

        let mut on_update = self.on_update;
        let mut on_error = self.on_error;
        let handle = tokio::spawn(async move {
            let mut stream = stream;
            while let Some(item) = stream.next().await {
                match item {
                    Ok(Snapshot::Collection(docs)) => {
                        if let Some(cb) = on_update.as_mut() {
                            cb(docs);
                        }
                    }
                    Ok(Snapshot::Document(_)) => {}
                    Err(e) => {
                        if let Some(cb) = on_error.as_mut() {
                            cb(e);
                        }
                    }
                }
            }
        });

        Ok(Subscription { handle })
    }
}

/// Builder for a document watch
pub struct DocumentWatch {
    store: Arc<dyn DocumentStore>,
    target: StorePath,
    on_update: Option<DocumentFn>,
    on_error: Option<ErrorFn>,
}

impl DocumentWatch {
    pub fn on_update(mut self, f: impl FnMut(Option<StoredDocument>) + Send + 'static) -> Self {
        self.on_update = Some(Box::new(f));
        self
    }

    pub fn on_error(mut self, f: impl FnMut(StoreError) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    pub async fn start(self) -> Result<Subscription> {
        require_document(&self.target)?;
        let stream = self.store.watch(&self.target).await?;
        debug!(target = %self.target, "Document subscription started");

        let mut on_update = self.on_update;
        let mut on_error = self.on_error;
        let handle = tokio::spawn(async move {
            let mut stream = stream;
            while let Some(item) = stream.next().await {
                match item {
                    Ok(Snapshot::Document(doc)) => {
                        if let Some(cb) = on_update.as_mut() {
                            cb(doc);
                        }
                    }
                    Ok(Snapshot::Collection(_)) => {}
                    Err(e) => {
                        if let Some(cb) = on_error.as_mut() {
                            cb(e);
                        }
                    }
                }
            }
        });

        Ok(Subscription { handle })
    }
}

/// A running subscription. `stop` is idempotent; dropping the handle also
/// stops delivery.
#[derive(Debug)]
pub struct Subscription {
    handle: JoinHandle<()>,
}

impl Subscription {
    pub fn stop(&self) {
        self.handle.abort();
    }

    /// Whether the delivery task has fully wound down. Shortly after
    /// `stop` this flips to true; it never flips back.
    pub fn is_stopped(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
