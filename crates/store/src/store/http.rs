//! Remote document-store client
//!
//! Speaks the store's JSON REST surface:
//! - `GET/PUT/PATCH/DELETE {base}/v1/{path}` for single documents
//! - `GET {base}/v1/{collection}` with filter query parameters
//! - `POST {base}/v1/{collection}` for id-assigning creates
//! - `POST {base}/v1:commit` for atomic batches
//!
//! Transient failures (connect, timeout, 5xx, 429) retry with
//! exponential backoff inside a configured time budget; everything else
//! surfaces immediately. Watches are poll-based: the target is
//! re-materialized every poll interval and a snapshot is emitted when
//! the state actually changed.

use std::time::Duration;

use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoff};
use futures::stream;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::warn;

use crate::config::StoreConfig;
use crate::errors::{ErrorCode, Result, StoreError};
use crate::path::StorePath;

use super::{
    require_collection, require_document, DocumentStore, JsonMap, ListFilter, OrderDirection,
    Patch, Snapshot, SnapshotStream, StoredDocument, WriteBatch, WriteMode, MAX_BATCH_OPS,
};

#[derive(Clone)]
pub struct HttpStore {
    client: reqwest::Client,
    config: StoreConfig,
}

#[derive(Deserialize)]
struct CreateResponse {
    id: String,
}

#[derive(Deserialize)]
struct ListResponse {
    documents: Vec<StoredDocument>,
}

impl HttpStore {
    pub fn new(config: StoreConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(HttpStore { client, config })
    }

    fn url_for(&self, path: &StorePath) -> String {
        format!("{}/v1/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn commit_url(&self) -> String {
        format!("{}/v1:commit", self.config.base_url.trim_end_matches('/'))
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.config.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    fn retry_policy(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: Duration::from_millis(200),
            max_elapsed_time: Some(Duration::from_secs(self.config.retry_budget_secs)),
            ..ExponentialBackoff::default()
        }
    }

    async fn with_retry<T, F, Fut>(&self, op: &'static str, call: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        retry(self.retry_policy(), || async {
            call().await.map_err(|err| {
                if err.is_retryable() {
                    warn!(op, error = %err, "Store request failed, will retry");
                    backoff::Error::transient(err)
                } else {
                    backoff::Error::permanent(err)
                }
            })
        })
        .await
    }

    async fn materialize(&self, target: &StorePath) -> Result<Snapshot> {
        if target.is_document() {
            Ok(Snapshot::Document(self.get(target).await?))
        } else {
            let mut docs = self.list(target, None).await?;
            docs.sort_by(|a, b| a.id.cmp(&b.id));
            Ok(Snapshot::Collection(docs))
        }
    }
}

/// Turn filter options into query parameters.
fn list_query(filter: &ListFilter) -> Vec<(&'static str, String)> {
    let mut params = Vec::new();
    if let Some((field, value)) = &filter.field_equals {
        params.push(("field", field.clone()));
        params.push(("value", value.to_string()));
    }
    if let Some((field, direction)) = &filter.order_by {
        params.push(("orderBy", field.clone()));
        let direction = match direction {
            OrderDirection::Asc => "asc",
            OrderDirection::Desc => "desc",
        };
        params.push(("direction", direction.to_string()));
    }
    if let Some(limit) = filter.limit {
        params.push(("limit", limit.to_string()));
    }
    params
}

/// Map a non-success response onto the backend error taxonomy.
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StoreError::backend(
        ErrorCode::from_http_status(status.as_u16()),
        format!("{status}: {body}"),
    ))
}

#[async_trait]
impl DocumentStore for HttpStore {
    async fn create(&self, collection: &StorePath, data: JsonMap) -> Result<String> {
        require_collection(collection)?;
        let url = self.url_for(collection);
        let body = serde_json::json!({ "data": data });
        self.with_retry("create", || async {
            let response = self
                .authed(self.client.post(&url))
                .json(&body)
                .send()
                .await?;
            let created: CreateResponse = check(response).await?.json().await?;
            Ok(created.id)
        })
        .await
    }

    async fn set(&self, doc: &StorePath, data: JsonMap, mode: WriteMode) -> Result<()> {
        require_document(doc)?;
        let url = self.url_for(doc);
        let merge = matches!(mode, WriteMode::Merge);
        let body = serde_json::json!({ "data": data });
        self.with_retry("set", || async {
            let response = self
                .authed(self.client.put(&url))
                .query(&[("merge", merge)])
                .json(&body)
                .send()
                .await?;
            check(response).await?;
            Ok(())
        })
        .await
    }

    async fn get(&self, doc: &StorePath) -> Result<Option<StoredDocument>> {
        require_document(doc)?;
        let url = self.url_for(doc);
        self.with_retry("get", || async {
            let response = self.authed(self.client.get(&url)).send().await?;
            if response.status() == StatusCode::NOT_FOUND {
                return Ok(None);
            }
            let stored: StoredDocument = check(response).await?.json().await?;
            Ok(Some(stored))
        })
        .await
    }

    async fn list(
        &self,
        collection: &StorePath,
        filter: Option<ListFilter>,
    ) -> Result<Vec<StoredDocument>> {
        require_collection(collection)?;
        let url = self.url_for(collection);
        let params = filter.as_ref().map(list_query).unwrap_or_default();
        self.with_retry("list", || async {
            let response = self
                .authed(self.client.get(&url))
                .query(&params)
                .send()
                .await?;
            let listed: ListResponse = check(response).await?.json().await?;
            Ok(listed.documents)
        })
        .await
    }

    async fn update(&self, doc: &StorePath, patch: Patch) -> Result<()> {
        require_document(doc)?;
        let url = self.url_for(doc);
        self.with_retry("update", || async {
            let response = self
                .authed(self.client.patch(&url))
                .json(&patch)
                .send()
                .await?;
            if response.status() == StatusCode::NOT_FOUND {
                return Err(StoreError::not_found("document", doc.to_string()));
            }
            check(response).await?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, doc: &StorePath) -> Result<()> {
        require_document(doc)?;
        let url = self.url_for(doc);
        self.with_retry("delete", || async {
            let response = self.authed(self.client.delete(&url)).send().await?;
            // Deleting something already gone is a success.
            if response.status() == StatusCode::NOT_FOUND {
                return Ok(());
            }
            check(response).await?;
            Ok(())
        })
        .await
    }

    async fn commit(&self, batch: WriteBatch) -> Result<()> {
        if batch.len() > MAX_BATCH_OPS {
            return Err(StoreError::BatchTooLarge {
                size: batch.len(),
                limit: MAX_BATCH_OPS,
            });
        }
        let url = self.commit_url();
        let body = serde_json::json!({ "operations": batch.ops() });
        self.with_retry("commit", || async {
            let response = self
                .authed(self.client.post(&url))
                .json(&body)
                .send()
                .await?;
            check(response).await?;
            Ok(())
        })
        .await
    }

    async fn watch(&self, target: &StorePath) -> Result<SnapshotStream> {
        let store = self.clone();
        let target = target.clone();
        let interval = Duration::from_millis(store.config.poll_interval_ms);
        let initial = store.materialize(&target).await?;

        struct PollState {
            store: HttpStore,
            target: StorePath,
            interval: Duration,
            last: Option<Snapshot>,
            pending: Option<Snapshot>,
        }

        let stream = stream::unfold(
            PollState {
                store,
                target,
                interval,
                last: Some(initial.clone()),
                pending: Some(initial),
            },
            |mut ps| async move {
                if let Some(snapshot) = ps.pending.take() {
                    return Some((Ok(snapshot), ps));
                }
                loop {
                    tokio::time::sleep(ps.interval).await;
                    match ps.store.materialize(&ps.target).await {
                        Ok(snapshot) => {
                            if ps.last.as_ref() != Some(&snapshot) {
                                ps.last = Some(snapshot.clone());
                                return Some((Ok(snapshot), ps));
                            }
                        }
                        // Keep polling after a failed poll; the consumer
                        // decides whether to tear the watch down.
                        Err(err) => return Some((Err(err), ps)),
                    }
                }
            },
        );
        Ok(Box::pin(stream))
    }
}
