//! DataQueue: a named, batch-aware queue with atomic dequeue and
//! size/readiness checks, backed by a [`Store`].

use bytes::Bytes;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression as GzCompression;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{Read, Write};
use std::sync::Arc;
use std::time::Duration;

pub use crate::store::QueueError;
use crate::store::{Pipeline, Store};

/// Readiness TTL applied when a partition isn't full but has been aging.
/// Not exposed as a per-queue setting; one crate-wide default applies.
pub const DEFAULT_TTL: Duration = Duration::from_secs(600);

#[derive(Clone)]
pub struct DataQueue {
    key: String,
    store: Arc<dyn Store>,
    batch: usize,
    compress: bool,
    ttl: Duration,
}

impl DataQueue {
    pub fn new(key: impl Into<String>, store: Arc<dyn Store>, batch: usize, compress: bool) -> Self {
        Self {
            key: key.into(),
            store,
            batch,
            compress,
            ttl: DEFAULT_TTL,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    fn encode<T: Serialize>(&self, item: &T) -> Result<Bytes, QueueError> {
        let json = serde_json::to_vec(item)
            .map_err(|err| QueueError::transport(format!("encode failed: {err}")))?;
        if self.compress {
            let mut encoder = GzEncoder::new(Vec::new(), GzCompression::default());
            encoder
                .write_all(&json)
                .map_err(|err| QueueError::transport(format!("gzip encode failed: {err}")))?;
            let gz = encoder
                .finish()
                .map_err(|err| QueueError::transport(format!("gzip finish failed: {err}")))?;
            Ok(Bytes::from(gz))
        } else {
            Ok(Bytes::from(json))
        }
    }

    fn decode<T: DeserializeOwned>(&self, raw: Bytes) -> Result<T, QueueError> {
        let json = if self.compress {
            let mut decoder = GzDecoder::new(&raw[..]);
            let mut out = Vec::new();
            decoder
                .read_to_end(&mut out)
                .map_err(|err| QueueError::transport(format!("gzip decode failed: {err}")))?;
            out
        } else {
            raw.to_vec()
        };
        serde_json::from_slice(&json)
            .map_err(|err| QueueError::transport(format!("decode failed: {err}")))
    }

    /// Appends encoded items. When `pipeline` is supplied, the write is
    /// staged and only becomes visible on the pipeline's `commit`.
    pub async fn enqueue<T: Serialize>(
        &self,
        items: &[T],
        pipeline: Option<&mut dyn Pipeline>,
    ) -> Result<(), QueueError> {
        if items.is_empty() {
            return Ok(());
        }
        let encoded = items
            .iter()
            .map(|item| self.encode(item))
            .collect::<Result<Vec<_>, _>>()?;

        match pipeline {
            Some(pipe) => {
                pipe.stage_enqueue(&self.key, encoded);
                Ok(())
            }
            None => self.store.enqueue(&self.key, encoded).await,
        }
    }

    /// Atomically pops and decodes every item currently queued.
    pub async fn dequeue<T: DeserializeOwned>(&self) -> Result<Vec<T>, QueueError> {
        let raw = self.store.drain(&self.key).await?;
        raw.into_iter().map(|item| self.decode(item)).collect()
    }

    pub async fn size(&self) -> Result<usize, QueueError> {
        self.store.len(&self.key).await
    }

    pub async fn ready(&self) -> Result<bool, QueueError> {
        let size = self.size().await?;
        if size == 0 {
            return Ok(false);
        }
        if size >= self.batch {
            return Ok(true);
        }
        let age = self.store.oldest_age(&self.key).await?;
        Ok(age.map(|age| age >= self.ttl).unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use serde_json::json;

    #[tokio::test]
    async fn ready_on_batch_threshold() {
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let queue = DataQueue::new("q", store, 2, false);

        assert!(!queue.ready().await.unwrap());
        queue.enqueue(&[json!({"a": 1})], None).await.unwrap();
        assert!(!queue.ready().await.unwrap());
        queue.enqueue(&[json!({"a": 2})], None).await.unwrap();
        assert!(queue.ready().await.unwrap());
    }

    #[tokio::test]
    async fn dequeue_is_destructive_and_atomic() {
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let queue = DataQueue::new("q", store, 10, false);
        queue
            .enqueue(&[json!({"a": 1}), json!({"a": 2})], None)
            .await
            .unwrap();

        let first: Vec<serde_json::Value> = queue.dequeue().await.unwrap();
        assert_eq!(first.len(), 2);

        let second: Vec<serde_json::Value> = queue.dequeue().await.unwrap();
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn gzip_round_trips() {
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let queue = DataQueue::new("q", store, 10, true);
        queue.enqueue(&[json!({"mac": "aa:bb"})], None).await.unwrap();

        let items: Vec<serde_json::Value> = queue.dequeue().await.unwrap();
        assert_eq!(items, vec![json!({"mac": "aa:bb"})]);
    }

    #[tokio::test]
    async fn pipeline_defers_visibility_until_commit() {
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let queue = DataQueue::new("q", store.clone(), 10, false);

        let mut pipe = store.pipeline();
        queue
            .enqueue(&[json!({"a": 1})], Some(pipe.as_mut()))
            .await
            .unwrap();
        assert_eq!(queue.size().await.unwrap(), 0);

        pipe.commit().await.unwrap();
        assert_eq!(queue.size().await.unwrap(), 1);
    }
}
