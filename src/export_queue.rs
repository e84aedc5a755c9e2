//! ExportQueue registry: configured sinks keyed by name.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

use crate::queue::{DataQueue, QueueError};
use crate::store::{Pipeline, Store};

/// Resolved from the URL scheme, never by trait-object downcasting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportQueueKind {
    Dummy,
    Http,
    Https,
    S3,
    Internal,
}

impl ExportQueueKind {
    fn from_scheme(scheme: &str) -> Self {
        match scheme {
            "http" => ExportQueueKind::Http,
            "https" => ExportQueueKind::Https,
            "s3" => ExportQueueKind::S3,
            "internal" => ExportQueueKind::Internal,
            _ => ExportQueueKind::Dummy,
        }
    }

    fn is_partitioned(self) -> bool {
        matches!(self, ExportQueueKind::S3)
    }
}

fn scheme_of(raw_url: &str) -> String {
    url::Url::parse(raw_url)
        .map(|parsed| parsed.scheme().to_string())
        .unwrap_or_default()
}

/// One configured export sink: its kind, batching threshold, skip-list,
/// and compression flag.
pub struct ExportQueueConfig {
    pub name: String,
    pub url: String,
    pub batch: usize,
    pub skip_keys: HashSet<String>,
    pub kind: ExportQueueKind,
    pub compress: bool,
    store: Arc<dyn Store>,
}

impl ExportQueueConfig {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        batch: usize,
        skip_keys: HashSet<String>,
        compress: bool,
        store: Arc<dyn Store>,
    ) -> Self {
        let url = url.into();
        let kind = ExportQueueKind::from_scheme(&scheme_of(&url));
        Self {
            name: name.into(),
            url,
            batch,
            skip_keys,
            kind,
            compress,
            store,
        }
    }

    /// `api_key ∉ skip_keys`.
    pub fn export_allowed(&self, api_key: Option<&str>) -> bool {
        match api_key {
            Some(api_key) => !self.skip_keys.contains(api_key),
            None => true,
        }
    }

    /// Only the internal sink consumes the full envelope.
    pub fn metadata_required(&self) -> bool {
        matches!(self.kind, ExportQueueKind::Internal)
    }

    /// `None` for the object-store kind: a monitor per api_key partition
    /// would explode the number of tracked partitions.
    pub fn monitor_name(&self) -> Option<&str> {
        if matches!(self.kind, ExportQueueKind::S3) {
            None
        } else {
            Some(&self.name)
        }
    }

    /// Strips the `queue_export_` prefix for use as a metrics `key:` tag.
    pub fn metric_tag(&self) -> &str {
        self.name.strip_prefix("queue_export_").unwrap_or(&self.name)
    }

    pub fn queue_key(&self, api_key: Option<&str>) -> String {
        if self.kind.is_partitioned() {
            format!("{}:{}", self.name, api_key.unwrap_or("no_key"))
        } else {
            self.name.clone()
        }
    }

    pub async fn partitions(&self) -> Result<Vec<String>, QueueError> {
        if self.kind.is_partitioned() {
            self.store.scan_partitions(&self.name).await
        } else {
            Ok(vec![self.name.clone()])
        }
    }

    fn data_queue(&self, partition_key: &str) -> DataQueue {
        DataQueue::new(partition_key, self.store.clone(), self.batch, self.compress)
    }

    pub async fn ready(&self, partition_key: &str) -> Result<bool, QueueError> {
        self.data_queue(partition_key).ready().await
    }

    pub async fn size(&self, partition_key: &str) -> Result<usize, QueueError> {
        self.data_queue(partition_key).size().await
    }

    pub async fn enqueue<T: Serialize>(
        &self,
        items: &[T],
        partition_key: &str,
        pipeline: Option<&mut dyn Pipeline>,
    ) -> Result<(), QueueError> {
        self.data_queue(partition_key).enqueue(items, pipeline).await
    }

    pub async fn dequeue<T: DeserializeOwned>(
        &self,
        partition_key: &str,
    ) -> Result<Vec<T>, QueueError> {
        self.data_queue(partition_key).dequeue().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    fn store() -> Arc<dyn Store> {
        Arc::new(InMemoryStore::new())
    }

    #[test]
    fn scheme_selects_kind() {
        assert_eq!(
            ExportQueueConfig::new("q", "", 0, HashSet::new(), false, store()).kind,
            ExportQueueKind::Dummy
        );
        assert_eq!(
            ExportQueueConfig::new("q", "https://partner.example/ingest", 0, HashSet::new(), false, store())
                .kind,
            ExportQueueKind::Https
        );
        assert_eq!(
            ExportQueueConfig::new("q", "s3://bucket/path", 0, HashSet::new(), false, store()).kind,
            ExportQueueKind::S3
        );
        assert_eq!(
            ExportQueueConfig::new("q", "internal://", 0, HashSet::new(), false, store()).kind,
            ExportQueueKind::Internal
        );
    }

    #[test]
    fn non_partitioned_queue_key_is_the_name() {
        let queue = ExportQueueConfig::new("queue_export_q1", "", 0, HashSet::new(), false, store());
        assert_eq!(queue.queue_key(Some("A")), "queue_export_q1");
        assert_eq!(queue.queue_key(None), "queue_export_q1");
    }

    #[test]
    fn s3_queue_key_is_partitioned_by_api_key() {
        let queue = ExportQueueConfig::new(
            "queue_export_q2",
            "s3://bucket/{api_key}/{year}/{month}/{day}/",
            0,
            HashSet::new(),
            false,
            store(),
        );
        assert_eq!(queue.queue_key(Some("B")), "queue_export_q2:B");
        assert_eq!(queue.queue_key(None), "queue_export_q2:no_key");
    }

    #[test]
    fn skip_keys_block_export() {
        let mut skip = HashSet::new();
        skip.insert("A".to_string());
        let queue = ExportQueueConfig::new("queue_export_q2", "s3://bucket/path", 0, skip, false, store());
        assert!(!queue.export_allowed(Some("A")));
        assert!(queue.export_allowed(Some("B")));
    }

    #[test]
    fn monitor_name_is_none_for_s3() {
        let queue = ExportQueueConfig::new("queue_export_q2", "s3://bucket/path", 0, HashSet::new(), false, store());
        assert_eq!(queue.monitor_name(), None);

        let queue = ExportQueueConfig::new("queue_export_q1", "https://x", 0, HashSet::new(), false, store());
        assert_eq!(queue.monitor_name(), Some("queue_export_q1"));
    }

    #[test]
    fn metric_tag_strips_prefix() {
        let queue = ExportQueueConfig::new("queue_export_partner_a", "", 0, HashSet::new(), false, store());
        assert_eq!(queue.metric_tag(), "partner_a");
    }
}
