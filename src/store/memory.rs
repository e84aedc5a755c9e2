use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use super::{Pipeline, QueueError, Store};

struct Partition {
    items: Vec<Bytes>,
    since: Instant,
}

type Partitions = Arc<Mutex<HashMap<String, Partition>>>;

/// An in-process [`Store`] fake used by unit tests, with no network or
/// persistence. Every method is synchronous underneath; the async
/// signatures exist only to satisfy the trait.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    partitions: Partitions,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(partitions: &mut HashMap<String, Partition>, key: &str, items: Vec<Bytes>) {
        if items.is_empty() {
            return;
        }
        let partition = partitions
            .entry(key.to_string())
            .or_insert_with(|| Partition {
                items: Vec::new(),
                since: Instant::now(),
            });
        if partition.items.is_empty() {
            partition.since = Instant::now();
        }
        partition.items.extend(items);
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn enqueue(&self, key: &str, items: Vec<Bytes>) -> Result<(), QueueError> {
        let mut partitions = self.partitions.lock().unwrap();
        Self::push(&mut partitions, key, items);
        Ok(())
    }

    async fn drain(&self, key: &str) -> Result<Vec<Bytes>, QueueError> {
        let mut partitions = self.partitions.lock().unwrap();
        Ok(partitions
            .remove(key)
            .map(|partition| partition.items)
            .unwrap_or_default())
    }

    async fn len(&self, key: &str) -> Result<usize, QueueError> {
        let partitions = self.partitions.lock().unwrap();
        Ok(partitions.get(key).map(|p| p.items.len()).unwrap_or(0))
    }

    async fn oldest_age(&self, key: &str) -> Result<Option<Duration>, QueueError> {
        let partitions = self.partitions.lock().unwrap();
        Ok(partitions.get(key).map(|p| p.since.elapsed()))
    }

    async fn scan_partitions(&self, prefix: &str) -> Result<Vec<String>, QueueError> {
        let partitions = self.partitions.lock().unwrap();
        let needle = format!("{prefix}:");
        Ok(partitions
            .keys()
            .filter(|key| key.starts_with(&needle))
            .cloned()
            .collect())
    }

    fn pipeline(&self) -> Box<dyn Pipeline> {
        Box::new(MemoryPipeline {
            partitions: self.partitions.clone(),
            staged: Vec::new(),
        })
    }
}

struct MemoryPipeline {
    partitions: Partitions,
    staged: Vec<(String, Vec<Bytes>)>,
}

#[async_trait]
impl Pipeline for MemoryPipeline {
    fn stage_enqueue(&mut self, key: &str, items: Vec<Bytes>) {
        if items.is_empty() {
            return;
        }
        self.staged.push((key.to_string(), items));
    }

    async fn commit(self: Box<Self>) -> Result<(), QueueError> {
        let mut partitions = self.partitions.lock().unwrap();
        for (key, items) in self.staged {
            InMemoryStore::push(&mut partitions, &key, items);
        }
        Ok(())
    }
}
