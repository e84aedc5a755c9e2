//! The shared key/value store backing every [`crate::queue::DataQueue`] partition.
//!
//! A thin, swappable transport sits behind a trait (see the sink
//! `upload`/`retriable` split) so the pipeline logic above it can be
//! tested without a live Redis server.

mod memory;
mod redis_store;

use async_trait::async_trait;
use bytes::Bytes;
use snafu::Snafu;
use std::time::Duration;

pub use memory::InMemoryStore;
pub use redis_store::RedisStore;

#[derive(Debug, Snafu)]
pub enum QueueError {
    #[snafu(display("store transport error: {message}"))]
    Transport { message: String },
}

impl QueueError {
    pub fn transport(message: impl Into<String>) -> Self {
        QueueError::Transport {
            message: message.into(),
        }
    }
}

/// A scoped batching handle, committed exactly once before the job returns.
///
/// Modeled on the source's Redis pipeline: staged writes across any number
/// of keys are only made visible on [`Pipeline::commit`]; dropping it
/// without committing discards the staged work.
#[async_trait]
pub trait Pipeline: Send {
    fn stage_enqueue(&mut self, key: &str, items: Vec<Bytes>);

    async fn commit(self: Box<Self>) -> Result<(), QueueError>;
}

/// The store primitives a [`crate::queue::DataQueue`] is built from.
///
/// `enqueue`/`drain` operate on a single partition key; `drain` is
/// destructive and atomic — the whole partition is returned and cleared
/// in one step, so no two callers can ever observe or remove the same item.
#[async_trait]
pub trait Store: Send + Sync {
    async fn enqueue(&self, key: &str, items: Vec<Bytes>) -> Result<(), QueueError>;

    /// Atomically returns and removes every item currently in `key`.
    async fn drain(&self, key: &str) -> Result<Vec<Bytes>, QueueError>;

    async fn len(&self, key: &str) -> Result<usize, QueueError>;

    /// Age of the oldest item still queued under `key`, if any.
    async fn oldest_age(&self, key: &str) -> Result<Option<Duration>, QueueError>;

    /// All live partition keys matching `"{prefix}:*"`.
    async fn scan_partitions(&self, prefix: &str) -> Result<Vec<String>, QueueError>;

    fn pipeline(&self) -> Box<dyn Pipeline>;
}
