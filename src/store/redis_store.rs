use async_trait::async_trait;
use bytes::Bytes;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::{Pipeline, QueueError, Store};

/// Redis-backed [`Store`]. Lists hold one partition's encoded items;
/// a companion `{key}:since` string (set with `NX` the moment a list
/// transitions from empty to non-empty, cleared on drain) tracks the
/// age of the oldest queued item for TTL-based readiness.
#[derive(Clone)]
pub struct RedisStore {
    manager: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(url: &str) -> Result<Self, QueueError> {
        let client = redis::Client::open(url)
            .map_err(|err| QueueError::transport(format!("invalid redis url: {err}")))?;
        let manager = client
            .get_connection_manager()
            .await
            .map_err(|err| QueueError::transport(format!("redis connect failed: {err}")))?;
        Ok(Self { manager })
    }

    fn since_key(key: &str) -> String {
        format!("{key}:since")
    }

    fn now_millis() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn enqueue(&self, key: &str, items: Vec<Bytes>) -> Result<(), QueueError> {
        if items.is_empty() {
            return Ok(());
        }
        let mut conn = self.manager.clone();
        let raw: Vec<Vec<u8>> = items.into_iter().map(|b| b.to_vec()).collect();
        let since = Self::since_key(key);
        let now = Self::now_millis().to_string();

        redis::pipe()
            .atomic()
            .rpush(key, raw)
            .ignore()
            .cmd("SET")
            .arg(&since)
            .arg(now)
            .arg("NX")
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|err| QueueError::transport(format!("enqueue failed: {err}")))?;
        Ok(())
    }

    async fn drain(&self, key: &str) -> Result<Vec<Bytes>, QueueError> {
        let mut conn = self.manager.clone();
        let since = Self::since_key(key);

        let (items,): (Vec<Vec<u8>>,) = redis::pipe()
            .atomic()
            .lrange(key, 0, -1)
            .del(key)
            .ignore()
            .del(&since)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(|err| QueueError::transport(format!("drain failed: {err}")))?;

        Ok(items.into_iter().map(Bytes::from).collect())
    }

    async fn len(&self, key: &str) -> Result<usize, QueueError> {
        let mut conn = self.manager.clone();
        conn.llen(key)
            .await
            .map_err(|err| QueueError::transport(format!("len failed: {err}")))
    }

    async fn oldest_age(&self, key: &str) -> Result<Option<Duration>, QueueError> {
        let mut conn = self.manager.clone();
        let since_key = Self::since_key(key);
        let since: Option<String> = conn
            .get(&since_key)
            .await
            .map_err(|err| QueueError::transport(format!("oldest_age failed: {err}")))?;

        Ok(since.and_then(|raw| raw.parse::<u64>().ok()).map(|since_ms| {
            let now_ms = Self::now_millis();
            Duration::from_millis(now_ms.saturating_sub(since_ms))
        }))
    }

    async fn scan_partitions(&self, prefix: &str) -> Result<Vec<String>, QueueError> {
        let mut conn = self.manager.clone();
        let pattern = format!("{prefix}:*");
        let mut keys = Vec::new();
        let mut iter: redis::AsyncIter<String> = conn
            .scan_match(&pattern)
            .await
            .map_err(|err| QueueError::transport(format!("scan failed: {err}")))?;
        while let Some(key) = futures::StreamExt::next(&mut iter).await {
            if !key.ends_with(":since") {
                keys.push(key);
            }
        }
        Ok(keys)
    }

    fn pipeline(&self) -> Box<dyn Pipeline> {
        Box::new(RedisPipeline {
            manager: self.manager.clone(),
            staged: Vec::new(),
        })
    }
}

struct RedisPipeline {
    manager: ConnectionManager,
    staged: Vec<(String, Vec<Bytes>)>,
}

#[async_trait]
impl Pipeline for RedisPipeline {
    fn stage_enqueue(&mut self, key: &str, items: Vec<Bytes>) {
        if items.is_empty() {
            return;
        }
        self.staged.push((key.to_string(), items));
    }

    async fn commit(self: Box<Self>) -> Result<(), QueueError> {
        if self.staged.is_empty() {
            return Ok(());
        }
        let mut conn = self.manager;
        let now = RedisStore::now_millis().to_string();
        let mut pipe = redis::pipe();
        pipe.atomic();
        for (key, items) in &self.staged {
            let raw: Vec<Vec<u8>> = items.iter().map(|b| b.to_vec()).collect();
            pipe.rpush(key, raw).ignore();
            pipe.cmd("SET")
                .arg(RedisStore::since_key(key))
                .arg(&now)
                .arg("NX")
                .ignore();
        }
        pipe.query_async::<_, ()>(&mut conn)
            .await
            .map_err(|err| QueueError::transport(format!("pipeline commit failed: {err}")))?;
        Ok(())
    }
}
