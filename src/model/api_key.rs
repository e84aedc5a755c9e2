//! Per-api-key submission metrics are opt-in, resolved from this table.

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::FromRow;
use std::collections::HashMap;

#[derive(Debug, Clone, FromRow)]
struct ApiKeyRow {
    should_log_submit: bool,
}

/// Resolves whether a given api key's policy permits emitting
/// per-key `data.report.*`/`data.observation.*` metrics. Unknown keys
/// resolve to `false` — counts still accumulate, they are simply not
/// tagged and emitted as metrics.
#[async_trait]
pub trait ApiKeyRepo: Send + Sync {
    async fn should_log_submissions(&self, api_key: &str) -> Result<bool, sqlx::Error>;
}

pub struct PostgresApiKeyRepo {
    pool: PgPool,
}

impl PostgresApiKeyRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ApiKeyRepo for PostgresApiKeyRepo {
    async fn should_log_submissions(&self, api_key: &str) -> Result<bool, sqlx::Error> {
        let row = sqlx::query_as::<_, ApiKeyRow>(
            "SELECT should_log_submit FROM api_keys WHERE valid_key = $1",
        )
        .bind(api_key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|row| row.should_log_submit).unwrap_or(false))
    }
}

#[derive(Default)]
pub struct InMemoryApiKeyRepo {
    policies: HashMap<String, bool>,
}

impl InMemoryApiKeyRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(mut self, api_key: impl Into<String>, should_log: bool) -> Self {
        self.policies.insert(api_key.into(), should_log);
        self
    }
}

#[async_trait]
impl ApiKeyRepo for InMemoryApiKeyRepo {
    async fn should_log_submissions(&self, api_key: &str) -> Result<bool, sqlx::Error> {
        Ok(self.policies.get(api_key).copied().unwrap_or(false))
    }
}
