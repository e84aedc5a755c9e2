//! Resolves nicknames to a stable `userid`, creating a user row on first sight.

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::FromRow;
use std::collections::HashMap;
use std::sync::Mutex;

/// Nicknames outside this window never resolve to a user.
pub const NICKNAME_MIN_LEN: usize = 2;
pub const NICKNAME_MAX_LEN: usize = 128;

pub fn nickname_in_window(nickname: &str) -> bool {
    let len = nickname.chars().count();
    (NICKNAME_MIN_LEN..=NICKNAME_MAX_LEN).contains(&len)
}

#[derive(Debug, Clone, FromRow)]
struct UserRow {
    id: i64,
}

/// Resolves a nickname to a stable `userid`, creating a row if absent.
/// Abstracted behind a trait so the internal sink can be exercised
/// without a live Postgres instance.
#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn resolve(&self, nickname: &str) -> Result<i64, sqlx::Error>;
}

pub struct PostgresUserRepo {
    pool: PgPool,
}

impl PostgresUserRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepo for PostgresUserRepo {
    async fn resolve(&self, nickname: &str) -> Result<i64, sqlx::Error> {
        if let Some(row) = sqlx::query_as::<_, UserRow>("SELECT id FROM users WHERE nickname = $1")
            .bind(nickname)
            .fetch_optional(&self.pool)
            .await?
        {
            return Ok(row.id);
        }

        let row = sqlx::query_as::<_, UserRow>(
            "INSERT INTO users (nickname) VALUES ($1) RETURNING id",
        )
        .bind(nickname)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.id)
    }
}

/// In-memory fake used by tests.
#[derive(Default)]
pub struct InMemoryUserRepo {
    by_nickname: Mutex<HashMap<String, i64>>,
    next_id: Mutex<i64>,
}

impl InMemoryUserRepo {
    pub fn new() -> Self {
        Self {
            by_nickname: Mutex::new(HashMap::new()),
            next_id: Mutex::new(1),
        }
    }
}

#[async_trait]
impl UserRepo for InMemoryUserRepo {
    async fn resolve(&self, nickname: &str) -> Result<i64, sqlx::Error> {
        let mut by_nickname = self.by_nickname.lock().unwrap();
        if let Some(id) = by_nickname.get(nickname) {
            return Ok(*id);
        }
        let mut next_id = self.next_id.lock().unwrap();
        let id = *next_id;
        *next_id += 1;
        by_nickname.insert(nickname.to_string(), id);
        Ok(id)
    }
}
