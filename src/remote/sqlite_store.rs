//! Embedded sqlite-backed `RemoteStore`, used when `REMOTE_STORE_URL` is
//! unset (local dev/tests). Queries run through the runtime `sqlx::query`
//! API rather than the `sqlx::query!` compile-time macro - that macro needs a
//! live `DATABASE_URL` or pre-baked offline metadata at build time, neither of
//! which this table-per-engine schema has checked in.

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};

use crate::domain::models::Engine;
use crate::error::CoreResult;

use super::RemoteStore;

pub struct SqliteRemoteStore {
    pool: SqlitePool,
}

impl SqliteRemoteStore {
    pub async fn connect(database_url: &str) -> CoreResult<Self> {
        let pool = SqlitePoolOptions::new().max_connections(8).connect(database_url).await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> CoreResult<()> {
        for engine in Engine::ALL {
            let table = table_name(engine);
            let ddl = format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    natural_key TEXT NOT NULL UNIQUE,
                    data TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                )"
            );
            sqlx::query(&ddl).execute(&self.pool).await?;
        }
        Ok(())
    }
}

fn table_name(engine: Engine) -> &'static str {
    match engine {
        Engine::Prospecting => "prospects",
        Engine::Analysis => "analyses",
        Engine::Outreach => "outreach",
        Engine::Reports => "reports",
    }
}

#[async_trait]
impl RemoteStore for SqliteRemoteStore {
    async fn upsert(&self, engine: Engine, natural_key: &str, data: &serde_json::Value) -> CoreResult<String> {
        let table = table_name(engine);
        let payload = serde_json::to_string(data)?;
        let now = chrono::Utc::now().to_rfc3339();

        let sql = format!(
            "INSERT INTO {table} (natural_key, data, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(natural_key) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at
             RETURNING id"
        );
        let row = sqlx::query(&sql)
            .bind(natural_key)
            .bind(payload)
            .bind(now)
            .fetch_one(&self.pool)
            .await?;
        let id: i64 = row.try_get("id")?;
        Ok(id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn upsert_is_idempotent_on_natural_key() {
        let store = SqliteRemoteStore::connect("sqlite::memory:").await.unwrap();

        let id1 = store
            .upsert(Engine::Analysis, "https://example.com", &json!({"score": 70}))
            .await
            .unwrap();
        let id2 = store
            .upsert(Engine::Analysis, "https://example.com", &json!({"score": 90}))
            .await
            .unwrap();

        assert_eq!(id1, id2);

        let row = sqlx::query("SELECT data FROM analyses WHERE natural_key = ?1")
            .bind("https://example.com")
            .fetch_one(&store.pool)
            .await
            .unwrap();
        let data: String = row.try_get("data").unwrap();
        assert!(data.contains("90"));
    }

    #[tokio::test]
    async fn distinct_keys_produce_distinct_rows() {
        let store = SqliteRemoteStore::connect("sqlite::memory:").await.unwrap();
        let id1 = store.upsert(Engine::Prospecting, "key-a", &json!({})).await.unwrap();
        let id2 = store.upsert(Engine::Prospecting, "key-b", &json!({})).await.unwrap();
        assert_ne!(id1, id2);
    }
}
