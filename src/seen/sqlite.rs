//! SQLite storage for the seen set.
//!
//! One table keyed by listing id; rowid order is insertion order.

use crate::error::StoreError;
use crate::models::SeenEntry;
use crate::seen::SeenBackend;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::{Path, PathBuf};

type SeenRow = (String, Option<String>, Option<String>, Option<String>, i64);

pub struct SqliteBackend {
    pool: SqlitePool,
    path: PathBuf,
}

impl SqliteBackend {
    /// Open (creating if needed) the database file at `path`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let backend = Self { pool, path };
        backend.run_migrations().await?;
        Ok(backend)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS seen (
                id TEXT PRIMARY KEY,
                url TEXT,
                title TEXT,
                price TEXT,
                seen_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl SeenBackend for SqliteBackend {
    async fn load(&self) -> Result<Vec<SeenEntry>, StoreError> {
        let rows: Vec<SeenRow> =
            sqlx::query_as("SELECT id, url, title, price, seen_at FROM seen ORDER BY rowid")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows
            .into_iter()
            .map(|(id, url, title, price, seen_at)| SeenEntry {
                id,
                url,
                title,
                price,
                seen_at: DateTime::<Utc>::from_timestamp(seen_at, 0).unwrap_or_else(Utc::now),
            })
            .collect())
    }

    async fn save(&self, entries: &[SeenEntry]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM seen").execute(&mut *tx).await?;
        for entry in entries {
            sqlx::query(
                "INSERT OR IGNORE INTO seen (id, url, title, price, seen_at) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&entry.id)
            .bind(entry.url.as_deref())
            .bind(entry.title.as_deref())
            .bind(entry.price.as_deref())
            .bind(entry.seen_at.timestamp())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("sqlite:{}", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seen::SeenStore;
    use crate::testing::sample_listing;

    fn temp_db() -> PathBuf {
        std::env::temp_dir().join(format!(
            "olx-sniper-{}-{}.sqlite",
            std::process::id(),
            rand::random::<u64>()
        ))
    }

    #[tokio::test]
    async fn round_trip_preserves_order_and_metadata() {
        let path = temp_db();

        let mut store = SeenStore::load(Box::new(SqliteBackend::open(&path).await.unwrap())).await;
        store.insert("z");
        store.insert_listing(&sample_listing("a"));
        store.insert("m");
        store.persist().await.unwrap();

        let backend = SqliteBackend::open(&path).await.unwrap();
        let entries = backend.load().await.unwrap();
        let ids: Vec<_> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["z", "a", "m"]);
        assert_eq!(entries[1].title.as_deref(), Some("iPhone a"));
        assert_eq!(entries[0].url, None);

        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn persist_after_prune_removes_rows() {
        let path = temp_db();

        let mut store = SeenStore::load(Box::new(SqliteBackend::open(&path).await.unwrap())).await;
        store.seed_all((0..10).map(|i| i.to_string()));
        store.persist().await.unwrap();
        store.prune(10);
        store.persist().await.unwrap();

        let reloaded = SeenStore::load(Box::new(SqliteBackend::open(&path).await.unwrap())).await;
        assert_eq!(reloaded.ids().collect::<Vec<_>>(), vec!["5", "6", "7", "8", "9"]);

        std::fs::remove_file(&path).ok();
    }
}
