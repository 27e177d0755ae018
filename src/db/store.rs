//! SQLite-backed session store.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};

use crate::errors::StoreError;
use crate::session::{SessionStore, SESSION_KEY};

/// Persists the session identity in the `client_state` table.
#[derive(Clone)]
pub struct SqliteSessionStore {
    pool: SqlitePool,
}

impl SqliteSessionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn load(&self) -> Result<Option<String>, StoreError> {
        let row = sqlx::query("SELECT value FROM client_state WHERE key = ?")
            .bind(SESSION_KEY)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get("value")))
    }

    async fn save(&self, value: &str) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO client_state (key, value, updated_at) VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(SESSION_KEY)
        .bind(value)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_database;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_load_save_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("nested").join("session.sqlite");

        let store = SqliteSessionStore::new(init_database(&db_path).await.unwrap());
        assert_eq!(store.load().await.unwrap(), None);

        store.save("aaaa").await.unwrap();
        store.save("bbbb").await.unwrap();
        assert_eq!(store.load().await.unwrap().as_deref(), Some("bbbb"));

        let reopened = SqliteSessionStore::new(init_database(&db_path).await.unwrap());
        assert_eq!(reopened.load().await.unwrap().as_deref(), Some("bbbb"));
    }
}
