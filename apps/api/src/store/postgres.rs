use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;

use super::{KeyValueStore, Scope, StoreError};

/// Key-value store backed by a single JSONB table.
#[derive(Clone)]
pub struct PgKeyValueStore {
    pool: PgPool,
}

impl PgKeyValueStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KeyValueStore for PgKeyValueStore {
    async fn get(&self, scope: Scope, key: &str) -> Result<Option<Value>, StoreError> {
        let value: Option<Value> =
            sqlx::query_scalar("SELECT value FROM kv_store WHERE scope = $1 AND key = $2")
                .bind(scope.as_str())
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(value)
    }

    async fn set(&self, scope: Scope, key: &str, value: Value) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO kv_store (scope, key, value, updated_at)
            VALUES ($1, $2, $3, now())
            ON CONFLICT (scope, key)
            DO UPDATE SET value = EXCLUDED.value, updated_at = now()
            "#,
        )
        .bind(scope.as_str())
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove(&self, scope: Scope, key: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM kv_store WHERE scope = $1 AND key = $2")
            .bind(scope.as_str())
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::db::{create_pool, ensure_schema};
    use crate::models::job::JobRecord;
    use crate::store::{load_jobs, save_jobs};

    /// Connects to `DATABASE_URL` and prepares the table. `None` (test skipped) when unset.
    async fn pg_store() -> Option<PgKeyValueStore> {
        let url = std::env::var("DATABASE_URL").ok()?;
        let pool = create_pool(&url).await.unwrap();
        ensure_schema(&pool).await.unwrap();
        Some(PgKeyValueStore::new(pool))
    }

    fn unique_key(prefix: &str) -> String {
        format!("{prefix}-{}", chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default())
    }

    #[tokio::test]
    async fn test_set_get_overwrite_remove() {
        let Some(kv) = pg_store().await else {
            eprintln!("DATABASE_URL not set, skipping");
            return;
        };
        let key = unique_key("roundtrip");

        assert_eq!(kv.get(Scope::Local, &key).await.unwrap(), None);
        kv.set(Scope::Local, &key, json!({"a": [1, 2]})).await.unwrap();
        kv.set(Scope::Local, &key, json!({"a": [3]})).await.unwrap();
        assert_eq!(kv.get(Scope::Local, &key).await.unwrap(), Some(json!({"a": [3]})));
        // scopes are separate namespaces
        assert_eq!(kv.get(Scope::Sync, &key).await.unwrap(), None);

        kv.remove(Scope::Local, &key).await.unwrap();
        assert_eq!(kv.get(Scope::Local, &key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_jobs_survive_jsonb_storage() {
        let Some(kv) = pg_store().await else {
            eprintln!("DATABASE_URL not set, skipping");
            return;
        };
        // the job list lives under a fixed key, so run against a scratch database
        let before = load_jobs(&kv).await.unwrap();
        let job = JobRecord {
            url: format!("https://jobs.example.com/{}", unique_key("pg")),
            title: "Engineer ✓ \"quoted\"".to_string(),
            desirability_score: Some(72),
            ..Default::default()
        };
        let mut jobs = before.clone();
        jobs.push(job.clone());
        save_jobs(&kv, &jobs).await.unwrap();

        let loaded = load_jobs(&kv).await.unwrap();
        assert_eq!(loaded.last(), Some(&job));

        save_jobs(&kv, &before).await.unwrap();
    }
}
