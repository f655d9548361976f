use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use super::{KeyValueStore, StoreError, StoreRow};
use crate::config::Config;

/// 基于 Postgres 的键值存储，表结构：
/// `"key" TEXT PRIMARY KEY, "value" TEXT, "expiresAt" BIGINT`
pub struct PgKeyValueStore {
    pool: PgPool,
    table: String,
}

impl PgKeyValueStore {
    pub fn new(pool: PgPool, table: &str) -> Result<Self, StoreError> {
        if !is_valid_table_name(table) {
            return Err(StoreError::InvalidTable(table.to_string()));
        }

        Ok(Self {
            pool,
            table: table.to_string(),
        })
    }

    /// 根据配置建立连接池；缺少 DATABASE_URL 时直接失败
    pub async fn connect(config: &Config) -> Result<Self, StoreError> {
        let url = config
            .database_url
            .as_deref()
            .ok_or_else(|| StoreError::NotConfigured("DATABASE_URL is not set".into()))?;

        if !is_valid_table_name(&config.cache_table) {
            return Err(StoreError::InvalidTable(config.cache_table.clone()));
        }

        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await?;

        Self::new(pool, &config.cache_table)
    }

    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        let sql = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                "key" TEXT PRIMARY KEY,
                "value" TEXT NOT NULL DEFAULT '',
                "expiresAt" BIGINT NOT NULL
            )
            "#,
            self.table
        );
        sqlx::query(&sql).execute(&self.pool).await?;
        tracing::info!("Cache table {} is ready", self.table);
        Ok(())
    }
}

fn is_valid_table_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[async_trait]
impl KeyValueStore for PgKeyValueStore {
    async fn upsert(&self, key: &str, value: &str, expires_at: i64) -> Result<(), StoreError> {
        let sql = format!(
            r#"
            INSERT INTO {} ("key", "value", "expiresAt")
            VALUES ($1, $2, $3)
            ON CONFLICT ("key") DO UPDATE
            SET "value" = EXCLUDED."value", "expiresAt" = EXCLUDED."expiresAt"
            "#,
            self.table
        );
        sqlx::query(&sql)
            .bind(key)
            .bind(value)
            .bind(expires_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_value(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let sql = format!(r#"UPDATE {} SET "value" = $2 WHERE "key" = $1"#, self.table);
        sqlx::query(&sql)
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn select(&self, key: &str) -> Result<Option<StoreRow>, StoreError> {
        let sql = format!(
            r#"SELECT "key", "value", "expiresAt" FROM {} WHERE "key" = $1"#,
            self.table
        );
        let row = sqlx::query_as::<_, StoreRow>(&sql)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn select_unexpired(&self, now: i64) -> Result<Vec<StoreRow>, StoreError> {
        let sql = format!(
            r#"SELECT "key", "value", "expiresAt" FROM {} WHERE "expiresAt" > $1"#,
            self.table
        );
        let rows = sqlx::query_as::<_, StoreRow>(&sql)
            .bind(now)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn select_unresolved_keys(&self, now: i64) -> Result<Vec<String>, StoreError> {
        let sql = format!(
            r#"SELECT "key" FROM {} WHERE ("value" IS NULL OR "value" = '') AND "expiresAt" > $1"#,
            self.table
        );
        let keys = sqlx::query_scalar::<_, String>(&sql)
            .bind(now)
            .fetch_all(&self.pool)
            .await?;
        Ok(keys)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let sql = format!(r#"DELETE FROM {} WHERE "key" = $1"#, self.table);
        sqlx::query(&sql).bind(key).execute(&self.pool).await?;
        Ok(())
    }

    async fn delete_all(&self) -> Result<u64, StoreError> {
        let sql = format!("DELETE FROM {}", self.table);
        let result = sqlx::query(&sql).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn clear_values_unexpired(&self, now: i64) -> Result<u64, StoreError> {
        let sql = format!(
            r#"UPDATE {} SET "value" = '' WHERE "expiresAt" > $1"#,
            self.table
        );
        let result = sqlx::query(&sql).bind(now).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}
