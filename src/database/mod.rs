// 键值存储模块
// 缓存表的行级操作抽象，以及 Postgres / 内存两种实现

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

pub use memory::MemoryKeyValueStore;
pub use postgres::PgKeyValueStore;

/// 缓存表中的一行
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct StoreRow {
    pub key: String,
    pub value: Option<String>,
    #[sqlx(rename = "expiresAt")]
    pub expires_at: i64, // epoch 毫秒
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("key-value store is not configured: {0}")]
    NotConfigured(String),

    #[error("invalid cache table name: {0}")]
    InvalidTable(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// 远程键值存储的行级操作
///
/// 所有写操作都是单行 upsert/update，没有事务，最后写入者生效。
#[async_trait]
pub trait KeyValueStore: Send + Sync + 'static {
    /// 插入或覆盖整行
    async fn upsert(&self, key: &str, value: &str, expires_at: i64) -> Result<(), StoreError>;

    /// 只更新 value，不存在时不做任何事
    async fn update_value(&self, key: &str, value: &str) -> Result<(), StoreError>;

    async fn select(&self, key: &str) -> Result<Option<StoreRow>, StoreError>;

    /// expires_at > now 的所有行
    async fn select_unexpired(&self, now: i64) -> Result<Vec<StoreRow>, StoreError>;

    /// value 为空（或 NULL）且 expires_at > now 的 key
    async fn select_unresolved_keys(&self, now: i64) -> Result<Vec<String>, StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    async fn delete_all(&self) -> Result<u64, StoreError>;

    /// 把 expires_at > now 的行的 value 清空，保留 key 和过期时间
    async fn clear_values_unexpired(&self, now: i64) -> Result<u64, StoreError>;
}
