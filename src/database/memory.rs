use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{KeyValueStore, StoreError, StoreRow};

/// 进程内存实现，用于本地运行和测试
#[derive(Default)]
pub struct MemoryKeyValueStore {
    rows: RwLock<HashMap<String, StoreRow>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn upsert(&self, key: &str, value: &str, expires_at: i64) -> Result<(), StoreError> {
        self.rows.write().await.insert(
            key.to_string(),
            StoreRow {
                key: key.to_string(),
                value: Some(value.to_string()),
                expires_at,
            },
        );
        Ok(())
    }

    async fn update_value(&self, key: &str, value: &str) -> Result<(), StoreError> {
        if let Some(row) = self.rows.write().await.get_mut(key) {
            row.value = Some(value.to_string());
        }
        Ok(())
    }

    async fn select(&self, key: &str) -> Result<Option<StoreRow>, StoreError> {
        Ok(self.rows.read().await.get(key).cloned())
    }

    async fn select_unexpired(&self, now: i64) -> Result<Vec<StoreRow>, StoreError> {
        Ok(self
            .rows
            .read()
            .await
            .values()
            .filter(|row| row.expires_at > now)
            .cloned()
            .collect())
    }

    async fn select_unresolved_keys(&self, now: i64) -> Result<Vec<String>, StoreError> {
        Ok(self
            .rows
            .read()
            .await
            .values()
            .filter(|row| row.expires_at > now && row.value.as_deref().is_none_or(str::is_empty))
            .map(|row| row.key.clone())
            .collect())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.rows.write().await.remove(key);
        Ok(())
    }

    async fn delete_all(&self) -> Result<u64, StoreError> {
        let mut rows = self.rows.write().await;
        let count = rows.len() as u64;
        rows.clear();
        Ok(count)
    }

    async fn clear_values_unexpired(&self, now: i64) -> Result<u64, StoreError> {
        let mut count = 0;
        for row in self.rows.write().await.values_mut() {
            if row.expires_at > now {
                row.value = Some(String::new());
                count += 1;
            }
        }
        Ok(count)
    }
}
