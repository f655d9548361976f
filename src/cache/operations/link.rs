use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::models::CacheEntry;
use crate::database::{KeyValueStore, StoreError};
use crate::utils::now_millis;

/// 链接缓存服务
///
/// 读路径上过期行视为不存在并顺手删除；存储层错误原样向上抛出，不做重试。
pub struct CacheService {
    store: Arc<dyn KeyValueStore>,
    ttl: Duration,
}

impl CacheService {
    pub fn new(store: Arc<dyn KeyValueStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// 登记 key：value 置空，过期时间刷新为 now + ttl
    ///
    /// 已解析的值同样会被覆盖为空，下一次填充时重新解析。
    pub async fn register(&self, key: &str) -> Result<i64, StoreError> {
        let expires_at = now_millis() + self.ttl.as_millis() as i64;
        self.store.upsert(key, "", expires_at).await?;
        tracing::debug!("Registered cache key {} until {}", key, expires_at);
        Ok(expires_at)
    }

    /// 批量登记，去掉空白和重复的 key，返回实际登记的 key
    pub async fn register_batch<I, S>(&self, keys: I) -> Result<Vec<String>, StoreError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut registered = Vec::new();

        for key in keys {
            let key = key.as_ref().trim();
            if key.is_empty() || !seen.insert(key.to_string()) {
                continue;
            }
            self.register(key).await?;
            registered.push(key.to_string());
        }

        Ok(registered)
    }

    /// 只更新 value，不改过期时间；key 不存在时静默忽略
    pub async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.store.update_value(key, value).await
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let Some(row) = self.store.select(key).await? else {
            return Ok(None);
        };

        if row.expires_at <= now_millis() {
            // 懒删除，失败无所谓
            if let Err(e) = self.store.delete(key).await {
                tracing::warn!("Failed to purge expired cache key {}: {}", key, e);
            }
            return Ok(None);
        }

        Ok(row.value.filter(|v| !v.trim().is_empty()))
    }

    pub async fn list_entries(&self) -> Result<Vec<CacheEntry>, StoreError> {
        let rows = self.store.select_unexpired(now_millis()).await?;
        Ok(rows.into_iter().map(CacheEntry::from).collect())
    }

    pub async fn clear_all(&self) -> Result<u64, StoreError> {
        let removed = self.store.delete_all().await?;
        tracing::info!("Cleared all cache entries ({} rows)", removed);
        Ok(removed)
    }

    /// 清空未过期行的 value，保留 key 和过期时间，用于强制重新解析
    pub async fn clear_values_only(&self) -> Result<u64, StoreError> {
        let cleared = self.store.clear_values_unexpired(now_millis()).await?;
        tracing::info!("Cleared values of {} cache entries", cleared);
        Ok(cleared)
    }

    /// 尚未解析且未过期的 key
    pub async fn unresolved_keys(&self) -> Result<Vec<String>, StoreError> {
        self.store.select_unresolved_keys(now_millis()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryKeyValueStore;

    const DAY: Duration = Duration::from_secs(24 * 3600);

    fn service() -> (CacheService, Arc<MemoryKeyValueStore>) {
        let store = Arc::new(MemoryKeyValueStore::new());
        (CacheService::new(store.clone(), DAY), store)
    }

    #[tokio::test]
    async fn register_creates_unresolved_entry_with_ttl() {
        let (cache, store) = service();
        let before = now_millis();

        let expires_at = cache.register("https://medium.com/a/1").await.unwrap();

        let row = store.select("https://medium.com/a/1").await.unwrap().unwrap();
        assert_eq!(row.value.as_deref(), Some(""));
        assert_eq!(row.expires_at, expires_at);
        assert!(expires_at >= before + DAY.as_millis() as i64);
        assert_eq!(cache.get("https://medium.com/a/1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn register_twice_keeps_one_row_with_latest_ttl() {
        let (cache, _) = service();
        let first = cache.register("k").await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = cache.register("k").await.unwrap();

        let entries = cache.list_entries().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].expires_at, second);
        assert!(second > first);
    }

    #[tokio::test]
    async fn register_overwrites_a_resolved_value() {
        let (cache, _) = service();
        cache.register("k").await.unwrap();
        cache.set("k", "https://resolved").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("https://resolved"));

        cache.register("k").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_keeps_expiry_and_ignores_missing_keys() {
        let (cache, store) = service();
        let expires_at = cache.register("k").await.unwrap();

        cache.set("k", "v").await.unwrap();
        cache.set("absent", "v").await.unwrap();

        let row = store.select("k").await.unwrap().unwrap();
        assert_eq!(row.expires_at, expires_at);
        assert_eq!(row.value.as_deref(), Some("v"));
        assert!(store.select("absent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_entries_read_as_absent_and_are_purged() {
        let (cache, store) = service();
        store.upsert("old", "https://v", now_millis() - 1).await.unwrap();
        store.upsert("fresh", "https://w", now_millis() + 60_000).await.unwrap();

        assert_eq!(cache.get("old").await.unwrap(), None);
        assert!(store.select("old").await.unwrap().is_none());

        let keys: Vec<_> = cache
            .list_entries()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.key)
            .collect();
        assert_eq!(keys, vec!["fresh".to_string()]);
    }

    #[tokio::test]
    async fn expired_entries_are_excluded_from_listing_before_any_read() {
        let (cache, store) = service();
        store.upsert("old", "v", now_millis() - 10).await.unwrap();
        assert!(cache.list_entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn whitespace_values_read_as_absent() {
        let (cache, store) = service();
        store.upsert("blank", "   ", now_millis() + 60_000).await.unwrap();
        assert_eq!(cache.get("blank").await.unwrap(), None);
    }

    #[tokio::test]
    async fn clear_values_only_preserves_keys_and_expiry() {
        let (cache, store) = service();
        let a = cache.register("a").await.unwrap();
        let b = cache.register("b").await.unwrap();
        cache.set("a", "https://a").await.unwrap();
        cache.set("b", "https://b").await.unwrap();
        store.upsert("gone", "https://c", now_millis() - 1).await.unwrap();

        assert_eq!(cache.clear_values_only().await.unwrap(), 2);

        let mut entries = cache.list_entries().await.unwrap();
        entries.sort_by(|x, y| x.key.cmp(&y.key));
        assert_eq!(
            entries,
            vec![
                CacheEntry {
                    key: "a".into(),
                    value: String::new(),
                    expires_at: a
                },
                CacheEntry {
                    key: "b".into(),
                    value: String::new(),
                    expires_at: b
                },
            ]
        );
    }

    #[tokio::test]
    async fn clear_all_removes_every_row() {
        let (cache, store) = service();
        cache.register("a").await.unwrap();
        store.upsert("expired", "", now_millis() - 1).await.unwrap();

        assert_eq!(cache.clear_all().await.unwrap(), 2);
        assert!(cache.list_entries().await.unwrap().is_empty());
        assert!(store.select("expired").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn register_batch_skips_blank_and_duplicate_keys() {
        let (cache, _) = service();
        let registered = cache
            .register_batch(["a", " a ", "", "b", "  "])
            .await
            .unwrap();

        assert_eq!(registered, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(cache.list_entries().await.unwrap().len(), 2);
    }
}
