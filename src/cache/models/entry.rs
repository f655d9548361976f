use serde::{Deserialize, Serialize};

use crate::database::StoreRow;

/// 对外暴露的缓存条目
///
/// `value` 为空字符串表示已登记但尚未解析。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub key: String,
    pub value: String,
    pub expires_at: i64, // epoch 毫秒
}

impl From<StoreRow> for CacheEntry {
    fn from(row: StoreRow) -> Self {
        Self {
            key: row.key,
            value: row.value.unwrap_or_default(),
            expires_at: row.expires_at,
        }
    }
}
