// 缓存模块
// 带 TTL 的链接缓存：登记、读取、写入、列举和维护清理

pub mod models;
pub mod operations;

pub use models::entry::CacheEntry;
pub use operations::link::CacheService;
