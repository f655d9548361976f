/// 缓存操作
pub mod link;

pub use link::CacheService;
