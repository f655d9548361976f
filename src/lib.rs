use std::sync::Arc;

use cache::CacheService;
use config::Config;
use database::KeyValueStore;
use resolver::LinkResolver;
use sweep::{Populator, SweepPacing};

pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod middleware;
pub mod proxy;
pub mod resolver;
pub mod router;
pub mod routes;
pub mod sweep;
pub mod utils;

/// 进程内共享状态，启动时显式构建，通过 axum State 注入到各个 handler
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub cache: Arc<CacheService>,
    pub resolver: Arc<dyn LinkResolver>,
    pub populator: Arc<Populator>,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn KeyValueStore>,
        resolver: Arc<dyn LinkResolver>,
    ) -> Self {
        let cache = Arc::new(CacheService::new(store, config.cache_ttl()));
        let populator = Arc::new(Populator::new(
            cache.clone(),
            resolver.clone(),
            config.member_marker.clone(),
            config.head_limit,
            SweepPacing::from_config(&config),
        ));

        Self {
            config,
            cache,
            resolver,
            populator,
        }
    }
}
