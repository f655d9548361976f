use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use linkcache::{
    AppState,
    config::Config,
    database::PgKeyValueStore,
    middleware::{RateLimiter, rate_limit},
    proxy::{HttpProxyDirectory, ProxyFetcher},
    resolver::MediumResolver,
    router::create_router,
};
#[cfg(debug_assertions)]
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置
    let config = Config::from_env().expect("Failed to load configuration");

    // 缓存表，缺少 DATABASE_URL 时直接退出
    let store = PgKeyValueStore::connect(&config)
        .await
        .expect("Failed to set up key-value store");
    store
        .ensure_schema()
        .await
        .expect("Failed to prepare cache table");

    // 代理目录 -> 代理抓取 -> 链接解析
    let directory = Arc::new(HttpProxyDirectory::from_config(&config));
    let fetcher = Arc::new(ProxyFetcher::new(directory, config.fetch_timeout()));
    let resolver = Arc::new(MediumResolver::new(fetcher));

    let state = AppState::new(config.clone(), Arc::new(store), resolver);
    let router = create_router(state);

    // 配置了 Redis 才启用限流
    let router = match config.redis_url.as_deref() {
        Some(url) => {
            let redis_client = redis::Client::open(url).expect("Failed to create Redis client");
            let rate_limiter = Arc::new(RateLimiter::new(redis_client, config.clone()));
            tracing::info!("Rate limiting enabled");
            router.layer(axum::middleware::from_fn_with_state(rate_limiter, rate_limit))
        }
        None => {
            tracing::info!("REDIS_URL not set, rate limiting disabled");
            router
        }
    };

    // 开发模式允许跨域
    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding CORS layer for development mode");
        router.layer(CorsLayer::permissive())
    };

    let addr = SocketAddr::new(
        config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        config.server_port,
    );
    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Failed to start server");
}
