use std::env;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_PROXY_DIRECTORY_URL: &str =
    "https://proxy.webshare.io/api/v2/proxy/list/?mode=direct&page=1&page_size=100";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub cache_table: String,
    pub redis_url: Option<String>,
    pub server_host: String,
    pub server_port: u16,
    pub api_base_uri: String,
    pub proxy_directory_url: String,
    pub proxy_directory_token: Option<String>,
    pub fetch_timeout_secs: u64,
    pub member_marker: String,
    pub head_limit: usize,
    pub cache_ttl_hours: u64,
    pub sweep_success_delay_ms: u64,
    pub sweep_failure_delay_ms: u64,
    pub jwt_secret: Option<String>,
    pub admin_principal: Option<String>,
    pub rate_limit_window_secs: u64,
    pub rate_limit_requests: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_url: None,
            cache_table: "link_cache".into(),
            redis_url: None,
            server_host: "0.0.0.0".into(),
            server_port: 3000,
            api_base_uri: "/api".into(),
            proxy_directory_url: DEFAULT_PROXY_DIRECTORY_URL.into(),
            proxy_directory_token: None,
            fetch_timeout_secs: 20,
            member_marker: "Member-only story".into(),
            head_limit: 60_000,
            cache_ttl_hours: 24,
            sweep_success_delay_ms: 500,
            sweep_failure_delay_ms: 1000,
            jwt_secret: None,
            admin_principal: None,
            rate_limit_window_secs: 60,
            rate_limit_requests: 100,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenv::dotenv().ok();

        let defaults = Config::default();
        let rate_limit_window = env::var("RATE_LIMIT_WINDOW")
            .map(|v| v.trim_end_matches('s').to_string())
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.rate_limit_window_secs);

        Ok(Config {
            database_url: optional("DATABASE_URL"),
            cache_table: optional("CACHE_TABLE").unwrap_or(defaults.cache_table),
            redis_url: optional("REDIS_URL"),
            server_host: optional("SERVER_HOST").unwrap_or(defaults.server_host),
            server_port: parsed("SERVER_PORT", defaults.server_port),
            api_base_uri: optional("API_BASE_URI").unwrap_or(defaults.api_base_uri),
            proxy_directory_url: optional("PROXY_DIRECTORY_URL")
                .unwrap_or(defaults.proxy_directory_url),
            proxy_directory_token: optional("PROXY_DIRECTORY_TOKEN"),
            fetch_timeout_secs: parsed("FETCH_TIMEOUT_SECS", defaults.fetch_timeout_secs),
            // 标记文本允许包含空格，不做 trim
            member_marker: env::var("MEMBER_MARKER").unwrap_or(defaults.member_marker),
            head_limit: parsed("HEAD_LIMIT", defaults.head_limit),
            cache_ttl_hours: parsed("CACHE_TTL_HOURS", defaults.cache_ttl_hours),
            sweep_success_delay_ms: parsed(
                "SWEEP_SUCCESS_DELAY_MS",
                defaults.sweep_success_delay_ms,
            ),
            sweep_failure_delay_ms: parsed(
                "SWEEP_FAILURE_DELAY_MS",
                defaults.sweep_failure_delay_ms,
            ),
            jwt_secret: optional("JWT_SECRET"),
            admin_principal: optional("ADMIN_PRINCIPAL"),
            rate_limit_window_secs: rate_limit_window,
            rate_limit_requests: parsed("RATE_LIMIT_REQUESTS", defaults.rate_limit_requests),
        })
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_hours * 3600)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    pub fn sweep_success_delay(&self) -> Duration {
        Duration::from_millis(self.sweep_success_delay_ms)
    }

    pub fn sweep_failure_delay(&self) -> Duration {
        Duration::from_millis(self.sweep_failure_delay_ms)
    }
}

fn optional(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parsed<T: FromStr>(key: &str, default: T) -> T {
    match optional(key) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid value for {}: {:?}, using default", key, raw);
            default
        }),
        None => default,
    }
}
