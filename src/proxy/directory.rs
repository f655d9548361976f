use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};

use crate::config::Config;
use crate::error::AppError;

/// 代理目录返回的一条代理
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyDescriptor {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub username: String,
    pub password: String,
    #[serde(alias = "proxy_address")]
    pub address: String,
    pub port: u16,
    #[serde(alias = "validityFlag", default)]
    pub valid: bool,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(alias = "city_name", default)]
    pub city: Option<String>,
}

impl ProxyDescriptor {
    pub fn endpoint(&self) -> String {
        format!("http://{}:{}", self.address, self.port)
    }
}

#[derive(Debug, Deserialize)]
struct ProxyListing {
    results: Vec<ProxyDescriptor>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(i64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}

/// 解析目录响应，只保留 valid 的代理
pub fn parse_proxy_listing(body: &str) -> Result<Vec<ProxyDescriptor>, AppError> {
    let listing: ProxyListing =
        serde_json::from_str(body).map_err(|e| AppError::UpstreamShape(e.to_string()))?;

    Ok(listing.results.into_iter().filter(|p| p.valid).collect())
}

/// 出站代理目录
///
/// 软依赖：任何失败都退化为空列表。
#[async_trait]
pub trait ProxyDirectory: Send + Sync {
    async fn list_valid_proxies(&self) -> Vec<ProxyDescriptor>;
}

pub struct HttpProxyDirectory {
    client: Client,
    url: String,
    token: Option<String>,
}

impl HttpProxyDirectory {
    pub fn new(url: impl Into<String>, token: Option<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build proxy directory client: {}", e);
                Client::new()
            });

        Self {
            client,
            url: url.into(),
            token,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.proxy_directory_url.clone(),
            config.proxy_directory_token.clone(),
            config.fetch_timeout(),
        )
    }
}

#[async_trait]
impl ProxyDirectory for HttpProxyDirectory {
    async fn list_valid_proxies(&self) -> Vec<ProxyDescriptor> {
        let Some(token) = self.token.as_deref() else {
            tracing::warn!("PROXY_DIRECTORY_TOKEN is not set, no proxies available");
            return Vec::new();
        };

        let response = match self.client.get(&self.url).bearer_auth(token).send().await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!("Proxy directory request failed: {}", e);
                return Vec::new();
            }
        };

        if !response.status().is_success() {
            tracing::warn!("Proxy directory answered {}", response.status());
            return Vec::new();
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!("Failed to read proxy directory body: {}", e);
                return Vec::new();
            }
        };

        match parse_proxy_listing(&body) {
            Ok(proxies) => {
                tracing::debug!("Proxy directory returned {} valid proxies", proxies.len());
                proxies
            }
            Err(e) => {
                tracing::warn!("Malformed proxy directory body: {}", e);
                Vec::new()
            }
        }
    }
}
