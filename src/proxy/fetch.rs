use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use rand::seq::SliceRandom;
use reqwest::Client;
use reqwest::header::{CACHE_CONTROL, HeaderMap, HeaderName, HeaderValue, PRAGMA, USER_AGENT};

use super::directory::{ProxyDescriptor, ProxyDirectory};

/// 每次抓取最多尝试的代理数
pub const MAX_PROXY_ATTEMPTS: usize = 5;

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
];

const FINGERPRINT_HEADERS: &[(&str, &str)] = &[
    (
        "sec-ch-ua",
        "\"Chromium\";v=\"124\", \"Google Chrome\";v=\"124\", \"Not-A.Brand\";v=\"99\"",
    ),
    ("sec-ch-ua-mobile", "?0"),
    ("sec-ch-ua-platform", "\"Windows\""),
    ("sec-fetch-dest", "document"),
    ("sec-fetch-mode", "navigate"),
    ("sec-fetch-site", "none"),
    ("sec-fetch-user", "?1"),
    ("upgrade-insecure-requests", "1"),
];

/// 成功抓到的页面
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub status: u16,
    pub body: String,
}

/// 页面抓取；失败一律返回 None，不抛错
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str, base_headers: &HeaderMap) -> Option<FetchedPage>;
}

/// 打乱代理顺序并截取前 limit 个
pub fn pick_candidates<R: Rng + ?Sized>(
    mut proxies: Vec<ProxyDescriptor>,
    limit: usize,
    rng: &mut R,
) -> Vec<ProxyDescriptor> {
    proxies.shuffle(rng);
    proxies.truncate(limit);
    proxies
}

/// 指纹头 + 调用方的头 + 随机 UA
///
/// 调用方的头覆盖指纹头，UA 总是从池子里随机挑。
pub fn browser_headers<R: Rng + ?Sized>(base: &HeaderMap, rng: &mut R) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for &(name, value) in FINGERPRINT_HEADERS {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));

    for (name, value) in base {
        headers.insert(name.clone(), value.clone());
    }

    if let Some(&agent) = USER_AGENTS.choose(rng) {
        headers.insert(USER_AGENT, HeaderValue::from_static(agent));
    }
    headers
}

/// 只走代理的抓取器
///
/// 代理列表为空时直接放弃，不回退到直连。
pub struct ProxyFetcher {
    directory: Arc<dyn ProxyDirectory>,
    timeout: Duration,
}

impl ProxyFetcher {
    pub fn new(directory: Arc<dyn ProxyDirectory>, timeout: Duration) -> Self {
        Self { directory, timeout }
    }

    fn client_for(&self, candidate: &ProxyDescriptor) -> Result<Client, reqwest::Error> {
        let proxy = reqwest::Proxy::all(candidate.endpoint())?
            .basic_auth(&candidate.username, &candidate.password);

        Client::builder()
            .proxy(proxy)
            .timeout(self.timeout)
            .build()
    }
}

#[async_trait]
impl PageFetcher for ProxyFetcher {
    async fn fetch(&self, url: &str, base_headers: &HeaderMap) -> Option<FetchedPage> {
        let proxies = self.directory.list_valid_proxies().await;
        if proxies.is_empty() {
            tracing::warn!("No proxies available, skipping fetch of {}", url);
            return None;
        }

        // ThreadRng 不能跨 await，先把每次尝试的参数准备好
        let attempts: Vec<(ProxyDescriptor, HeaderMap)> = {
            let mut rng = rand::thread_rng();
            pick_candidates(proxies, MAX_PROXY_ATTEMPTS, &mut rng)
                .into_iter()
                .map(|p| {
                    let headers = browser_headers(base_headers, &mut rng);
                    (p, headers)
                })
                .collect()
        };

        for (attempt, (candidate, headers)) in attempts.into_iter().enumerate() {
            let client = match self.client_for(&candidate) {
                Ok(client) => client,
                Err(e) => {
                    tracing::warn!("Invalid proxy {}: {}", candidate.id, e);
                    continue;
                }
            };

            match client.get(url).headers(headers).send().await {
                Ok(resp) if resp.status().is_success() => {
                    let status = resp.status().as_u16();
                    match resp.text().await {
                        Ok(body) => {
                            tracing::debug!(
                                "Fetched {} via proxy {} on attempt {}",
                                url,
                                candidate.id,
                                attempt + 1
                            );
                            return Some(FetchedPage { status, body });
                        }
                        Err(e) => {
                            tracing::warn!("Proxy {} body read failed: {}", candidate.id, e);
                        }
                    }
                }
                Ok(resp) => {
                    tracing::warn!(
                        "Proxy {} got status {} for {}",
                        candidate.id,
                        resp.status(),
                        url
                    );
                }
                Err(e) => {
                    tracing::warn!("Proxy {} request failed: {}", candidate.id, e);
                }
            }
        }

        tracing::warn!("All proxy attempts failed for {}", url);
        None
    }
}
