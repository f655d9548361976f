// Medium 链接解析
// 经代理抓取页面开头，检测会员墙标记并提取 "继续阅读" 链接

pub mod scan;

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, REFERER, USER_AGENT};
use serde::{Deserialize, Serialize};

use crate::proxy::PageFetcher;
use scan::{contains_marker, find_noopener_href, head_of, normalize_href, sanitize_url};

/// 一次解析的结果
///
/// `member_detected`：None 表示抓取失败，Some(true) 表示检测到会员墙，
/// Some(false) 表示页面可直接访问。`status_code` 为 0 表示没有拿到响应。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionResult {
    pub value: Option<String>,
    pub member_detected: Option<bool>,
    pub status_code: u16,
}

impl ResolutionResult {
    pub fn failed() -> Self {
        Self {
            value: None,
            member_detected: None,
            status_code: 0,
        }
    }

    /// 写回缓存的目标值：优先解析出的地址，可直接访问的 200 页面退化为 key 本身
    pub fn destination_for(&self, key: &str) -> Option<String> {
        if let Some(value) = &self.value {
            return Some(value.clone());
        }
        if self.member_detected == Some(false) && self.status_code == 200 {
            return Some(key.to_string());
        }
        None
    }
}

/// 链接解析器，填充任务依赖这个接口
#[async_trait]
pub trait LinkResolver: Send + Sync {
    async fn resolve_detailed(&self, url: &str, head_limit: usize, marker: &str)
    -> ResolutionResult;

    async fn resolve(&self, url: &str, head_limit: usize, marker: &str) -> Option<String> {
        self.resolve_detailed(url, head_limit, marker).await.value
    }
}

pub struct MediumResolver {
    fetcher: Arc<dyn PageFetcher>,
}

impl MediumResolver {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self { fetcher }
    }

    fn medium_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
            ),
        );
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        headers.insert(REFERER, HeaderValue::from_static("https://www.google.com/"));
        headers
    }
}

/// 根据页面开头判断结果，只看前 head_limit 个字符
pub fn classify_page(
    url: &str,
    body: &str,
    status_code: u16,
    head_limit: usize,
    marker: &str,
) -> ResolutionResult {
    let head = head_of(body, head_limit);

    if !contains_marker(head, marker) {
        return ResolutionResult {
            value: Some(url.to_string()),
            member_detected: Some(false),
            status_code,
        };
    }

    ResolutionResult {
        value: find_noopener_href(head).map(|href| normalize_href(&href)),
        member_detected: Some(true),
        status_code,
    }
}

#[async_trait]
impl LinkResolver for MediumResolver {
    async fn resolve_detailed(
        &self,
        url: &str,
        head_limit: usize,
        marker: &str,
    ) -> ResolutionResult {
        let url = sanitize_url(url);
        if url.is_empty() {
            return ResolutionResult::failed();
        }

        let Some(page) = self.fetcher.fetch(&url, &Self::medium_headers()).await else {
            tracing::debug!("Resolution of {} failed: no page fetched", url);
            return ResolutionResult::failed();
        };

        let result = classify_page(&url, &page.body, page.status, head_limit, marker);
        tracing::debug!(
            "Resolved {}: member={:?} status={} value={:?}",
            url,
            result.member_detected,
            result.status_code,
            result.value
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::FetchedPage;
    use std::sync::Mutex;

    const MARKER: &str = "Member-only story";

    /// 固定返回一页内容，并记录请求
    struct StubFetcher {
        page: Option<FetchedPage>,
        requests: Mutex<Vec<(String, HeaderMap)>>,
    }

    impl StubFetcher {
        fn new(page: Option<FetchedPage>) -> Arc<Self> {
            Arc::new(Self {
                page,
                requests: Mutex::new(Vec::new()),
            })
        }

        fn html(body: &str) -> Arc<Self> {
            Self::new(Some(FetchedPage {
                status: 200,
                body: body.to_string(),
            }))
        }
    }

    #[async_trait]
    impl PageFetcher for StubFetcher {
        async fn fetch(&self, url: &str, base_headers: &HeaderMap) -> Option<FetchedPage> {
            self.requests
                .lock()
                .unwrap()
                .push((url.to_string(), base_headers.clone()));
            self.page.clone()
        }
    }

    #[tokio::test]
    async fn page_without_marker_passes_through() {
        let fetcher = StubFetcher::html("<html><p>Free story</p></html>");
        let resolver = MediumResolver::new(fetcher.clone());

        let value = resolver
            .resolve("https://medium.com/a/1", 1000, MARKER)
            .await;
        assert_eq!(value.as_deref(), Some("https://medium.com/a/1"));

        let requests = fetcher.requests.lock().unwrap();
        assert_eq!(requests[0].0, "https://medium.com/a/1");
        assert!(requests[0].1.contains_key(REFERER));
        assert!(requests[0].1.contains_key(ACCEPT_LANGUAGE));
    }

    #[tokio::test]
    async fn member_page_with_relative_anchor_resolves_to_medium() {
        let fetcher = StubFetcher::html(
            r#"<div>Member-only story</div><a rel="noopener" href="/p/abc">Continue</a>"#,
        );
        let resolver = MediumResolver::new(fetcher);

        let result = resolver
            .resolve_detailed("https://medium.com/a/1", 1000, MARKER)
            .await;
        assert_eq!(
            result,
            ResolutionResult {
                value: Some("https://medium.com/p/abc".into()),
                member_detected: Some(true),
                status_code: 200,
            }
        );
    }

    #[tokio::test]
    async fn member_page_with_absolute_anchor_is_kept() {
        let fetcher = StubFetcher::html(
            r#"Member-only story <a href="https://external.com/x" rel="noopener">go</a>"#,
        );
        let resolver = MediumResolver::new(fetcher);

        let value = resolver.resolve("https://medium.com/a/1", 1000, MARKER).await;
        assert_eq!(value.as_deref(), Some("https://external.com/x"));
    }

    #[tokio::test]
    async fn member_page_without_anchor_is_detected_but_unresolved() {
        let fetcher = StubFetcher::html("<p>Member-only story</p><a href=\"/x\">x</a>");
        let resolver = MediumResolver::new(fetcher);

        let result = resolver
            .resolve_detailed("https://medium.com/a/1", 1000, MARKER)
            .await;
        assert_eq!(result.value, None);
        assert_eq!(result.member_detected, Some(true));
        assert_eq!(result.status_code, 200);
        assert_eq!(
            resolver.resolve("https://medium.com/a/1", 1000, MARKER).await,
            None
        );
    }

    #[tokio::test]
    async fn fetch_failure_yields_failed_result() {
        let resolver = MediumResolver::new(StubFetcher::new(None));

        let result = resolver
            .resolve_detailed("https://medium.com/a/1", 1000, MARKER)
            .await;
        assert_eq!(result, ResolutionResult::failed());
        assert_eq!(
            resolver.resolve("https://medium.com/a/1", 1000, MARKER).await,
            None
        );
    }

    #[tokio::test]
    async fn marker_beyond_head_limit_is_not_seen() {
        let body = format!(
            "{}Member-only story<a rel=\"noopener\" href=\"/p/late\">x</a>",
            "x".repeat(200)
        );
        let resolver = MediumResolver::new(StubFetcher::html(&body));

        let result = resolver
            .resolve_detailed("https://medium.com/a/1", 100, MARKER)
            .await;
        assert_eq!(result.member_detected, Some(false));
        assert_eq!(result.value.as_deref(), Some("https://medium.com/a/1"));
    }

    #[test]
    fn anchor_beyond_head_limit_is_not_seen() {
        let body = format!(
            "Member-only story{}<a rel=\"noopener\" href=\"/p/late\">x</a>",
            " ".repeat(100)
        );
        let result = classify_page("https://medium.com/a/1", &body, 200, 50, MARKER);
        assert_eq!(result.member_detected, Some(true));
        assert_eq!(result.value, None);
    }

    #[tokio::test]
    async fn input_url_is_sanitized_before_fetching() {
        let fetcher = StubFetcher::html("free");
        let resolver = MediumResolver::new(fetcher.clone());

        let value = resolver
            .resolve(" `https://medium.com/a/2` ", 1000, MARKER)
            .await;
        assert_eq!(value.as_deref(), Some("https://medium.com/a/2"));
        assert_eq!(fetcher.requests.lock().unwrap()[0].0, "https://medium.com/a/2");
    }

    #[test]
    fn destination_prefers_value_then_self_link() {
        let resolved = ResolutionResult {
            value: Some("https://medium.com/a/1?sk=xyz".into()),
            member_detected: Some(true),
            status_code: 200,
        };
        assert_eq!(
            resolved.destination_for("k").as_deref(),
            Some("https://medium.com/a/1?sk=xyz")
        );

        let open = ResolutionResult {
            value: None,
            member_detected: Some(false),
            status_code: 200,
        };
        assert_eq!(open.destination_for("k").as_deref(), Some("k"));

        let gated = ResolutionResult {
            value: None,
            member_detected: Some(true),
            status_code: 200,
        };
        assert_eq!(gated.destination_for("k"), None);
        assert_eq!(ResolutionResult::failed().destination_for("k"), None);
    }

    #[test]
    fn result_serializes_in_camel_case() {
        let json = serde_json::to_value(ResolutionResult::failed()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"value": null, "memberDetected": null, "statusCode": 0})
        );
    }
}
