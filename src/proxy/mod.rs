// 出站代理
// 代理目录客户端 + 经代理轮换的页面抓取

pub mod directory;
pub mod fetch;

pub use directory::{HttpProxyDirectory, ProxyDescriptor, ProxyDirectory};
pub use fetch::{FetchedPage, PageFetcher, ProxyFetcher};
