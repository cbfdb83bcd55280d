use crate::error::CrawlError;
use reqwest::blocking::Client;
use reqwest::{header, redirect};
use std::time::Duration;
use url::Url;

pub const DEFAULT_USER_AGENT: &str = "index-crawler/0.1";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(12);

/// Redirects followed before a fetch gives up.
pub const MAX_REDIRECTS: usize = 3;

/// Pages above this size are skipped.
pub const MAX_PAGE_BYTES: usize = 2 * 1024 * 1024;

/// Where crawled pages come from.
pub trait PageSource: Send + Sync + 'static {
    /// Returns the raw markup of `url`.
    fn fetch(&self, url: &Url) -> Result<String, CrawlError>;
}

/// Fetches pages over HTTP(S) with a blocking client, so it can run on the
/// crawler's worker threads.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, CrawlError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .redirect(redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(timeout)
            .build()
            .map_err(CrawlError::Client)?;
        Ok(Self { client })
    }
}

impl PageSource for HttpFetcher {
    fn fetch(&self, url: &Url) -> Result<String, CrawlError> {
        let request_err = |source| CrawlError::Request { url: url.to_string(), source };
        let resp = self.client.get(url.clone()).send().map_err(request_err)?;
        if !resp.status().is_success() {
            return Err(CrawlError::Status { url: url.to_string(), status: resp.status().as_u16() });
        }
        if let Some(ct) = resp.headers().get(header::CONTENT_TYPE) {
            let v = ct.to_str().unwrap_or_default();
            if !v.starts_with("text/html") {
                return Err(CrawlError::NotHtml { url: url.to_string(), content_type: v.to_string() });
            }
        }
        let bytes = resp.bytes().map_err(request_err)?;
        if bytes.len() > MAX_PAGE_BYTES {
            return Err(CrawlError::TooLarge { url: url.to_string(), limit: MAX_PAGE_BYTES });
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}
