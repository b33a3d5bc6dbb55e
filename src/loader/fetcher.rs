//! HTTP fetcher for raw document XML
//!
//! This module provides the client for the document content service with:
//! - User-Agent rotation
//! - Rate limiting with governor
//! - Automatic retry with exponential backoff on transient failures
//! - Charset detection from the Content-Type header or XML declaration

use async_trait::async_trait;
use encoding_rs::{Encoding, UTF_8};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use rand::seq::SliceRandom;
use regex::bytes::Regex;
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_ENCODING, CONTENT_TYPE, USER_AGENT},
    Client, Response,
};
use std::num::NonZeroU32;
use std::sync::LazyLock;
use std::time::Duration;
use url::Url;

use crate::config::LoaderConfig;
use crate::utils::error::FetchError;
use crate::utils::retry::{with_retry_if, RetryConfig};

/// Placeholder replaced by the document GUID in URL templates
pub const GUID_PLACEHOLDER: &str = "{guid}";

/// Default raw XML endpoint of the content service
pub const DEFAULT_URL_TEMPLATE: &str =
    "http://document.int.next.qed.westlaw.com/document/v1/rawxml/{guid}?websitehost=next.qed.westlaw.com";

/// Pool of User-Agent strings for rotation
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.7; rv:11.0) Gecko/20100101 Firefox/11.0",
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:22.0) Gecko/20100101 Firefox/22.0",
    "Mozilla/5.0 (Windows NT 6.1; rv:11.0) Gecko/20100101 Firefox/11.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_7_4) AppleWebKit/536.5 (KHTML, like Gecko) Chrome/19.0.1084.46 Safari/536.5",
    "Mozilla/5.0 (Windows; Windows NT 6.1) AppleWebKit/536.5 (KHTML, like Gecko) Chrome/19.0.1084.46 Safari/536.5",
];

static XML_ENCODING_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*<\?xml[^>]*encoding\s*=\s*["']([A-Za-z0-9._-]+)["']"#).unwrap()
});

/// Source of raw document XML
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Fetch the raw XML of one document
    async fn fetch_raw(&self, guid: &str) -> Result<String, FetchError>;
}

/// Content service client
pub struct DocumentFetcher {
    /// HTTP client with configured timeout and compression
    client: Client,

    /// Rate limiter to control request frequency
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,

    /// Backoff policy for transient failures
    retry: RetryConfig,

    /// URL with a `{guid}` placeholder
    url_template: String,
}

impl DocumentFetcher {
    /// Create a fetcher for the default content service endpoint
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Http` if the HTTP client cannot be created
    pub fn new(requests_per_second: u32) -> Result<Self, FetchError> {
        Self::with_config(&LoaderConfig {
            rate_limit: requests_per_second,
            ..LoaderConfig::default()
        })
    }

    /// Create a fetcher from loader configuration
    ///
    /// # Errors
    ///
    /// Returns `FetchError::InvalidUrl` if the template has no `{guid}` placeholder,
    /// or `FetchError::Http` if the HTTP client cannot be created
    pub fn with_config(config: &LoaderConfig) -> Result<Self, FetchError> {
        if !config.url_template.contains(GUID_PLACEHOLDER) {
            return Err(FetchError::InvalidUrl(format!(
                "template has no {GUID_PLACEHOLDER} placeholder: {}",
                config.url_template
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .gzip(true)
            .build()?;

        let rate = NonZeroU32::new(config.rate_limit).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = RateLimiter::direct(Quota::per_second(rate));

        Ok(Self {
            client,
            rate_limiter,
            retry: RetryConfig::with_delays(
                config.max_retries,
                config.retry_base_delay_ms,
                config.retry_max_delay_ms,
            ),
            url_template: config.url_template.clone(),
        })
    }

    /// Build the request URL for `guid`
    ///
    /// # Errors
    ///
    /// Returns `FetchError::InvalidUrl` if the result is not a valid URL
    pub fn document_url(&self, guid: &str) -> Result<Url, FetchError> {
        let raw = self
            .url_template
            .replace(GUID_PLACEHOLDER, &urlencoding::encode(guid));
        Url::parse(&raw).map_err(|e| FetchError::InvalidUrl(format!("{raw}: {e}")))
    }

    /// One request without retry
    async fn fetch_once(&self, url: &Url) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .headers(self.build_headers())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout
                } else {
                    FetchError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::ServerError(status.as_u16()));
        }

        self.decode_response(response).await
    }

    /// Decode a response body using the detected charset
    async fn decode_response(&self, response: Response) -> Result<String, FetchError> {
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
            .unwrap_or_default();

        let bytes = response.bytes().await?;

        decode_bytes(&bytes, &content_type)
    }

    /// Build HTTP headers for content service requests
    fn build_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        headers.insert(USER_AGENT, HeaderValue::from_static(random_user_agent()));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/xml,text/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip, deflate"));

        headers
    }
}

#[async_trait]
impl DocumentSource for DocumentFetcher {
    async fn fetch_raw(&self, guid: &str) -> Result<String, FetchError> {
        let url = self.document_url(guid)?;

        self.rate_limiter.until_ready().await;

        with_retry_if(&self.retry, || self.fetch_once(&url), FetchError::is_recoverable).await
    }
}

/// Get a random user agent from the pool
fn random_user_agent() -> &'static str {
    let mut rng = rand::thread_rng();
    USER_AGENTS.choose(&mut rng).copied().unwrap_or(USER_AGENTS[0])
}

/// Decode body bytes to UTF-8
///
/// The charset is taken from, in order: the Content-Type header, a byte order
/// mark, the XML declaration. UTF-8 is assumed otherwise.
///
/// # Errors
///
/// Returns `FetchError::Decode` if the bytes are invalid in the detected encoding
pub fn decode_bytes(bytes: &[u8], content_type: &str) -> Result<String, FetchError> {
    let encoding = charset_from_content_type(content_type)
        .or_else(|| Encoding::for_bom(bytes).map(|(encoding, _)| encoding))
        .or_else(|| charset_from_declaration(bytes))
        .unwrap_or(UTF_8);

    let (cow, used, had_errors) = encoding.decode(bytes);

    if had_errors {
        return Err(FetchError::Decode(format!(
            "invalid {} content",
            used.name()
        )));
    }

    Ok(cow.into_owned())
}

fn charset_from_content_type(content_type: &str) -> Option<&'static Encoding> {
    content_type
        .split(';')
        .filter_map(|part| part.trim().strip_prefix("charset="))
        .find_map(|label| Encoding::for_label(label.trim_matches('"').as_bytes()))
}

fn charset_from_declaration(bytes: &[u8]) -> Option<&'static Encoding> {
    let head = &bytes[..bytes.len().min(256)];
    XML_ENCODING_REGEX
        .captures(head)
        .and_then(|caps| caps.get(1))
        .and_then(|label| Encoding::for_label(label.as_bytes()))
}
