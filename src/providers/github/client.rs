use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, LINK};
use serde::de::DeserializeOwned;
use url::Url;

use crate::auth::Token;
use crate::error::{ActionboardError, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.github.com";
pub const DEFAULT_PER_PAGE: u8 = 100;
const API_VERSION: &str = "2022-11-28";
const REQUEST_TIMEOUT_SECONDS: u64 = 30;

/// Bounded retry with exponential backoff.
///
/// Attempt `n` (zero based) that fails waits `base_delay * 2^n` before the next
/// one. No wait follows the final attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// One decoded response plus the successor link, if the server sent one.
#[derive(Debug)]
pub struct Page<T> {
    pub data: T,
    pub next: Option<Url>,
}

/// Last rate-limit state reported by the API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimit {
    pub remaining: Option<u32>,
    pub reset_at: Option<DateTime<Utc>>,
}

/// GitHub REST client shared by every repository task.
pub struct GitHubClient {
    client: reqwest::Client,
    base_url: Url,
    retry: RetryPolicy,
    pub(super) per_page: u8,
    pub(super) max_pages: usize,
    rate_limit: Mutex<RateLimit>,
}

impl GitHubClient {
    /// Create a new GitHub API client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - GitHub API base URL (e.g., "https://api.github.com")
    /// * `token` - Personal access or app token sent as a bearer credential
    /// * `retry` - Retry policy applied to every request
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the base URL is invalid or the token
    /// cannot be sent as a header.
    pub fn new(base_url: &str, token: &Token, retry: RetryPolicy) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            HeaderValue::from_static(API_VERSION),
        );

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", token.as_str()))
            .map_err(|e| ActionboardError::Config(format!("Invalid token: {e}")))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .user_agent(concat!("actionboard/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECONDS))
            .build()
            .map_err(|e| ActionboardError::Config(format!("Failed to create HTTP client: {e}")))?;

        // Url::join drops the last path segment unless the base ends with '/'
        let base_url = Url::parse(&format!("{}/", base_url.trim_end_matches('/')))
            .map_err(|e| ActionboardError::Config(format!("Invalid base URL: {e}")))?;

        Ok(Self {
            client,
            base_url,
            retry,
            per_page: DEFAULT_PER_PAGE,
            max_pages: super::pagination::DEFAULT_MAX_PAGES,
            rate_limit: Mutex::new(RateLimit::default()),
        })
    }

    pub fn with_pagination(mut self, per_page: u8, max_pages: usize) -> Self {
        self.per_page = per_page.clamp(1, 100);
        self.max_pages = max_pages.max(1);
        self
    }

    /// Resolve an API path against the configured base URL.
    pub fn api_url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ActionboardError::Config(format!("Invalid API path '{path}': {e}")))
    }

    /// Remaining calls in the current rate-limit window, as last reported.
    pub fn remaining_calls(&self) -> Option<u32> {
        self.rate_limit().remaining
    }

    pub fn rate_limit(&self) -> RateLimit {
        self.rate_limit
            .lock()
            .map(|guard| *guard)
            .unwrap_or_default()
    }

    /// GET `url` and decode its body, retrying per the client's policy.
    ///
    /// Once retries are exhausted the error is returned to the caller, which
    /// treats it as "no data and no next page" for that resource.
    pub async fn fetch<T: DeserializeOwned>(&self, url: &Url) -> Result<Page<T>> {
        with_retry(self.retry, url.as_str(), || self.fetch_once(url)).await
    }

    async fn fetch_once<T: DeserializeOwned>(&self, url: &Url) -> Result<Page<T>> {
        debug!("GET {url}");
        let response = self.client.get(url.clone()).send().await?;
        self.record_rate_limit(response.headers());

        let status = response.status();
        if !status.is_success() {
            return Err(ActionboardError::Api {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("unknown").to_string(),
            });
        }

        let next = parse_next_link(response.headers()).and_then(|link| Url::parse(&link).ok());
        let body = response.bytes().await?;
        let data = serde_json::from_slice(&body)?;

        Ok(Page { data, next })
    }

    fn record_rate_limit(&self, headers: &HeaderMap) {
        let remaining = header_number::<u32>(headers, "x-ratelimit-remaining");
        let reset_at = header_number::<i64>(headers, "x-ratelimit-reset")
            .and_then(|epoch| DateTime::from_timestamp(epoch, 0));

        if remaining.is_none() && reset_at.is_none() {
            return;
        }

        if let Ok(mut state) = self.rate_limit.lock() {
            if remaining.is_some() {
                state.remaining = remaining;
            }
            if reset_at.is_some() {
                state.reset_at = reset_at;
            }
        }
    }
}

/// Run `op` until it succeeds, fails permanently, or the policy runs out.
///
/// HTTP status failures and transport errors are retried. Decoding errors are
/// not, since the same body would come back.
pub async fn with_retry<T, F, Fut>(policy: RetryPolicy, label: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut last_error = None;

    for attempt in 0..attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if !is_retryable(&e) => return Err(e),
            Err(e) => {
                warn!(
                    "Error fetching {label}: {e} (attempt {}/{attempts})",
                    attempt + 1
                );
                if attempt + 1 < attempts {
                    tokio::time::sleep(policy.delay_for(attempt)).await;
                }
                last_error = Some(e);
            }
        }
    }

    warn!("Failed to fetch {label} after {attempts} attempts");

    match last_error {
        Some(ActionboardError::Api { status, .. }) => Err(ActionboardError::ApiErrorAfterRetries {
            status,
            retries: attempts,
        }),
        Some(other) => Err(other),
        None => Err(ActionboardError::ApiErrorAfterRetries {
            status: 0,
            retries: attempts,
        }),
    }
}

fn is_retryable(error: &ActionboardError) -> bool {
    matches!(
        error,
        ActionboardError::Api { .. } | ActionboardError::Network(_)
    )
}

/// Extract the `rel="next"` target from a `Link` header.
pub fn parse_next_link(headers: &HeaderMap) -> Option<String> {
    let link = headers.get(LINK)?.to_str().ok()?;
    link.split(',').find_map(|part| {
        let mut sections = part.split(';');
        let target = sections.next()?.trim();
        let is_next = sections.any(|param| {
            let param = param.trim();
            param == r#"rel="next""# || param == "rel=next"
        });
        if !is_next {
            return None;
        }
        target
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
            .map(ToString::to_string)
    })
}

fn header_number<T: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}
