//! HTTP page fetcher
//!
//! Reference implementation of the fetching collaborator on top of `reqwest`. It performs
//! static fetches only; rendered and scroll hints are served from the static markup with
//! a warning, so `supports_scroll_loading` is `false`. Transient failures are retried
//! here with capped exponential backoff; the engine never retries.
//!
//! Rate limiting is not done here: the engine gates every fetch through its shared
//! token bucket.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::Client;
use tracing::{debug, info, warn};
use url::Url;

use crate::domain::page::{Page, RenderHint};
use crate::domain::ports::PageFetcher;
use crate::error::{ConfigurationError, FetchError};
use crate::infrastructure::config::HttpSettings;

/// Delay before retry number `attempt` (1-based), without jitter
pub fn backoff_delay(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    let exponent = attempt.saturating_sub(1).min(20);
    let delay = base_ms.saturating_mul(1_u64 << exponent);
    Duration::from_millis(delay.min(max_ms))
}

/// Backoff plus up to 25% random jitter, still capped at `max_ms`
fn jittered_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    let delay = backoff_delay(attempt, base_ms, max_ms);
    let millis = u64::try_from(delay.as_millis()).unwrap_or(max_ms);
    let jitter = fastrand::u64(0..=millis / 4);
    Duration::from_millis(millis.saturating_add(jitter).min(max_ms))
}

/// Static HTTP fetcher with retry
pub struct HttpFetcher {
    client: Client,
    settings: HttpSettings,
}

impl HttpFetcher {
    pub fn new(settings: HttpSettings) -> Result<Self, ConfigurationError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&settings.user_agent)
                .map_err(|e| ConfigurationError::invalid_value("http.user_agent", e.to_string()))?,
        );
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml;q=0.9,*/*;q=0.5"),
        );

        let client = Client::builder()
            .timeout(settings.timeout())
            .default_headers(headers)
            .cookie_store(true)
            .gzip(true)
            .brotli(true)
            .redirect(if settings.follow_redirects {
                reqwest::redirect::Policy::limited(10)
            } else {
                reqwest::redirect::Policy::none()
            })
            .build()
            .map_err(|e| ConfigurationError::Load(format!("Failed to create HTTP client: {e}")))?;

        info!(
            "HTTP fetcher ready (timeout {}s, {} attempts)",
            settings.timeout_seconds, settings.max_attempts
        );
        Ok(Self { client, settings })
    }

    pub const fn settings(&self) -> &HttpSettings {
        &self.settings
    }

    async fn fetch_once(&self, url: &Url) -> Result<Page, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| map_transport_error(url, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();
        if !content_type.is_empty() && !content_type.contains("html") {
            return Err(FetchError::NotHtml {
                url: url.to_string(),
                content_type,
            });
        }

        // Redirects land on the final URL; that is the page's identity
        let final_url = response.url().clone();
        let markup = response.text().await.map_err(|e| map_transport_error(url, &e))?;
        debug!("Fetched {} ({} bytes, {})", final_url, markup.len(), status);
        Ok(Page::from_url(final_url, markup, false))
    }
}

fn map_transport_error(url: &Url, err: &reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout { url: url.to_string() }
    } else if let Some(status) = err.status() {
        FetchError::Http {
            status: status.as_u16(),
            url: url.to_string(),
        }
    } else {
        FetchError::Network {
            url: url.to_string(),
            message: err.to_string(),
        }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url, hint: RenderHint) -> Result<Page, FetchError> {
        if hint.is_rendered() {
            warn!("No renderer configured, fetching {} statically ({:?} requested)", url, hint);
        }

        let max_attempts = self.settings.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.fetch_once(url).await {
                Ok(page) => return Ok(page),
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    let delay =
                        jittered_backoff(attempt, self.settings.base_backoff_ms, self.settings.max_backoff_ms);
                    warn!(
                        "Attempt {}/{} for {} failed: {} - retrying in {:?}",
                        attempt, max_attempts, url, err, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) if err.is_retryable() => {
                    return Err(FetchError::RetriesExhausted {
                        url: url.to_string(),
                        attempts: attempt,
                        last: err.to_string(),
                    });
                }
                Err(err) => return Err(err),
            }
        }
    }
}
