//! HTTP client for plain document fetches
//!
//! Rate limited with `governor`, bounded by a request timeout and retried
//! through [`RetryPolicy`] for transient failures.

use anyhow::{Context, Result};
use async_trait::async_trait;
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, direct::NotKeyed},
};
use reqwest::{
    Client, StatusCode,
    header::{HeaderMap, HeaderValue, USER_AGENT},
};
use std::num::NonZeroU32;
use tracing::{debug, info};

use crate::domain::errors::{CatalogError, CatalogResult};
use crate::domain::services::DocumentFetcher;
use crate::infrastructure::config::HttpConfig;
use crate::infrastructure::retry_policy::RetryPolicy;

/// Translate a transport error into the crawl's error taxonomy
pub(crate) fn map_transport_error(url: &str, error: &reqwest::Error) -> CatalogError {
    if error.is_timeout() {
        CatalogError::FetchTimeout {
            url: url.to_string(),
        }
    } else {
        CatalogError::fetch_unavailable(url, error.to_string())
    }
}

pub struct HttpClient {
    client: Client,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    retry: RetryPolicy,
    config: HttpConfig,
}

impl HttpClient {
    pub fn new(config: HttpConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent).context("Invalid user agent")?,
        );

        let client = Client::builder()
            .timeout(config.timeout())
            .default_headers(headers)
            .cookie_store(true)
            .gzip(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("Failed to create HTTP client")?;

        let quota = Quota::per_second(
            NonZeroU32::new(config.max_requests_per_second)
                .context("Rate limit must be greater than 0")?,
        );

        Ok(Self {
            client,
            rate_limiter: RateLimiter::direct(quota),
            retry: RetryPolicy::from_http_config(&config),
            config,
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    /// One GET attempt, rate limited
    async fn get_text_once(&self, url: &str) -> CatalogResult<String> {
        self.rate_limiter.until_ready().await;
        debug!("Fetching document: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| map_transport_error(url, &e))?;

        let status = response.status();
        if status == StatusCode::REQUEST_TIMEOUT || status == StatusCode::GATEWAY_TIMEOUT {
            return Err(CatalogError::FetchTimeout {
                url: url.to_string(),
            });
        }
        if !status.is_success() {
            return Err(CatalogError::fetch_unavailable(url, format!("HTTP {status}")));
        }

        let text = response
            .text()
            .await
            .map_err(|e| map_transport_error(url, &e))?;
        debug!("Fetched {} ({} chars)", url, text.len());
        Ok(text)
    }
}

#[async_trait]
impl DocumentFetcher for HttpClient {
    async fn fetch_document(&self, url: &str) -> CatalogResult<String> {
        info!(url = %url, "Fetching colorway page");
        self.retry
            .run(url, |_| self.get_text_once(url))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_http_client_creation() {
        let client = HttpClient::new(HttpConfig::default());
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn test_zero_rate_limit_is_rejected() {
        let config = HttpConfig {
            max_requests_per_second: 0,
            ..HttpConfig::default()
        };
        assert!(HttpClient::new(config).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_host_maps_to_fetch_error() {
        let config = HttpConfig {
            timeout_seconds: 2,
            ..HttpConfig::default()
        };
        let client = HttpClient::new(config)
            .unwrap()
            .with_retry_policy(RetryPolicy::none());

        // Port 9 (discard) on localhost is closed in test environments
        let error = client
            .fetch_document("http://127.0.0.1:9/t/air-jordan/DZ5485-612")
            .await
            .unwrap_err();
        assert!(matches!(
            error,
            CatalogError::FetchUnavailable { .. } | CatalogError::FetchTimeout { .. }
        ));
        assert!(error.is_retryable());
    }
}
