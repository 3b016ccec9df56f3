//! Minimal W3C WebDriver client
//!
//! Talks JSON over HTTP to chromedriver (or any W3C endpoint): create a
//! session, navigate, run scripts, read the page source, delete the session.
//! The settle loop only sees the [`BrowserSession`] trait.

#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, trace, warn};

use crate::domain::errors::{CatalogError, CatalogResult};
use crate::infrastructure::config::BrowserConfig;
use crate::infrastructure::http_client::map_transport_error;

const SCROLL_HEIGHT_SCRIPT: &str = "return document.body.scrollHeight";
const SCROLL_TO_BOTTOM_SCRIPT: &str = "window.scrollTo(0, document.body.scrollHeight);";

/// One live browsing session. Not shared between workers.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn navigate(&self, url: &str) -> CatalogResult<()>;

    /// Current scrollable document height in pixels
    async fn scroll_height(&self) -> CatalogResult<i64>;

    async fn scroll_to_bottom(&self) -> CatalogResult<()>;

    async fn page_source(&self) -> CatalogResult<String>;

    /// Release the session; errors are logged, never returned
    async fn close(&self);
}

/// Opens fresh browsing sessions
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn open_session(&self) -> CatalogResult<Box<dyn BrowserSession>>;
}

/// Session factory bound to one WebDriver endpoint
pub struct WebDriverClient {
    client: Client,
    endpoint: String,
    capabilities: Value,
}

impl WebDriverClient {
    pub fn new(config: &BrowserConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.command_timeout_seconds))
            .build()
            .context("Failed to create WebDriver HTTP client")?;

        Ok(Self {
            client,
            endpoint: config.webdriver_url.trim_end_matches('/').to_string(),
            capabilities: capabilities(config),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Chrome capabilities with the headless flag and configured arguments
pub fn capabilities(config: &BrowserConfig) -> Value {
    let mut args: Vec<String> = Vec::new();
    if config.headless {
        args.push("--headless".to_string());
    }
    args.extend(config.browser_args.iter().cloned());

    json!({
        "capabilities": {
            "alwaysMatch": {
                "browserName": "chrome",
                "acceptInsecureCerts": true,
                "goog:chromeOptions": { "args": args }
            }
        }
    })
}

/// Error reported inside a WebDriver response body, if any
fn webdriver_error(body: &Value) -> Option<(String, String)> {
    let name = body.pointer("/value/error").and_then(Value::as_str)?;
    let message = body
        .pointer("/value/message")
        .and_then(Value::as_str)
        .unwrap_or("unknown webdriver error");
    Some((name.to_string(), message.to_string()))
}

#[async_trait]
impl BrowserLauncher for WebDriverClient {
    async fn open_session(&self) -> CatalogResult<Box<dyn BrowserSession>> {
        let session_endpoint = format!("{}/session", self.endpoint);
        let init_error = |reason: String| CatalogError::SessionInit { reason };

        let response = self
            .client
            .post(&session_endpoint)
            .json(&self.capabilities)
            .send()
            .await
            .map_err(|e| init_error(format!("session create request failed: {e}")))?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| init_error(format!("session create response unreadable: {e}")))?;

        if let Some((name, message)) = webdriver_error(&body) {
            return Err(init_error(format!("{name}: {message}")));
        }
        if !status.is_success() {
            return Err(init_error(format!("session create HTTP {}", status.as_u16())));
        }

        let session_id = body
            .pointer("/value/sessionId")
            .or_else(|| body.pointer("/sessionId"))
            .and_then(Value::as_str)
            .ok_or_else(|| init_error("session create response has no sessionId".to_string()))?
            .to_string();

        debug!("Opened WebDriver session {}", session_id);
        Ok(Box::new(WebDriverSession {
            client: self.client.clone(),
            base: format!("{}/session/{}", self.endpoint, session_id),
            session_id,
            current_url: std::sync::Mutex::new(String::new()),
        }))
    }
}

pub struct WebDriverSession {
    client: Client,
    base: String,
    session_id: String,
    /// Last navigation target, used to label errors
    current_url: std::sync::Mutex<String>,
}

impl WebDriverSession {
    fn url_label(&self) -> String {
        self.current_url
            .lock()
            .map(|url| url.clone())
            .unwrap_or_default()
    }

    async fn command(&self, method: Method, path: &str, body: Option<Value>) -> CatalogResult<Value> {
        let url = format!("{}{}", self.base, path);
        let label = self.url_label();
        trace!("WebDriver {} {}", method, url);

        let mut request = self.client.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| map_transport_error(&label, &e))?;
        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| map_transport_error(&label, &e))?;

        if let Some((name, message)) = webdriver_error(&body) {
            return Err(if name.contains("timeout") {
                CatalogError::FetchTimeout { url: label }
            } else {
                CatalogError::fetch_unavailable(&label, format!("{name}: {message}"))
            });
        }
        if !status.is_success() {
            return Err(CatalogError::fetch_unavailable(
                &label,
                format!("WebDriver HTTP {}", status.as_u16()),
            ));
        }

        Ok(body.get("value").cloned().unwrap_or(Value::Null))
    }

    async fn execute(&self, script: &str) -> CatalogResult<Value> {
        self.command(
            Method::POST,
            "/execute/sync",
            Some(json!({ "script": script, "args": [] })),
        )
        .await
    }
}

#[async_trait]
impl BrowserSession for WebDriverSession {
    async fn navigate(&self, url: &str) -> CatalogResult<()> {
        if let Ok(mut current) = self.current_url.lock() {
            *current = url.to_string();
        }
        self.command(Method::POST, "/url", Some(json!({ "url": url })))
            .await
            .map(|_| ())
    }

    async fn scroll_height(&self) -> CatalogResult<i64> {
        let value = self.execute(SCROLL_HEIGHT_SCRIPT).await?;
        value
            .as_i64()
            // Some drivers report layout sizes as floats
            .or_else(|| value.as_f64().map(|height| height as i64))
            .ok_or_else(|| CatalogError::malformed_markup("document.body.scrollHeight", &self.url_label()))
    }

    async fn scroll_to_bottom(&self) -> CatalogResult<()> {
        self.execute(SCROLL_TO_BOTTOM_SCRIPT).await.map(|_| ())
    }

    async fn page_source(&self) -> CatalogResult<String> {
        let value = self.command(Method::GET, "/source", None).await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| CatalogError::malformed_markup("page source", &self.url_label()))
    }

    async fn close(&self) {
        match self.client.delete(&self.base).send().await {
            Ok(_) => debug!("Closed WebDriver session {}", self.session_id),
            Err(e) => warn!("Failed to close WebDriver session {}: {}", self.session_id, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities_carry_headless_and_args() {
        let caps = capabilities(&BrowserConfig::default());
        let args = caps
            .pointer("/capabilities/alwaysMatch/goog:chromeOptions/args")
            .and_then(Value::as_array)
            .unwrap();
        assert_eq!(args[0], "--headless");
        assert!(args.iter().any(|a| a == "--no-sandbox"));

        let caps = capabilities(&BrowserConfig {
            headless: false,
            browser_args: Vec::new(),
            ..BrowserConfig::default()
        });
        assert_eq!(
            caps.pointer("/capabilities/alwaysMatch/goog:chromeOptions/args"),
            Some(&json!([]))
        );
    }

    #[test]
    fn test_webdriver_error_extraction() {
        let body = json!({ "value": { "error": "script timeout", "message": "took too long" } });
        assert_eq!(
            webdriver_error(&body),
            Some(("script timeout".to_string(), "took too long".to_string()))
        );
        assert_eq!(webdriver_error(&json!({ "value": 1080 })), None);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_session_init_error() {
        let config = BrowserConfig {
            webdriver_url: "http://127.0.0.1:9/".to_string(),
            command_timeout_seconds: 2,
            ..BrowserConfig::default()
        };
        let client = WebDriverClient::new(&config).unwrap();
        assert_eq!(client.endpoint(), "http://127.0.0.1:9");

        let error = client.open_session().await.err().unwrap();
        assert!(matches!(error, CatalogError::SessionInit { .. }));
        assert!(!error.is_recoverable());
    }
}
