//! Configuration infrastructure
//!
//! One JSON file holds every setting; each component receives its own section
//! at construction instead of reading globals. Missing sections or fields fall
//! back to defaults so older files keep loading.

#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::info;

use crate::infrastructure::parsing::config::SelectorConfig;

/// Catalog listing crawled by default
pub const DEFAULT_CATALOG_URL: &str = "https://www.nike.com/w/mens-jordan-shoes-37eefznik1zy7ok";

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub catalog: CatalogConfig,
    pub browser: BrowserConfig,
    pub http: HttpConfig,
    pub crawl: CrawlConfig,
    pub database: DatabaseConfig,
    pub classifier: ClassifierConfig,
    pub logging: LoggingConfig,
}

/// Where to crawl and how to read the markup
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Catalog listing page
    pub base_url: String,

    /// CSS selectors and labels for cards and detail pages
    pub selectors: SelectorConfig,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_CATALOG_URL.to_string(),
            selectors: SelectorConfig::default(),
        }
    }
}

/// Scriptable browsing session settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// W3C WebDriver endpoint (chromedriver, geckodriver, selenium)
    pub webdriver_url: String,

    pub headless: bool,

    /// Extra browser command line arguments
    pub browser_args: Vec<String>,

    /// Wait after navigation before the first height measurement
    pub initial_wait_ms: u64,

    /// Wait after each scroll on the catalog page
    pub catalog_settle_ms: u64,

    /// Wait after each scroll on a product detail page
    pub detail_settle_ms: u64,

    /// Scroll iterations before the page is taken as partial content
    pub max_scroll_iterations: u32,

    /// Scroll iterations allowed on a detail page
    pub detail_max_scroll_iterations: u32,

    /// Timeout for each WebDriver command in seconds
    pub command_timeout_seconds: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".to_string(),
            headless: true,
            browser_args: vec![
                "--disable-gpu".to_string(),
                "--no-sandbox".to_string(),
                "--window-size=1920,1080".to_string(),
            ],
            initial_wait_ms: 3000,
            catalog_settle_ms: 3000,
            detail_settle_ms: 1000,
            max_scroll_iterations: 30,
            detail_max_scroll_iterations: 3,
            command_timeout_seconds: 60,
        }
    }
}

/// Plain document fetch settings, shared with the retry policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub user_agent: String,

    /// Request timeout in seconds
    pub timeout_seconds: u64,

    /// Retries after the first attempt for transient failures
    pub max_retries: u32,

    /// First backoff delay, doubled on each retry
    pub retry_base_delay_ms: u64,

    pub max_requests_per_second: u32,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36".to_string(),
            timeout_seconds: 30,
            max_retries: 2,
            retry_base_delay_ms: 1000,
            max_requests_per_second: 2,
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }
}

/// Crawl orchestration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Cards resolved at once; 1 keeps the crawl strictly sequential
    pub detail_concurrency: usize,

    /// Stop after this many cards (0 = whole catalog)
    pub max_cards: usize,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            detail_concurrency: 1,
            max_cards: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database file
    pub path: PathBuf,

    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        let path = ConfigManager::get_app_data_dir()
            .map(|dir| dir.join("database").join("catalog.db"))
            .unwrap_or_else(|_| PathBuf::from("catalog.db"));
        Self {
            path,
            max_connections: 5,
        }
    }
}

impl DatabaseConfig {
    pub fn url(&self) -> String {
        format!("sqlite://{}", self.path.display())
    }
}

/// External image-classification collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// OpenAI-compatible chat completions endpoint
    pub endpoint: String,

    pub model: String,

    /// Environment variable holding the API key
    pub api_key_env: String,

    pub prompt: String,

    pub timeout_seconds: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4o".to_string(),
            api_key_env: "OPENAI_KEY".to_string(),
            prompt: "The image you are seeing is an Air Jordans product. Categorize the product in the image into one of the following: {categories}. Only output the category and nothing else".to_string(),
            timeout_seconds: 60,
        }
    }
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    pub json_format: bool,

    pub console_output: bool,

    pub file_output: bool,

    /// Directory for rolling log files; defaults next to the app data
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            console_output: true,
            file_output: false,
            log_dir: None,
        }
    }
}

/// Loads and saves [`AppConfig`] as JSON
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Get the application configuration directory
    pub fn get_config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get user config directory")?
            .join("jordan-catalog");
        Ok(config_dir)
    }

    /// Get application data directory
    pub fn get_app_data_dir() -> Result<PathBuf> {
        let data_dir = dirs::data_local_dir()
            .context("Failed to get user data directory")?
            .join("jordan-catalog");
        Ok(data_dir)
    }

    /// Configuration manager for the default location
    pub fn new() -> Result<Self> {
        let config_dir = Self::get_config_dir()?;
        Ok(Self {
            config_path: config_dir.join("jordan_catalog_config.json"),
        })
    }

    pub fn with_path(path: impl AsRef<Path>) -> Self {
        Self {
            config_path: path.as_ref().to_path_buf(),
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Load configuration from file, creating default if it doesn't exist
    pub async fn load_config(&self) -> Result<AppConfig> {
        if !self.config_path.exists() {
            info!("Configuration file not found, creating default: {:?}", self.config_path);
            let default_config = AppConfig::default();
            self.save_config(&default_config).await?;
            return Ok(default_config);
        }

        let content = fs::read_to_string(&self.config_path)
            .await
            .with_context(|| format!("Failed to read configuration file {:?}", self.config_path))?;

        let config: AppConfig = serde_json::from_str(&content)
            .with_context(|| format!("Invalid configuration file {:?}", self.config_path))?;

        info!("Loaded configuration from: {:?}", self.config_path);
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_config(&self, config: &AppConfig) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create config directory")?;
        }

        let content =
            serde_json::to_string_pretty(config).context("Failed to serialize configuration")?;

        fs::write(&self.config_path, content)
            .await
            .context("Failed to write configuration file")?;

        info!("Saved configuration to: {:?}", self.config_path);
        Ok(())
    }
}
