//! Infrastructure layer: configuration, logging, network adapters, HTML
//! parsing and the SQLite product store.

pub mod config;
pub mod database_connection;
pub mod dynamic_page_fetcher;
pub mod http_client;
pub mod logging;
pub mod parsing;
pub mod product_repository;
pub mod retry_policy;
pub mod vision_client;
pub mod webdriver;

// Re-export commonly used items
pub use config::{AppConfig, ConfigManager};
pub use database_connection::DatabaseConnection;
pub use dynamic_page_fetcher::DynamicPageFetcher;
pub use http_client::HttpClient;
pub use logging::{get_log_directory, init_logging, init_logging_with_config};
pub use parsing::{CardExtractor, DetailPageParser, SelectorConfig};
pub use product_repository::SqliteProductRepository;
pub use retry_policy::RetryPolicy;
pub use vision_client::OpenAiVisionClient;
pub use webdriver::{BrowserLauncher, BrowserSession, WebDriverClient};
