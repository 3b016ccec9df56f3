// Database connection and pool management
// SQLite through sqlx; the products table is created if absent

use anyhow::{Context, Result};
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
};
use std::path::Path;
use std::str::FromStr;
use tracing::info;

use crate::infrastructure::config::DatabaseConfig;

const CREATE_PRODUCTS_SQL: &str = r"
    CREATE TABLE IF NOT EXISTS products (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        category TEXT,
        promotion_status TEXT,
        current_price REAL NOT NULL,
        discount_percent INTEGER,
        colors TEXT,
        source_url TEXT NOT NULL,
        image_url TEXT,
        description TEXT
    )
";

const CREATE_INDEXES_SQL: &str = r"
    CREATE INDEX IF NOT EXISTS idx_products_category ON products (category);
    CREATE INDEX IF NOT EXISTS idx_products_current_price ON products (current_price);
";

pub struct DatabaseConnection {
    pool: SqlitePool,
}

impl DatabaseConnection {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let db_path = database_url
            .strip_prefix("sqlite://")
            .or_else(|| database_url.strip_prefix("sqlite:"))
            .unwrap_or(database_url);

        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create database directory {parent:?}"))?;
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid database URL: {database_url}"))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open database {database_url}"))?;

        info!("Connected to database: {}", db_path);
        Ok(Self { pool })
    }

    pub async fn from_config(config: &DatabaseConfig) -> Result<Self> {
        Self::new(&config.url(), config.max_connections).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create the products table and its indexes; safe to run repeatedly
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(CREATE_PRODUCTS_SQL)
            .execute(&self.pool)
            .await
            .context("Failed to create products table")?;
        sqlx::raw_sql(CREATE_INDEXES_SQL)
            .execute(&self.pool)
            .await
            .context("Failed to create product indexes")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_database_connection_creates_file() -> Result<()> {
        let temp_dir = tempdir()?;
        let db_path = temp_dir.path().join("nested").join("catalog.db");
        let database_url = format!("sqlite://{}", db_path.display());

        let db = DatabaseConnection::new(&database_url, 2).await?;
        assert!(!db.pool().is_closed());
        assert!(db_path.exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_migration_is_idempotent() -> Result<()> {
        let temp_dir = tempdir()?;
        let database_url = format!("sqlite:{}", temp_dir.path().join("catalog.db").display());

        let db = DatabaseConnection::new(&database_url, 2).await?;
        db.migrate().await?;
        db.migrate().await?;

        let result = sqlx::query("SELECT name FROM sqlite_master WHERE type='table' AND name='products'")
            .fetch_optional(db.pool())
            .await?;
        assert!(result.is_some());
        Ok(())
    }
}
