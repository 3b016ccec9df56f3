//! Command line front end
//!
//! ```bash
//! jordan-catalog run                       # crawl, then classify
//! jordan-catalog crawl --max-cards 10
//! jordan-catalog classify --only-unclassified
//! jordan-catalog search --discounted --colors "red, black" --limit 5
//! ```

#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use jordan_catalog_lib::application::{
    CatalogQueries, CategoryClassifier, ClassificationSummary, CrawlOrchestrator, CrawlSummary,
    SearchFilters, VariantResolver, records_to_json,
};
use jordan_catalog_lib::domain::ProductRepository;
use jordan_catalog_lib::domain::services::{FetchProfile, PageFetcher};
use jordan_catalog_lib::infrastructure::{
    AppConfig, CardExtractor, ConfigManager, DatabaseConnection, DetailPageParser, DynamicPageFetcher,
    HttpClient, OpenAiVisionClient, RetryPolicy, SqliteProductRepository, WebDriverClient,
    init_logging_with_config,
};

#[derive(Debug, Parser)]
#[command(name = "jordan-catalog", version, about = "Crawl, classify and query the Jordan sneaker catalog")]
struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true, env = "JORDAN_CATALOG_CONFIG")]
    config: Option<PathBuf>,

    /// Override the SQLite database file
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Crawl the catalog into the product store
    Crawl(CrawlArgs),
    /// Assign a category to stored products
    Classify(ClassifyArgs),
    /// Crawl, then classify
    Run {
        #[command(flatten)]
        crawl: CrawlArgs,
        #[command(flatten)]
        classify: ClassifyArgs,
    },
    /// Query the product store and print JSON records
    Search(SearchArgs),
}

#[derive(Debug, Args)]
struct CrawlArgs {
    /// Catalog listing URL
    #[arg(long)]
    url: Option<String>,

    /// Stop after this many cards
    #[arg(long)]
    max_cards: Option<usize>,

    /// Cards resolved at once
    #[arg(long)]
    concurrency: Option<usize>,
}

#[derive(Debug, Args)]
struct ClassifyArgs {
    /// Skip rows that already have a category
    #[arg(long)]
    only_unclassified: bool,
}

#[derive(Debug, Args)]
struct SearchArgs {
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    max_price: Option<f64>,
    /// Comma or space separated color terms, any may match
    #[arg(long)]
    colors: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    category: Option<String>,
    /// Only discounted products
    #[arg(long, conflicts_with = "new_releases")]
    discounted: bool,
    /// Only "Just In" and "Coming Soon" products
    #[arg(long)]
    new_releases: bool,
    #[arg(long)]
    limit: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env may hold the classifier API key
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let manager = match &cli.config {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new()?,
    };
    let mut config = manager.load_config().await?;
    if let Some(database) = &cli.database {
        config.database.path = database.clone();
    }

    init_logging_with_config(&config.logging)?;

    let cancel = CancellationToken::new();
    spawn_ctrl_c_handler(cancel.clone());

    let db = DatabaseConnection::from_config(&config.database).await?;
    db.migrate().await?;
    let repository: Arc<dyn ProductRepository> = Arc::new(SqliteProductRepository::new(db.pool().clone()));

    match cli.command {
        Command::Crawl(args) => {
            let summary = crawl(&mut config, &args, Arc::clone(&repository), &cancel).await?;
            print_json(&summary)?;
        }
        Command::Classify(args) => {
            let summary = classify(&config, &args, repository.as_ref(), &cancel).await?;
            print_classification(&summary);
        }
        Command::Run { crawl: crawl_args, classify: classify_args } => {
            let summary = crawl(&mut config, &crawl_args, Arc::clone(&repository), &cancel).await?;
            print_json(&summary)?;
            if cancel.is_cancelled() {
                warn!("Cancelled, skipping classification");
            } else {
                let summary = classify(&config, &classify_args, repository.as_ref(), &cancel).await?;
                print_classification(&summary);
            }
        }
        Command::Search(args) => search(Arc::clone(&repository), args).await?,
    }

    info!("{} products in store", repository.count().await?);
    Ok(())
}

fn spawn_ctrl_c_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Ctrl-C received, finishing in-flight work");
            cancel.cancel();
        }
    });
}

async fn crawl(
    config: &mut AppConfig,
    args: &CrawlArgs,
    repository: Arc<dyn ProductRepository>,
    cancel: &CancellationToken,
) -> Result<CrawlSummary> {
    if let Some(url) = &args.url {
        config.catalog.base_url = url.clone();
    }
    if let Some(max_cards) = args.max_cards {
        config.crawl.max_cards = max_cards;
    }
    if let Some(concurrency) = args.concurrency {
        config.crawl.detail_concurrency = concurrency;
    }

    let retry = RetryPolicy::from_http_config(&config.http);
    let page_fetcher: Arc<dyn PageFetcher> = Arc::new(DynamicPageFetcher::new(
        WebDriverClient::new(&config.browser)?,
        retry,
    ));
    let document_fetcher = Arc::new(HttpClient::new(config.http.clone())?);

    let resolver = VariantResolver::new(
        Arc::clone(&page_fetcher),
        document_fetcher,
        DetailPageParser::with_config(&config.catalog.selectors)?,
        FetchProfile::detail(&config.browser),
    );
    let orchestrator = CrawlOrchestrator::new(
        page_fetcher,
        CardExtractor::with_config(&config.catalog.selectors, &config.catalog.base_url)?,
        resolver,
        repository,
        config.catalog.base_url.clone(),
        FetchProfile::catalog(&config.browser),
        config.crawl.clone(),
    );

    orchestrator.run(cancel).await
}

async fn classify(
    config: &AppConfig,
    args: &ClassifyArgs,
    repository: &dyn ProductRepository,
    cancel: &CancellationToken,
) -> Result<ClassificationSummary> {
    let vision = OpenAiVisionClient::new(
        config.classifier.clone(),
        RetryPolicy::from_http_config(&config.http),
    )?;
    CategoryClassifier::new(Arc::new(vision))
        .classify_store(repository, args.only_unclassified, cancel)
        .await
}

async fn search(repository: Arc<dyn ProductRepository>, args: SearchArgs) -> Result<()> {
    let filters = SearchFilters {
        name: args.name,
        max_price: args.max_price,
        colors: args.colors,
        description: args.description,
        category: args.category,
    };
    let queries = CatalogQueries::new(repository);

    let records = if args.discounted {
        queries.search_discounted(&filters, args.limit).await?
    } else if args.new_releases {
        queries.search_new_releases(&filters, args.limit).await?
    } else {
        queries.search(&filters, args.limit).await?
    };

    println!("{}", records_to_json(&records));
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to render summary")?
    );
    Ok(())
}

fn print_classification(summary: &ClassificationSummary) {
    println!(
        "classified {} products: {} by keyword, {} by image, {} defaulted, {} failed{}",
        summary.examined,
        summary.by_keyword,
        summary.by_vision,
        summary.defaulted,
        summary.failed,
        if summary.cancelled { " (cancelled)" } else { "" }
    );
}
