use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use verse_ingest::config::Config;
use verse_ingest::feed::{
    should_update, HttpFetcher, Ingestor, Scheduler, SourceAdapter, SourceRegistry, SweepReport,
};
use verse_ingest::storage::{Database, DatabaseError, FeedStore};

/// Items listed by `--status`
const RECENT_ITEMS_SHOWN: i64 = 20;

/// Get the config directory path (~/.config/verse/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("verse"))
}

#[derive(Parser, Debug)]
#[command(
    name = "verse-ingest",
    about = "Polls feed sources on a schedule and stores their items"
)]
struct Args {
    /// Config file (default: ~/.config/verse/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Run a single sweep and exit
    #[arg(long)]
    once: bool,

    /// Mark every source as never updated so the next sweep refetches all
    #[arg(long)]
    reset_timestamps: bool,

    /// Print stored sources and recent items, then exit
    #[arg(long)]
    status: bool,

    /// Add a generic RSS/Atom feed
    #[arg(long, num_args = 2, value_names = ["NAME", "URL"])]
    add_feed: Option<Vec<String>>,

    /// Add a subreddit feed
    #[arg(long, value_name = "NAME")]
    add_subreddit: Option<String>,
}

/// Built-in sources (unless disabled) plus the extras named in the config
fn build_registry(config: &Config) -> SourceRegistry {
    let registry = if config.include_default_sources {
        SourceRegistry::with_defaults()
    } else {
        SourceRegistry::new()
    };

    for subreddit in &config.subreddits {
        if let Err(e) = registry.add_subreddit(subreddit) {
            tracing::warn!(subreddit = %subreddit, error = %e, "Skipping configured subreddit");
        }
    }
    for feed in &config.feeds {
        if let Err(e) = registry.add_generic(&feed.name, &feed.url) {
            tracing::warn!(feed = %feed.name, error = %e, "Skipping configured feed");
        }
    }
    registry
}

/// Persist a user-added source so it is restored on every later start
async fn add_source(db: &Database, adapter: Arc<dyn SourceAdapter>) -> Result<()> {
    let source = db
        .create_source(adapter.source_name(), adapter.fetch_url())
        .await
        .context("Failed to store source")?;
    println!("Added source '{}' ({})", source.name, source.url);
    Ok(())
}

async fn print_status(db: &Database) -> Result<()> {
    let sources = db.list_sources().await.context("Failed to list sources")?;
    println!("{} sources", sources.len());
    for source in &sources {
        let items = db.count_items(Some(source.id)).await.unwrap_or(0);
        println!(
            "  [{}] {:<32} last updated {}  every {}s  {} items{}",
            source.id,
            source.name,
            source.last_updated.format("%Y-%m-%d %H:%M:%S"),
            source.refresh_interval.num_seconds(),
            items,
            if should_update(source) { "  (due)" } else { "" }
        );
    }

    let recent = db
        .get_recent_items(RECENT_ITEMS_SHOWN, 0)
        .await
        .context("Failed to load recent items")?;
    println!();
    println!("Most recent items");
    for item in recent {
        println!(
            "  {} {:>5} pts {:>4} comments  {}  [{}]",
            item.published_at.format("%Y-%m-%d %H:%M"),
            item.score,
            item.comments_count,
            item.title,
            item.source_name.unwrap_or_default()
        );
    }
    Ok(())
}

fn print_report(report: &SweepReport) {
    println!(
        "Sweep finished: {} updated, {} not due, {} failed, {} panicked",
        report.succeeded(),
        report.skipped(),
        report.failed(),
        report.panicked()
    );
    for entry in &report.sources {
        println!("  {:<32} {:?}", entry.source, entry.outcome);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let db_path = config.database_path_in(&config_dir);
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).context("Failed to create database directory")?;
        }
    }

    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let db = match Database::open(db_path_str).await {
        Ok(db) => db.with_default_interval(config.default_refresh_interval_secs as i64),
        Err(DatabaseError::InstanceLocked) => {
            eprintln!(
                "Error: The database is locked by another process. Please close it and try again."
            );
            std::process::exit(1);
        }
        Err(e) => return Err(anyhow::anyhow!("Failed to open database: {}", e)),
    };

    let registry = build_registry(&config);

    if let Some(feed) = &args.add_feed {
        if let [name, url] = feed.as_slice() {
            let adapter = registry
                .add_generic(name, url)
                .context("Cannot add feed")?;
            add_source(&db, adapter).await?;
        }
    }
    if let Some(subreddit) = &args.add_subreddit {
        let adapter = registry
            .add_subreddit(subreddit)
            .context("Cannot add subreddit")?;
        add_source(&db, adapter).await?;
    }

    if args.reset_timestamps {
        let reset = db
            .reset_all_timestamps()
            .await
            .context("Failed to reset timestamps")?;
        println!("Reset {} source timestamps", reset);
    }

    if args.status {
        return print_status(&db).await;
    }

    let stored = db.list_sources().await.context("Failed to list sources")?;
    registry.restore_from(&stored);

    let fetcher =
        HttpFetcher::new(config.fetch_settings()).context("Failed to build HTTP client")?;
    let store: Arc<dyn FeedStore> = Arc::new(db);
    let ingestor = Ingestor::new(store, Arc::new(fetcher));
    let scheduler = Scheduler::new(Arc::new(registry), ingestor, config.sweep_interval());

    if args.once {
        let report = scheduler.sweep().await;
        print_report(&report);
        return Ok(());
    }

    scheduler.start()?;
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    tracing::info!("Shutdown requested");
    scheduler.stop().await;

    Ok(())
}
