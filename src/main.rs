use anyhow::{Context, Result};
use clap::Parser;
use content_aggregator::orchestrator::{aggregate_from_path, AggregateError, AggregateOptions};
use content_aggregator::persist::{persist, SqliteStore};
use content_aggregator::report::AggregationReport;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(author, version, about = "Aggregate content from configured video channels and blogs")]
struct Args {
    /// Path to sources.yaml (default: config/sources.yaml, then ./sources.yaml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the report as JSON to this path
    #[arg(long)]
    output_json: Option<PathBuf>,

    /// Print the report as JSON on stdout instead of the summary
    #[arg(long)]
    print_json: bool,

    /// Fetch only YouTube videos
    #[arg(long, conflicts_with = "blogs_only")]
    youtube_only: bool,

    /// Fetch only blog articles
    #[arg(long)]
    blogs_only: bool,

    /// Skip transcript fetching for videos
    #[arg(long)]
    no_transcripts: bool,

    /// Persist new items into the content database
    #[arg(long)]
    save: bool,

    /// Database URL (default: $DATABASE_URL, then sqlite://data/content.db)
    #[arg(long)]
    database_url: Option<String>,

    /// Debug logging
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Warnings and errors only
    #[arg(short, long)]
    quiet: bool,
}

fn init_tracing(args: &Args) {
    let default_level = if args.verbose {
        "debug"
    } else if args.quiet {
        "warn"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn export_json(report: &AggregationReport, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

async fn save_report(report: &AggregationReport, database_url: &str) -> Result<()> {
    let store = SqliteStore::open(database_url).await?;
    let outcome = persist(&store, &report.items()).await;
    info!(
        videos_saved = outcome.videos.saved,
        videos_skipped = outcome.videos.skipped(),
        articles_saved = outcome.articles.saved,
        articles_skipped = outcome.articles.skipped(),
        total_saved = outcome.total_saved(),
        total_skipped = outcome.total_skipped(),
        "saved to database"
    );
    store.close().await;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let args = Args::parse();
    init_tracing(&args);

    let opts = AggregateOptions {
        include_youtube: !args.blogs_only,
        include_blogs: !args.youtube_only,
        include_transcripts: !args.no_transcripts,
    };

    let report = match aggregate_from_path(args.config.as_deref(), &opts).await {
        Ok(report) => report,
        Err(err @ AggregateError::Config(_)) => {
            error!(error = %err, "cannot start aggregation");
            return ExitCode::from(2);
        }
        Err(err) => {
            error!(error = %err, "aggregation failed to start");
            return ExitCode::from(2);
        }
    };

    if args.print_json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(err) => error!(error = %err, "failed to serialize report"),
        }
    } else {
        print!("{}", report.render_summary());
    }

    if let Some(path) = &args.output_json {
        match export_json(&report, path) {
            Ok(()) => info!(path = %path.display(), "exported aggregated content"),
            Err(err) => error!(error = %format!("{err:#}"), "failed to export report"),
        }
    }

    if args.save {
        let database_url = args
            .database_url
            .clone()
            .or_else(|| std::env::var("DATABASE_URL").ok())
            .unwrap_or_else(|| "sqlite://data/content.db".to_string());
        if let Err(err) = save_report(&report, &database_url).await {
            error!(error = %format!("{err:#}"), "failed to save content");
        }
    }

    let m = report.metadata();
    if m.total_items() == 0 {
        warn!("no content was aggregated");
    } else if m.has_errors() {
        warn!(errors = m.errors().len(), "completed with errors");
    } else {
        info!("aggregation completed successfully");
    }
    ExitCode::from(report.exit_code() as u8)
}
