use anyhow::Result;
use clap::Parser;

use content_aggregator::config::Settings;
use content_aggregator::http::HttpFetcher;
use content_aggregator::scrapers::youtube::resolve_channel_id;

#[derive(Debug, Parser)]
#[command(author, version, about = "Resolve a YouTube @handle to its channel id")]
struct Args {
    /// Channel handle, with or without the leading @
    handle: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let http = HttpFetcher::from_settings(&Settings::default())?;
    let channel_id = resolve_channel_id(&http, &args.handle).await?;
    println!("{channel_id}");
    Ok(())
}
