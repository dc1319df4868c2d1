use anyhow::Result;
use clap::Parser;
use tracing::info;

use content_aggregator::config::Settings;
use content_aggregator::enrich::TranscriptProvider;
use content_aggregator::http::HttpFetcher;
use content_aggregator::scrapers::YouTubeTranscripts;

#[derive(Debug, Parser)]
#[command(author, version, about = "Fetch and print the transcript of one YouTube video")]
struct Args {
    /// 11-character video id
    video_id: String,

    /// Preferred caption language
    #[arg(long, default_value = "en")]
    lang: String,

    /// Print only the first N characters
    #[arg(long)]
    preview: Option<usize>,
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
    let provider = YouTubeTranscripts::new(http).with_language(&args.lang);

    let transcript = provider.fetch(&args.video_id).await?;
    info!(
        video_id = %transcript.video_id,
        chars = transcript.char_count,
        words = transcript.word_count,
        "transcript fetched"
    );
    let text: String = match args.preview {
        Some(n) => transcript.text.chars().take(n).collect(),
        None => transcript.text,
    };
    println!("{text}");
    Ok(())
}
