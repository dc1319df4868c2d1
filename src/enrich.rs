//! Transcript enrichment for fetched videos.
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::model::{Content, ContentItem, Transcript};

#[derive(Debug, Error)]
pub enum TranscriptError {
    #[error("transcripts are disabled for this video")]
    Disabled,
    #[error("no transcript found: {0}")]
    NotFound(String),
    #[error("video unavailable: {0}")]
    VideoUnavailable(String),
    #[error("transcript is empty")]
    Empty,
    #[error("transcript request failed: {0}")]
    Fetch(#[from] crate::http::FetchError),
    #[error("transcript could not be parsed: {0}")]
    Parse(String),
}

/// Secondary fetch keyed by a video's natural key.
#[async_trait]
pub trait TranscriptProvider: Send + Sync {
    async fn fetch(&self, video_id: &str) -> Result<Transcript, TranscriptError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichStats {
    pub attempted: usize,
    pub available: usize,
    pub degraded: usize,
}

const PROVIDER_PANICKED: &str = "transcript provider panicked";

async fn enrich_one(provider: &dyn TranscriptProvider, item: ContentItem) -> (ContentItem, Option<bool>) {
    match item {
        ContentItem::Video(mut video) if video.transcript.is_none() => {
            let fetched = AssertUnwindSafe(provider.fetch(video.natural_key()))
                .catch_unwind()
                .await;
            let transcript = match fetched {
                Ok(Ok(t)) if t.is_available && !t.text.trim().is_empty() => t,
                Ok(Ok(t)) if t.is_available => {
                    Transcript::unavailable(&video.video_id, TranscriptError::Empty.to_string())
                }
                Ok(Ok(t)) => Transcript::unavailable(
                    &video.video_id,
                    t.error_message.unwrap_or_else(|| "transcript unavailable".to_string()),
                ),
                Ok(Err(err)) => {
                    warn!(video_id = %video.video_id, error = %err, "transcript unavailable");
                    Transcript::unavailable(&video.video_id, err.to_string())
                }
                Err(_panic) => {
                    warn!(video_id = %video.video_id, "transcript provider panicked");
                    Transcript::unavailable(&video.video_id, PROVIDER_PANICKED)
                }
            };
            let available = transcript.is_available;
            debug!(video_id = %video.video_id, available, "transcript attached");
            video.transcript = Some(transcript);
            (ContentItem::Video(video), Some(available))
        }
        other => (other, None),
    }
}

/// Attach a transcript to every enrichable item that lacks one. Length and
/// order of `items` are preserved; failures degrade to an unavailable
/// transcript.
#[instrument(skip_all, fields(items = items.len()))]
pub async fn enrich_all(
    provider: &dyn TranscriptProvider,
    items: Vec<ContentItem>,
    concurrency: usize,
) -> (Vec<ContentItem>, EnrichStats) {
    let results: Vec<(ContentItem, Option<bool>)> = stream::iter(items.into_iter().map(|item| enrich_one(provider, item)))
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let mut stats = EnrichStats::default();
    let mut out = Vec::with_capacity(results.len());
    for (item, available) in results {
        match available {
            Some(true) => {
                stats.attempted += 1;
                stats.available += 1;
            }
            Some(false) => {
                stats.attempted += 1;
                stats.degraded += 1;
            }
            None => {}
        }
        out.push(item);
    }
    (out, stats)
}
