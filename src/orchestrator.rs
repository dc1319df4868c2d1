//! Ties configuration, sources, enrichment and the report builder into a run.
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::config::{self, ConfigError, Settings, SourcesConfig};
use crate::enrich::{enrich_all, EnrichStats, TranscriptProvider};
use crate::http::{FetchError, HttpFetcher};
use crate::report::{run_id_for, AggregationReport};
use crate::scrapers::{BlogScraper, YouTubeScraper, YouTubeTranscripts};
use crate::source::{ContentSource, FanOut, FanOutResult, FetchOutcome};

/// Failures that prevent a run from starting at all.
#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to initialize HTTP sources: {0}")]
    Http(#[from] FetchError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateOptions {
    pub include_youtube: bool,
    pub include_blogs: bool,
    pub include_transcripts: bool,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            include_youtube: true,
            include_blogs: true,
            include_transcripts: true,
        }
    }
}

/// The capabilities a run dispatches to.
#[derive(Clone)]
pub struct Sources {
    pub videos: Arc<dyn ContentSource>,
    pub blogs: Arc<dyn ContentSource>,
    pub transcripts: Arc<dyn TranscriptProvider>,
}

impl Sources {
    /// HTTP-backed scrapers sharing one client configured from `settings`.
    pub fn live(settings: &Settings) -> Result<Self, FetchError> {
        let http = HttpFetcher::from_settings(settings)?;
        Ok(Self {
            videos: Arc::new(YouTubeScraper::new(http.clone())),
            blogs: Arc::new(BlogScraper::new(http.clone())),
            transcripts: Arc::new(YouTubeTranscripts::new(http)),
        })
    }
}

pub struct Aggregator {
    config: SourcesConfig,
    sources: Sources,
}

impl Aggregator {
    pub fn new(config: SourcesConfig, sources: Sources) -> Self {
        Self { config, sources }
    }

    pub fn config(&self) -> &SourcesConfig {
        &self.config
    }

    fn fan_out(&self) -> FanOut {
        let s = &self.config.settings;
        FanOut::new(s.max_concurrent_sources, s.source_deadline())
    }

    async fn enrich_outcomes(&self, results: &mut FanOutResult) -> EnrichStats {
        let concurrency = self.config.settings.max_concurrent_enrichments;
        let mut total = EnrichStats::default();
        for outcome in results.outcomes.iter_mut() {
            if let FetchOutcome::Fetched { items, .. } = outcome {
                let (enriched, stats) =
                    enrich_all(self.sources.transcripts.as_ref(), std::mem::take(items), concurrency).await;
                *items = enriched;
                total.attempted += stats.attempted;
                total.available += stats.available;
                total.degraded += stats.degraded;
            }
        }
        total
    }

    /// Run one aggregation. Source and enrichment failures are recorded in
    /// the report; this never fails.
    #[instrument(skip_all)]
    pub async fn aggregate(&self, opts: &AggregateOptions) -> AggregationReport {
        let started_at = Utc::now();
        let run_id = run_id_for(started_at);
        info!(run_id = %run_id, "starting content aggregation");

        let fan_out = self.fan_out();

        let videos = async {
            if !opts.include_youtube {
                return FanOutResult::default();
            }
            let specs = self.config.video_specs();
            info!(enabled = specs.iter().filter(|s| s.enabled).count(), "fetching video channels");
            fan_out.run_all(Arc::clone(&self.sources.videos), &specs).await
        };
        let blogs = async {
            if !opts.include_blogs {
                return FanOutResult::default();
            }
            let specs = self.config.blog_specs();
            info!(enabled = specs.iter().filter(|s| s.enabled).count(), "fetching blog sources");
            fan_out.run_all(Arc::clone(&self.sources.blogs), &specs).await
        };
        let (mut video_results, article_results) = tokio::join!(videos, blogs);

        if opts.include_transcripts {
            let stats = self.enrich_outcomes(&mut video_results).await;
            if stats.attempted > 0 {
                info!(
                    attempted = stats.attempted,
                    available = stats.available,
                    degraded = stats.degraded,
                    "transcripts attached"
                );
            }
        }

        let report = AggregationReport::build(run_id, started_at, Utc::now(), video_results, article_results);
        let m = report.metadata();
        info!(
            run_id = m.run_id(),
            total = m.total_items(),
            videos = m.videos_count(),
            articles = m.articles_count(),
            duration_secs = m.duration_seconds(),
            "aggregation complete"
        );
        if m.has_errors() {
            warn!(errors = m.errors().len(), "aggregation finished with source errors");
        }
        report
    }
}

/// Load configuration from `config_path` and run against live HTTP sources.
/// Configuration failures are returned before any fetch is attempted.
pub async fn aggregate_from_path(
    config_path: Option<&Path>,
    opts: &AggregateOptions,
) -> Result<AggregationReport, AggregateError> {
    let cfg = config::load(config_path)?;
    info!(path = %config::resolve_path(config_path).display(), "configuration loaded");
    let sources = Sources::live(&cfg.settings)?;
    Ok(Aggregator::new(cfg, sources).aggregate(opts).await)
}
