//! The per-run aggregation report and its derived statistics.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::{sort_by_recency, ArticleItem, Content, ContentItem, VideoItem};
use crate::source::{FanOutResult, FetchOutcome, SourceError};

/// Run metadata. Derived values are computed once when the report is built.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunMetadata {
    run_id: String,
    started_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
    total_items: usize,
    videos_count: usize,
    articles_count: usize,
    errors: Vec<SourceError>,
    sources_attempted: usize,
    sources_succeeded: usize,
    duration_seconds: f64,
    success_rate: f64,
}

impl RunMetadata {
    pub fn run_id(&self) -> &str {
        &self.run_id
    }
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }
    pub fn total_items(&self) -> usize {
        self.total_items
    }
    pub fn videos_count(&self) -> usize {
        self.videos_count
    }
    pub fn articles_count(&self) -> usize {
        self.articles_count
    }
    pub fn errors(&self) -> &[SourceError] {
        &self.errors
    }
    pub fn sources_attempted(&self) -> usize {
        self.sources_attempted
    }
    pub fn sources_succeeded(&self) -> usize {
        self.sources_succeeded
    }
    pub fn duration_seconds(&self) -> f64 {
        self.duration_seconds
    }
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
    /// `sources_succeeded / sources_attempted`, or 0 when nothing was attempted.
    pub fn success_rate(&self) -> f64 {
        self.success_rate
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AggregationReport {
    metadata: RunMetadata,
    videos: Vec<VideoItem>,
    articles: Vec<ArticleItem>,
}

/// Run id in the form `agg_YYYYMMDD_HHMMSS`.
pub fn run_id_for(started_at: DateTime<Utc>) -> String {
    format!("agg_{}", started_at.format("%Y%m%d_%H%M%S"))
}

impl AggregationReport {
    /// Merge category results into one report. Items keep their per-source
    /// order; errors keep outcome order.
    pub fn build(
        run_id: impl Into<String>,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
        video_results: FanOutResult,
        article_results: FanOutResult,
    ) -> Self {
        let mut videos = Vec::new();
        let mut articles = Vec::new();
        let mut errors = Vec::new();
        let attempted = video_results.attempted + article_results.attempted;

        for outcome in video_results.outcomes.into_iter().chain(article_results.outcomes) {
            match outcome {
                FetchOutcome::Fetched { items, .. } => {
                    for item in items {
                        match item {
                            ContentItem::Video(v) => videos.push(v),
                            ContentItem::Article(a) => articles.push(a),
                        }
                    }
                }
                FetchOutcome::Failed(err) => errors.push(err),
            }
        }

        let succeeded = attempted.saturating_sub(errors.len());
        let success_rate = if attempted == 0 {
            0.0
        } else {
            succeeded as f64 / attempted as f64
        };
        let duration_seconds = (completed_at - started_at)
            .to_std()
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);

        let metadata = RunMetadata {
            run_id: run_id.into(),
            started_at,
            completed_at,
            total_items: videos.len() + articles.len(),
            videos_count: videos.len(),
            articles_count: articles.len(),
            errors,
            sources_attempted: attempted,
            sources_succeeded: succeeded,
            duration_seconds,
            success_rate,
        };
        Self {
            metadata,
            videos,
            articles,
        }
    }

    pub fn metadata(&self) -> &RunMetadata {
        &self.metadata
    }

    pub fn videos(&self) -> &[VideoItem] {
        &self.videos
    }

    pub fn articles(&self) -> &[ArticleItem] {
        &self.articles
    }

    pub fn has_content(&self) -> bool {
        !self.videos.is_empty() || !self.articles.is_empty()
    }

    /// Videos then articles, in report order.
    pub fn items(&self) -> Vec<ContentItem> {
        self.videos
            .iter()
            .cloned()
            .map(ContentItem::Video)
            .chain(self.articles.iter().cloned().map(ContentItem::Article))
            .collect()
    }

    /// Every item, newest first (ties by natural key).
    pub fn all_content(&self) -> Vec<ContentItem> {
        let mut all = self.items();
        sort_by_recency(&mut all);
        all
    }

    /// Items published within `[start, end]`, newest first.
    pub fn content_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<ContentItem> {
        self.all_content()
            .into_iter()
            .filter(|i| (start..=end).contains(&i.published_at()))
            .collect()
    }

    /// 0 when the run had items and no errors, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.metadata.total_items == 0 || self.metadata.has_errors() {
            1
        } else {
            0
        }
    }

    pub fn render_summary(&self) -> String {
        self.to_string()
    }

    /// Human-readable run summary: metadata, errors and the ten newest items.
    pub fn write_summary(&self, out: &mut impl fmt::Write) -> fmt::Result {
        let m = &self.metadata;
        let rule = "=".repeat(70);

        writeln!(out, "\n{rule}\n  CONTENT AGGREGATION RUN SUMMARY\n{rule}")?;
        writeln!(out, "\nRun ID:      {}", m.run_id)?;
        writeln!(out, "Started:     {}", m.started_at.format("%Y-%m-%d %H:%M:%S"))?;
        writeln!(out, "Completed:   {}", m.completed_at.format("%Y-%m-%d %H:%M:%S"))?;
        writeln!(out, "Duration:    {:.2} seconds", m.duration_seconds)?;

        writeln!(out, "\n{:=^70}", "SUMMARY")?;
        writeln!(out, "Total Items:         {}", m.total_items)?;
        writeln!(out, "  - YouTube Videos:  {}", m.videos_count)?;
        writeln!(out, "  - Blog Articles:   {}", m.articles_count)?;
        writeln!(out, "\nSources Attempted:   {}", m.sources_attempted)?;
        writeln!(out, "Sources Succeeded:   {}", m.sources_succeeded)?;
        writeln!(out, "Success Rate:        {:.1}%", m.success_rate * 100.0)?;

        if m.has_errors() {
            writeln!(out, "\n{:=^70}", "ERRORS")?;
            writeln!(out, "Total Errors: {}", m.errors.len())?;
            for (i, err) in m.errors.iter().enumerate() {
                writeln!(out, "  {}. {}", i + 1, err)?;
            }
        }

        if self.has_content() {
            writeln!(out, "\n{:=^70}", "RECENT CONTENT (Top 10)")?;
            for (i, item) in self.all_content().iter().take(10).enumerate() {
                let title: String = item.title().chars().take(50).collect();
                writeln!(out, "{:2}. [{:7}] {:<50}", i + 1, item.kind_label(), title)?;
                writeln!(
                    out,
                    "     Source: {:<30} Date: {}",
                    item.origin(),
                    item.published_at().format("%Y-%m-%d")
                )?;
            }
        } else {
            writeln!(out, "\n{:=^70}", "NO CONTENT")?;
            writeln!(out, "No content was aggregated during this run.")?;
        }

        writeln!(out, "\n{rule}")
    }
}

impl fmt::Display for AggregationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_summary(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SourceIdentity, SourceKind};
    use chrono::{Duration, TimeZone};

    fn video(id: &str, day: u32) -> ContentItem {
        ContentItem::Video(VideoItem {
            video_id: id.into(),
            title: format!("video {id}"),
            channel_name: "Chan".into(),
            channel_id: "UC".into(),
            published_at: Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
            link: String::new(),
            description: String::new(),
            transcript: None,
        })
    }

    fn identity(kind: SourceKind, id: &str) -> SourceIdentity {
        SourceIdentity {
            kind,
            id: id.into(),
            name: id.into(),
        }
    }

    #[test]
    fn empty_run_has_zero_success_rate() {
        let t = Utc::now();
        let report = AggregationReport::build("r", t, t, FanOutResult::default(), FanOutResult::default());
        assert_eq!(report.metadata().total_items(), 0);
        assert_eq!(report.metadata().success_rate(), 0.0);
        assert!(!report.metadata().has_errors());
        assert_eq!(report.exit_code(), 1);
    }

    #[test]
    fn counts_and_duration() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = start + Duration::milliseconds(2500);
        let vids = FanOutResult {
            outcomes: vec![
                FetchOutcome::Fetched {
                    source: identity(SourceKind::VideoChannel, "a"),
                    items: vec![video("v1", 1), video("v2", 5)],
                },
                FetchOutcome::Failed(SourceError {
                    source: identity(SourceKind::VideoChannel, "b"),
                    message: "boom".into(),
                }),
            ],
            attempted: 2,
            succeeded: 1,
        };
        let report = AggregationReport::build(run_id_for(start), start, end, vids, FanOutResult::default());
        let m = report.metadata();
        assert_eq!(m.run_id(), "agg_20240101_000000");
        assert_eq!(m.videos_count(), 2);
        assert_eq!(m.sources_succeeded(), 1);
        assert_eq!(m.success_rate(), 0.5);
        assert_eq!(m.duration_seconds(), 2.5);
        assert_eq!(report.exit_code(), 1);

        let keys: Vec<_> = report.all_content().iter().map(|i| i.natural_key().to_string()).collect();
        assert_eq!(keys, vec!["v2", "v1"]);
        let jan3 = Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap();
        assert_eq!(report.content_between(start, jan3).len(), 1);

        let summary = report.render_summary();
        assert!(summary.contains("Success Rate:        50.0%"));
        let mut written = String::new();
        report.write_summary(&mut written).unwrap();
        assert_eq!(written, summary);
        assert!(summary.contains("1. Failed to fetch videos from channel b (b): boom"));
    }

    #[test]
    fn serializes_metadata_tree() {
        let t = Utc::now();
        let report = AggregationReport::build("r", t, t, FanOutResult::default(), FanOutResult::default());
        let v = serde_json::to_value(&report).unwrap();
        assert_eq!(v["metadata"]["sources_attempted"], 0);
        assert!(v["videos"].as_array().unwrap().is_empty());
        assert!(v["articles"].as_array().unwrap().is_empty());
    }
}
