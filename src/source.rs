//! Source capability seam, the per-source runner, and the fan-out scheduler.
use anyhow::Result;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument};

use crate::model::{ContentItem, SourceIdentity, SourceKind, SourceSpec};

/// A concrete origin of content (video channel feed, blog listing, ...).
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn fetch(&self, spec: &SourceSpec) -> Result<Vec<ContentItem>>;
}

/// A failed source, with structured identity for attribution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceError {
    pub source: SourceIdentity,
    pub message: String,
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self.source.kind {
            SourceKind::VideoChannel => "videos",
            SourceKind::BlogAggregator => "articles",
        };
        write!(f, "Failed to fetch {} from {}: {}", what, self.source, self.message)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Fetched {
        source: SourceIdentity,
        items: Vec<ContentItem>,
    },
    Failed(SourceError),
}

impl FetchOutcome {
    pub fn source(&self) -> &SourceIdentity {
        match self {
            FetchOutcome::Fetched { source, .. } => source,
            FetchOutcome::Failed(err) => &err.source,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, FetchOutcome::Failed(_))
    }
}

/// Invoke one source exactly once. Errors, timeouts and panics all come back
/// as `FetchOutcome::Failed`.
pub async fn run_source(
    source: Arc<dyn ContentSource>,
    spec: SourceSpec,
    deadline: Duration,
) -> FetchOutcome {
    let identity = spec.identity();
    let task = tokio::spawn(async move {
        tokio::time::timeout(deadline, source.fetch(&spec)).await
    });

    let result = match task.await {
        Ok(Ok(Ok(items))) => Ok(items),
        Ok(Ok(Err(err))) => Err(format!("{err:#}")),
        Ok(Err(_elapsed)) => Err(format!("timed out after {}s", deadline.as_secs_f64())),
        Err(join_err) if join_err.is_panic() => Err("source task panicked".to_string()),
        Err(join_err) => Err(format!("source task aborted: {join_err}")),
    };

    match result {
        Ok(items) => {
            info!(source = %identity, count = items.len(), "source fetched");
            FetchOutcome::Fetched {
                source: identity,
                items,
            }
        }
        Err(message) => {
            error!(source = %identity, error = %message, "source fetch failed");
            FetchOutcome::Failed(SourceError {
                source: identity,
                message,
            })
        }
    }
}

/// Outcomes for one category of sources plus its counters.
#[derive(Debug, Clone, Default)]
pub struct FanOutResult {
    pub outcomes: Vec<FetchOutcome>,
    pub attempted: usize,
    pub succeeded: usize,
}

impl FanOutResult {
    pub fn errors(&self) -> impl Iterator<Item = &SourceError> {
        self.outcomes.iter().filter_map(|o| match o {
            FetchOutcome::Failed(err) => Some(err),
            FetchOutcome::Fetched { .. } => None,
        })
    }
}

/// Drives a list of specs through `run_source`, up to `concurrency` at a time.
#[derive(Debug, Clone, Copy)]
pub struct FanOut {
    pub concurrency: usize,
    pub deadline: Duration,
}

impl FanOut {
    pub fn new(concurrency: usize, deadline: Duration) -> Self {
        Self {
            concurrency: concurrency.max(1),
            deadline,
        }
    }

    pub fn sequential(deadline: Duration) -> Self {
        Self::new(1, deadline)
    }

    /// Run every enabled spec. Disabled specs are skipped and not counted.
    #[instrument(skip_all, fields(specs = specs.len()))]
    pub async fn run_all(&self, source: Arc<dyn ContentSource>, specs: &[SourceSpec]) -> FanOutResult {
        let enabled: Vec<SourceSpec> = specs.iter().filter(|s| s.enabled).cloned().collect();
        if enabled.is_empty() {
            return FanOutResult::default();
        }

        let attempted = enabled.len();
        let deadline = self.deadline;
        let outcomes: Vec<FetchOutcome> = stream::iter(enabled.into_iter().map(|spec| {
            let source = Arc::clone(&source);
            run_source(source, spec, deadline)
        }))
        .buffer_unordered(self.concurrency)
        .collect()
        .await;

        let failed = outcomes.iter().filter(|o| o.is_error()).count();
        FanOutResult {
            outcomes,
            attempted,
            succeeded: attempted - failed,
        }
    }
}
