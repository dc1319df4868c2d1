//! Deduplicating persistence: first write per natural key wins, later writes
//! of the same key are reported as duplicates.
use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::db::{self, Pool};
use crate::model::{Content, ContentItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertStatus {
    Inserted,
    Duplicate,
}

/// Storage keyed by each item's natural key.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn insert_if_absent(&self, item: &ContentItem) -> Result<InsertStatus>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum ItemPersistence {
    Inserted,
    Duplicate,
    Failed(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CategoryCounts {
    pub saved: usize,
    pub duplicates: usize,
    pub failed: usize,
}

impl CategoryCounts {
    pub fn skipped(&self) -> usize {
        self.duplicates + self.failed
    }

    fn record(&mut self, result: &ItemPersistence) {
        match result {
            ItemPersistence::Inserted => self.saved += 1,
            ItemPersistence::Duplicate => self.duplicates += 1,
            ItemPersistence::Failed(_) => self.failed += 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PersistenceOutcome {
    /// `(natural_key, result)` in input order.
    pub items: Vec<(String, ItemPersistence)>,
    pub videos: CategoryCounts,
    pub articles: CategoryCounts,
}

impl PersistenceOutcome {
    pub fn total_saved(&self) -> usize {
        self.videos.saved + self.articles.saved
    }

    /// Everything not inserted: duplicates plus failures.
    pub fn total_skipped(&self) -> usize {
        self.videos.skipped() + self.articles.skipped()
    }

    pub fn total_failed(&self) -> usize {
        self.videos.failed + self.articles.failed
    }
}

/// Write every item in order. A failing item is recorded and the rest still
/// get written.
#[instrument(skip_all, fields(items = items.len()))]
pub async fn persist(store: &dyn ContentStore, items: &[ContentItem]) -> PersistenceOutcome {
    let mut outcome = PersistenceOutcome::default();
    for item in items {
        let result = match store.insert_if_absent(item).await {
            Ok(InsertStatus::Inserted) => ItemPersistence::Inserted,
            Ok(InsertStatus::Duplicate) => ItemPersistence::Duplicate,
            Err(err) => {
                warn!(key = item.natural_key(), error = %format!("{err:#}"), "failed to save item");
                ItemPersistence::Failed(format!("{err:#}"))
            }
        };
        match item {
            ContentItem::Video(_) => outcome.videos.record(&result),
            ContentItem::Article(_) => outcome.articles.record(&result),
        }
        outcome.items.push((item.natural_key().to_string(), result));
    }
    info!(
        saved = outcome.total_saved(),
        skipped = outcome.total_skipped(),
        failed = outcome.total_failed(),
        "persistence complete"
    );
    outcome
}

/// SQLite-backed store. Open with [`SqliteStore::open`], release with
/// [`SqliteStore::close`].
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: Pool,
}

impl SqliteStore {
    /// Connect and apply migrations.
    pub async fn open(database_url: &str) -> Result<Self> {
        let pool = db::init_pool(database_url).await?;
        db::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl ContentStore for SqliteStore {
    async fn insert_if_absent(&self, item: &ContentItem) -> Result<InsertStatus> {
        let inserted = match item {
            ContentItem::Video(v) => db::insert_video_if_absent(&self.pool, v).await?,
            ContentItem::Article(a) => db::insert_article_if_absent(&self.pool, a).await?,
        };
        Ok(if inserted {
            InsertStatus::Inserted
        } else {
            InsertStatus::Duplicate
        })
    }
}
