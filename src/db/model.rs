//! Rows returned by the content repositories.

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredVideo {
    pub id: i64,
    pub video_id: String,
    pub title: String,
    pub channel_name: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub transcript_text: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredArticle {
    pub id: i64,
    pub url: String,
    pub title: String,
    pub slug: Option<String>,
    /// JSON array text.
    pub subjects: String,
}
