use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

pub const NO_TRANSCRIPT_TEXT: &str = "No transcript available";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    VideoChannel,
    BlogAggregator,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::VideoChannel => "video-channel",
            SourceKind::BlogAggregator => "blog-aggregator",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One fetchable source, expanded from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSpec {
    pub kind: SourceKind,
    /// Channel id for videos, listing URL for blogs.
    pub id: String,
    pub name: String,
    pub max_results: usize,
    pub enabled: bool,
    /// Blog source type (e.g. `research`); marks article links on the page.
    pub section: Option<String>,
}

impl SourceSpec {
    pub fn identity(&self) -> SourceIdentity {
        SourceIdentity {
            kind: self.kind,
            id: self.id.clone(),
            name: self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SourceIdentity {
    pub kind: SourceKind,
    pub id: String,
    pub name: String,
}

impl fmt::Display for SourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            SourceKind::VideoChannel => write!(f, "channel {} ({})", self.name, self.id),
            SourceKind::BlogAggregator => write!(f, "blog {} ({})", self.name, self.id),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transcript {
    pub video_id: String,
    pub text: String,
    pub fetched_at: DateTime<Utc>,
    pub char_count: usize,
    pub word_count: usize,
    pub is_available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl Transcript {
    pub fn from_text(video_id: &str, text: &str) -> Self {
        let text = text.trim();
        Self {
            video_id: video_id.to_string(),
            text: text.to_string(),
            fetched_at: Utc::now(),
            char_count: text.chars().count(),
            word_count: text.split_whitespace().count(),
            is_available: true,
            error_message: None,
        }
    }

    pub fn unavailable(video_id: &str, cause: impl Into<String>) -> Self {
        Self {
            video_id: video_id.to_string(),
            text: NO_TRANSCRIPT_TEXT.to_string(),
            fetched_at: Utc::now(),
            char_count: 0,
            word_count: 0,
            is_available: false,
            error_message: Some(cause.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VideoItem {
    pub video_id: String,
    pub title: String,
    pub channel_name: String,
    pub channel_id: String,
    pub published_at: DateTime<Utc>,
    pub link: String,
    pub description: String,
    #[serde(default)]
    pub transcript: Option<Transcript>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArticleItem {
    pub url: String,
    pub title: String,
    pub slug: String,
    pub published_at: DateTime<Utc>,
    pub summary: String,
    pub subjects: Vec<String>,
    pub source_type: String,
}

/// Shared view over every content kind.
pub trait Content {
    fn published_at(&self) -> DateTime<Utc>;
    fn natural_key(&self) -> &str;
    fn title(&self) -> &str;
}

impl Content for VideoItem {
    fn published_at(&self) -> DateTime<Utc> {
        self.published_at
    }
    fn natural_key(&self) -> &str {
        &self.video_id
    }
    fn title(&self) -> &str {
        &self.title
    }
}

impl Content for ArticleItem {
    fn published_at(&self) -> DateTime<Utc> {
        self.published_at
    }
    fn natural_key(&self) -> &str {
        &self.url
    }
    fn title(&self) -> &str {
        &self.title
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentItem {
    Video(VideoItem),
    Article(ArticleItem),
}

impl ContentItem {
    /// Only videos carry a secondary transcript fetch.
    pub fn is_enrichable(&self) -> bool {
        matches!(self, ContentItem::Video(_))
    }

    pub fn kind_label(&self) -> &'static str {
        match self {
            ContentItem::Video(_) => "VIDEO",
            ContentItem::Article(_) => "ARTICLE",
        }
    }

    /// Channel name for videos, capitalized source type for articles.
    pub fn origin(&self) -> String {
        match self {
            ContentItem::Video(v) => v.channel_name.clone(),
            ContentItem::Article(a) => {
                let mut chars = a.source_type.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                }
            }
        }
    }
}

impl Content for ContentItem {
    fn published_at(&self) -> DateTime<Utc> {
        match self {
            ContentItem::Video(v) => v.published_at(),
            ContentItem::Article(a) => a.published_at(),
        }
    }
    fn natural_key(&self) -> &str {
        match self {
            ContentItem::Video(v) => v.natural_key(),
            ContentItem::Article(a) => a.natural_key(),
        }
    }
    fn title(&self) -> &str {
        match self {
            ContentItem::Video(v) => v.title(),
            ContentItem::Article(a) => a.title(),
        }
    }
}

impl From<VideoItem> for ContentItem {
    fn from(v: VideoItem) -> Self {
        ContentItem::Video(v)
    }
}

impl From<ArticleItem> for ContentItem {
    fn from(a: ArticleItem) -> Self {
        ContentItem::Article(a)
    }
}

/// Most recent first; equal timestamps fall back to natural key ascending.
pub fn recency_order<T: Content + ?Sized>(a: &T, b: &T) -> Ordering {
    b.published_at()
        .cmp(&a.published_at())
        .then_with(|| a.natural_key().cmp(b.natural_key()))
}

pub fn sort_by_recency<T: Content>(items: &mut [T]) {
    items.sort_by(|a, b| recency_order(a, b));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn article(url: &str, day: u32) -> ContentItem {
        ContentItem::Article(ArticleItem {
            url: url.into(),
            title: "t".into(),
            slug: "s".into(),
            published_at: Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
            summary: String::new(),
            subjects: vec![],
            source_type: "research".into(),
        })
    }

    #[test]
    fn sort_newest_first_with_key_tiebreak() {
        let mut items = vec![article("b", 1), article("z", 3), article("a", 3)];
        sort_by_recency(&mut items);
        let keys: Vec<_> = items.iter().map(|i| i.natural_key().to_string()).collect();
        assert_eq!(keys, vec!["a", "z", "b"]);
    }

    #[test]
    fn transcript_counts_trimmed_text() {
        let t = Transcript::from_text("abc12345678", "  hello big world \n");
        assert!(t.is_available);
        assert_eq!(t.text, "hello big world");
        assert_eq!(t.char_count, 15);
        assert_eq!(t.word_count, 3);
    }

    #[test]
    fn unavailable_transcript_is_zeroed() {
        let t = Transcript::unavailable("abc12345678", "transcript disabled");
        assert!(!t.is_available);
        assert_eq!(t.text, NO_TRANSCRIPT_TEXT);
        assert_eq!((t.char_count, t.word_count), (0, 0));
        assert_eq!(t.error_message.as_deref(), Some("transcript disabled"));
    }

    #[test]
    fn origin_capitalizes_article_type() {
        assert_eq!(article("u", 1).origin(), "Research");
    }
}
