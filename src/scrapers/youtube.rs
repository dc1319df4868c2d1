//! YouTube channel videos via the public Atom feed.
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::Regex;
use tracing::{debug, instrument};

use crate::http::HttpFetcher;
use crate::model::{ContentItem, SourceSpec, VideoItem};
use crate::source::ContentSource;

pub const RSS_BASE_URL: &str = "https://www.youtube.com/feeds/videos.xml?channel_id=";
const CHANNEL_PAGE_BASE: &str = "https://www.youtube.com/@";

static CHANNEL_ID_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r#""channelId":"(UC[a-zA-Z0-9_-]{22})""#,
        r#""externalId":"(UC[a-zA-Z0-9_-]{22})""#,
        r"channel/(UC[a-zA-Z0-9_-]{22})",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("channel id pattern"))
    .collect()
});

#[derive(Debug, Clone)]
pub struct YouTubeScraper {
    http: HttpFetcher,
    rss_base: String,
}

impl YouTubeScraper {
    pub fn new(http: HttpFetcher) -> Self {
        Self::with_base_url(http, RSS_BASE_URL)
    }

    pub fn with_base_url(http: HttpFetcher, rss_base: &str) -> Self {
        Self {
            http,
            rss_base: rss_base.to_string(),
        }
    }

    pub fn feed_url(&self, channel_id: &str) -> String {
        format!("{}{}", self.rss_base, channel_id)
    }

    #[instrument(skip(self))]
    pub async fn fetch_videos(&self, channel_id: &str, max_results: usize) -> Result<Vec<VideoItem>> {
        let xml = self.http.get_text(&self.feed_url(channel_id)).await?;
        parse_feed(&xml, channel_id, max_results)
            .with_context(|| format!("Error fetching videos from channel {channel_id}"))
    }
}

#[async_trait]
impl ContentSource for YouTubeScraper {
    async fn fetch(&self, spec: &SourceSpec) -> Result<Vec<ContentItem>> {
        let videos = self.fetch_videos(&spec.id, spec.max_results).await?;
        Ok(videos.into_iter().map(ContentItem::Video).collect())
    }
}

#[derive(Default)]
struct EntryDraft {
    video_id: Option<String>,
    raw_id: Option<String>,
    title: Option<String>,
    author: Option<String>,
    link: Option<String>,
    published: Option<String>,
    description: Option<String>,
}

impl EntryDraft {
    fn finish(self, channel_id: &str, feed_title: &str) -> Option<VideoItem> {
        let video_id = self
            .video_id
            .or_else(|| self.raw_id.and_then(|id| id.rsplit(':').next().map(str::to_string)))?;
        let published_at = self
            .published
            .as_deref()
            .and_then(|p| DateTime::parse_from_rfc3339(p).ok())?
            .with_timezone(&Utc);
        Some(VideoItem {
            link: self
                .link
                .unwrap_or_else(|| format!("https://www.youtube.com/watch?v={video_id}")),
            video_id,
            title: self.title.unwrap_or_default(),
            channel_name: self.author.unwrap_or_else(|| feed_title.to_string()),
            channel_id: channel_id.to_string(),
            published_at,
            description: self.description.unwrap_or_default(),
            transcript: None,
        })
    }
}

fn alternate_href(e: &BytesStart<'_>) -> Result<Option<String>> {
    let rel = e
        .try_get_attribute("rel")?
        .map(|a| a.unescape_value().map(|v| v.into_owned()))
        .transpose()?;
    if rel.as_deref().is_some_and(|r| r != "alternate") {
        return Ok(None);
    }
    Ok(e
        .try_get_attribute("href")?
        .map(|a| a.unescape_value().map(|v| v.into_owned()))
        .transpose()?)
}

/// Parse a channel Atom feed into at most `max_results` videos, in feed order.
pub fn parse_feed(xml: &str, channel_id: &str, max_results: usize) -> Result<Vec<VideoItem>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<String> = Vec::new();
    let mut saw_feed = false;
    let mut feed_title = String::new();
    let mut entry: Option<EntryDraft> = None;
    let mut videos = Vec::new();

    loop {
        let event = reader
            .read_event()
            .map_err(|e| anyhow!("Failed to parse RSS feed at {}: {e}", reader.buffer_position()))?;
        match event {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                match name.as_str() {
                    "feed" => saw_feed = true,
                    "entry" => entry = Some(EntryDraft::default()),
                    "link" => {
                        if let Some(draft) = entry.as_mut() {
                            if draft.link.is_none() {
                                draft.link = alternate_href(&e)?;
                            }
                        }
                    }
                    _ => {}
                }
                stack.push(name);
            }
            Event::Empty(e) => {
                if e.local_name().as_ref() == b"link" {
                    if let Some(draft) = entry.as_mut() {
                        if draft.link.is_none() {
                            draft.link = alternate_href(&e)?;
                        }
                    }
                }
            }
            Event::Text(t) => {
                let text = t.unescape()?.into_owned();
                assign_text(&stack, entry.as_mut(), &mut feed_title, text);
            }
            Event::CData(c) => {
                let text = String::from_utf8_lossy(&c.into_inner()).into_owned();
                assign_text(&stack, entry.as_mut(), &mut feed_title, text);
            }
            Event::End(e) => {
                if e.local_name().as_ref() == b"entry" {
                    if let Some(draft) = entry.take() {
                        match draft.finish(channel_id, &feed_title) {
                            Some(video) if videos.len() < max_results => videos.push(video),
                            Some(_) => {}
                            None => debug!(channel_id, "skipping feed entry without id or date"),
                        }
                    }
                }
                stack.pop();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_feed {
        bail!("Failed to parse RSS feed: no <feed> element");
    }
    Ok(videos)
}

fn assign_text(stack: &[String], entry: Option<&mut EntryDraft>, feed_title: &mut String, text: String) {
    let Some(current) = stack.last().map(String::as_str) else {
        return;
    };
    let parent = stack.len().checked_sub(2).map(|i| stack[i].as_str());
    match entry {
        Some(draft) => match (parent, current) {
            (_, "videoId") => draft.video_id = Some(text),
            (Some("entry"), "id") => draft.raw_id = Some(text),
            (Some("entry"), "title") => draft.title = Some(text),
            (Some("entry"), "published") => draft.published = Some(text),
            (Some("author"), "name") => draft.author = Some(text),
            (Some("group"), "description") => draft.description = Some(text),
            _ => {}
        },
        None => {
            if parent == Some("feed") && current == "title" {
                *feed_title = text;
            }
        }
    }
}

/// Find the first `UC…` channel id embedded in a channel page.
pub fn extract_channel_id(html: &str) -> Option<String> {
    CHANNEL_ID_PATTERNS
        .iter()
        .find_map(|re| re.captures(html).map(|c| c[1].to_string()))
}

/// Resolve an `@handle` (with or without the `@`) to its channel id.
pub async fn resolve_channel_id(http: &HttpFetcher, handle: &str) -> Result<String> {
    let handle = handle.trim().trim_start_matches('@');
    let html = http
        .get_text(&format!("{CHANNEL_PAGE_BASE}{handle}"))
        .await
        .context("Error fetching channel ID")?;
    extract_channel_id(&html).ok_or_else(|| anyhow!("Could not find channel ID for @{handle}"))
}
