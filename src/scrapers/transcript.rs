//! YouTube caption tracks fetched as plain transcript text.
use async_trait::async_trait;
use once_cell::sync::Lazy;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::enrich::{TranscriptError, TranscriptProvider};
use crate::http::HttpFetcher;
use crate::model::Transcript;

const WATCH_BASE_URL: &str = "https://www.youtube.com/watch?v=";

static PLAYABILITY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""playabilityStatus":\{"status":"([A-Z_]+)"(?:,"reason":"([^"]*)")?"#)
        .expect("playability regex")
});

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionTrack {
    pub base_url: String,
    #[serde(default)]
    pub language_code: String,
    #[serde(default)]
    pub kind: Option<String>,
}

#[derive(Debug, Clone)]
pub struct YouTubeTranscripts {
    http: HttpFetcher,
    watch_base: String,
    language: String,
}

impl YouTubeTranscripts {
    pub fn new(http: HttpFetcher) -> Self {
        Self {
            http,
            watch_base: WATCH_BASE_URL.to_string(),
            language: "en".to_string(),
        }
    }

    pub fn with_language(mut self, language: &str) -> Self {
        self.language = language.to_string();
        self
    }
}

#[async_trait]
impl TranscriptProvider for YouTubeTranscripts {
    #[instrument(skip(self))]
    async fn fetch(&self, video_id: &str) -> Result<Transcript, TranscriptError> {
        let page = self.http.get_text(&format!("{}{}", self.watch_base, video_id)).await?;
        let tracks = caption_tracks(&page)?;
        let track = pick_track(&tracks, &self.language).ok_or_else(|| match playability(&page) {
            Some((status, reason)) if status != "OK" => {
                TranscriptError::VideoUnavailable(reason.unwrap_or(status))
            }
            _ => TranscriptError::Disabled,
        })?;
        debug!(video_id, language = %track.language_code, "caption track selected");

        let xml = self.http.get_text(&track.base_url).await?;
        let text = parse_timed_text(&xml)?;
        if text.trim().is_empty() {
            return Err(TranscriptError::Empty);
        }
        Ok(Transcript::from_text(video_id, &text))
    }
}

fn playability(page: &str) -> Option<(String, Option<String>)> {
    PLAYABILITY_RE
        .captures(page)
        .map(|c| (c[1].to_string(), c.get(2).map(|m| m.as_str().to_string())))
}

/// Caption tracks embedded in a watch page; empty when the page has none.
pub fn caption_tracks(page: &str) -> Result<Vec<CaptionTrack>, TranscriptError> {
    const KEY: &str = "\"captionTracks\":";
    let Some(pos) = page.find(KEY) else {
        return Ok(Vec::new());
    };
    let rest = &page[pos + KEY.len()..];
    serde_json::Deserializer::from_str(rest)
        .into_iter::<Vec<CaptionTrack>>()
        .next()
        .unwrap_or_else(|| Ok(Vec::new()))
        .map_err(|e| TranscriptError::Parse(format!("caption track list: {e}")))
}

/// Prefer a manual track in `language`, then an auto-generated one, then any.
pub fn pick_track<'a>(tracks: &'a [CaptionTrack], language: &str) -> Option<&'a CaptionTrack> {
    let lang = |t: &&CaptionTrack| t.language_code == language || t.language_code.starts_with(&format!("{language}-"));
    let is_asr = |t: &&CaptionTrack| t.kind.as_deref() == Some("asr");
    tracks
        .iter()
        .find(|t| lang(t) && !is_asr(t))
        .or_else(|| tracks.iter().find(lang))
        .or_else(|| tracks.first())
}

/// Join every caption segment (`<text>` or `<p>`) with single spaces.
pub fn parse_timed_text(xml: &str) -> Result<String, TranscriptError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut depth = 0usize;
    let mut current = String::new();
    let mut segments: Vec<String> = Vec::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.local_name();
                if matches!(name.as_ref(), b"text" | b"p") {
                    depth += 1;
                }
            }
            Ok(Event::Text(t)) if depth > 0 => {
                let once = t
                    .unescape()
                    .map_err(|e| TranscriptError::Parse(e.to_string()))?
                    .into_owned();
                // captions are frequently entity-escaped twice
                let twice = quick_xml::escape::unescape(&once)
                    .map(|c| c.into_owned())
                    .unwrap_or(once);
                if !current.is_empty() {
                    current.push(' ');
                }
                current.push_str(&twice);
            }
            Ok(Event::End(e)) => {
                let name = e.local_name();
                if matches!(name.as_ref(), b"text" | b"p") && depth > 0 {
                    depth -= 1;
                    if depth == 0 {
                        let seg = current.split_whitespace().collect::<Vec<_>>().join(" ");
                        if !seg.is_empty() {
                            segments.push(seg);
                        }
                        current.clear();
                    }
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(TranscriptError::Parse(e.to_string())),
        }
    }
    Ok(segments.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_tracks_with_nested_json() {
        let page = r#"var ytInitialPlayerResponse = {"captions":{"playerCaptionsTracklistRenderer":{"captionTracks":[{"baseUrl":"https://www.youtube.com/api/timedtext?v=abc12345678&lang=en","name":{"runs":[{"text":"English"}]},"languageCode":"en","kind":"asr"},{"baseUrl":"https://x/de","name":{"runs":[{"text":"German"}]},"languageCode":"de"}],"audioTracks":[]}}};"#;
        let tracks = caption_tracks(page).unwrap();
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].base_url, "https://www.youtube.com/api/timedtext?v=abc12345678&lang=en");
        assert_eq!(pick_track(&tracks, "en").unwrap().language_code, "en");
        assert_eq!(pick_track(&tracks, "fr").unwrap().language_code, "en");
    }

    #[test]
    fn no_tracks_is_empty() {
        assert!(caption_tracks("<html></html>").unwrap().is_empty());
        let page = r#""playabilityStatus":{"status":"ERROR","reason":"Video unavailable"}"#;
        assert_eq!(
            playability(page),
            Some(("ERROR".to_string(), Some("Video unavailable".to_string())))
        );
    }

    #[test]
    fn timed_text_joins_segments() {
        let xml = r#"<?xml version="1.0" encoding="utf-8" ?><transcript><text start="0.0" dur="1.2">Hello  there</text><text start="1.2" dur="2">it&amp;#39;s   me</text><text start="3" dur="1"></text></transcript>"#;
        assert_eq!(parse_timed_text(xml).unwrap(), "Hello there it's me");
    }

    #[test]
    fn timed_text_format_three() {
        let xml = r#"<timedtext format="3"><body><p t="0" d="10"><s>one</s><s> two</s></p><p t="10" d="5">three</p></body></timedtext>"#;
        assert_eq!(parse_timed_text(xml).unwrap(), "one two three");
    }
}
