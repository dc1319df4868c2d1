use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use content_aggregator::enrich::{enrich_all, TranscriptError, TranscriptProvider};
use content_aggregator::model::{
    ArticleItem, Content, ContentItem, Transcript, VideoItem, NO_TRANSCRIPT_TEXT,
};

#[derive(Clone, Copy)]
enum Reply {
    Text(&'static str),
    Disabled,
    NotFound,
    Blank,
    Withheld,
    Panic,
}

#[derive(Clone, Default)]
struct RecordingTranscripts {
    replies: Arc<HashMap<String, Reply>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl RecordingTranscripts {
    fn new(replies: Vec<(&str, Reply)>) -> Self {
        Self {
            replies: Arc::new(replies.into_iter().map(|(k, r)| (k.to_string(), r)).collect()),
            ..Default::default()
        }
    }

    async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl TranscriptProvider for RecordingTranscripts {
    async fn fetch(&self, video_id: &str) -> Result<Transcript, TranscriptError> {
        self.calls.lock().await.push(video_id.to_string());
        match self.replies.get(video_id).copied() {
            Some(Reply::Text(text)) => Ok(Transcript::from_text(video_id, text)),
            Some(Reply::Blank) => Ok(Transcript::from_text(video_id, "   ")),
            Some(Reply::NotFound) => Err(TranscriptError::NotFound("no english track".into())),
            Some(Reply::Withheld) => Ok(Transcript {
                text: "partial captions".into(),
                char_count: 16,
                word_count: 2,
                is_available: false,
                error_message: Some("captions withheld".into()),
                ..Transcript::from_text(video_id, "partial captions")
            }),
            Some(Reply::Panic) => panic!("caption backend crashed for {video_id}"),
            Some(Reply::Disabled) | None => Err(TranscriptError::Disabled),
        }
    }
}

fn video(id: &str) -> ContentItem {
    ContentItem::Video(VideoItem {
        video_id: id.into(),
        title: format!("Video {id}"),
        channel_name: "Chan".into(),
        channel_id: "UCaaaaaaaaaaaaaaaaaaaaaa".into(),
        published_at: Utc::now(),
        link: String::new(),
        description: String::new(),
        transcript: None,
    })
}

fn article(url: &str) -> ContentItem {
    ContentItem::Article(ArticleItem {
        url: url.into(),
        title: "Article".into(),
        slug: "article".into(),
        published_at: Utc::now(),
        summary: String::new(),
        subjects: vec![],
        source_type: "research".into(),
    })
}

fn transcript_of(item: &ContentItem) -> Option<&Transcript> {
    match item {
        ContentItem::Video(v) => v.transcript.as_ref(),
        ContentItem::Article(_) => None,
    }
}

#[tokio::test]
async fn disabled_transcript_degrades_the_video() {
    let provider = RecordingTranscripts::new(vec![("abc12345678", Reply::Disabled)]);
    let (items, stats) = enrich_all(&provider, vec![video("abc12345678")], 4).await;

    assert_eq!(items.len(), 1);
    let t = transcript_of(&items[0]).expect("transcript attached");
    assert!(!t.is_available);
    assert_eq!(t.text, NO_TRANSCRIPT_TEXT);
    assert_eq!((t.char_count, t.word_count), (0, 0));
    assert!(t.error_message.as_deref().unwrap().contains("disabled"));
    assert_eq!((stats.attempted, stats.degraded), (1, 1));
}

#[tokio::test]
async fn mixed_results_preserve_length_and_order() {
    let provider = RecordingTranscripts::new(vec![
        ("v1", Reply::Text("first transcript here")),
        ("v2", Reply::NotFound),
        ("v4", Reply::Blank),
        ("v5", Reply::Text("fifth")),
    ]);
    let input = vec![video("v1"), video("v2"), article("https://a/x"), video("v4"), video("v5")];
    let keys_in: Vec<String> = input.iter().map(|i| i.natural_key().to_string()).collect();

    for concurrency in [1, 3] {
        let (items, stats) = enrich_all(&provider, input.clone(), concurrency).await;
        let keys_out: Vec<String> = items.iter().map(|i| i.natural_key().to_string()).collect();
        assert_eq!(keys_out, keys_in);

        let availability: Vec<_> = items.iter().map(|i| transcript_of(i).map(|t| t.is_available)).collect();
        assert_eq!(
            availability,
            vec![Some(true), Some(false), None, Some(false), Some(true)]
        );
        assert_eq!(transcript_of(&items[0]).unwrap().word_count, 3);
        assert_eq!((stats.attempted, stats.available, stats.degraded), (4, 2, 2));
        assert_eq!(items[2], input[2]);
    }
}

#[tokio::test]
async fn attached_transcripts_are_not_refetched() {
    let provider = RecordingTranscripts::new(vec![("v2", Reply::Text("fresh"))]);
    let mut first = video("v1");
    if let ContentItem::Video(v) = &mut first {
        v.transcript = Some(Transcript::from_text("v1", "already here"));
    }
    let (items, _) = enrich_all(&provider, vec![first, video("v2")], 2).await;

    assert_eq!(provider.calls().await, vec!["v2".to_string()]);
    assert_eq!(transcript_of(&items[0]).unwrap().text, "already here");
    assert_eq!(transcript_of(&items[1]).unwrap().text, "fresh");
}

#[tokio::test]
async fn empty_input_makes_no_calls() {
    let provider = RecordingTranscripts::default();
    let (items, stats) = enrich_all(&provider, vec![], 4).await;
    assert!(items.is_empty());
    assert_eq!(stats.attempted, 0);
    assert!(provider.calls().await.is_empty());
}

#[tokio::test]
async fn provider_panic_degrades_only_that_video() {
    let provider = RecordingTranscripts::new(vec![
        ("good", Reply::Text("all fine")),
        ("bad", Reply::Panic),
        ("after", Reply::Text("still fine")),
    ]);
    let input = vec![video("good"), video("bad"), video("after")];

    let handle = tokio::spawn(async move { enrich_all(&provider, input, 2).await });
    let (items, stats) = handle.await.expect("enrichment survives a provider panic");

    assert_eq!(items.len(), 3);
    assert!(transcript_of(&items[0]).unwrap().is_available);
    let bad = transcript_of(&items[1]).unwrap();
    assert!(!bad.is_available);
    assert_eq!(bad.text, NO_TRANSCRIPT_TEXT);
    assert_eq!(bad.error_message.as_deref(), Some("transcript provider panicked"));
    assert!(transcript_of(&items[2]).unwrap().is_available);
    assert_eq!((stats.available, stats.degraded), (2, 1));
}

#[tokio::test]
async fn unavailable_ok_reply_is_normalized() {
    let provider = RecordingTranscripts::new(vec![("v1", Reply::Withheld)]);
    let (items, stats) = enrich_all(&provider, vec![video("v1")], 1).await;

    let t = transcript_of(&items[0]).unwrap();
    assert!(!t.is_available);
    assert_eq!(t.text, NO_TRANSCRIPT_TEXT);
    assert_eq!((t.char_count, t.word_count), (0, 0));
    assert_eq!(t.error_message.as_deref(), Some("captions withheld"));
    assert_eq!(stats.degraded, 1);
}
