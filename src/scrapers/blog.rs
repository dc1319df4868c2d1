//! Blog listing pages (e.g. a research or engineering index) scraped into
//! articles.
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use tracing::{debug, instrument};

use crate::http::HttpFetcher;
use crate::model::{ArticleItem, ContentItem, SourceSpec};
use crate::source::ContentSource;

static LINK_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").expect("link selector"));
static HEADING_SEL: Lazy<Selector> =
    Lazy::new(|| Selector::parse("h1, h2, h3, h4, h5, h6").expect("heading selector"));
static ANCHOR_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("a").expect("anchor selector"));
static TIME_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("time").expect("time selector"));
static PARA_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("p").expect("paragraph selector"));
static TAG_BOX_SEL: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div[class], span[class], ul[class]").expect("tag container selector"));
static TAG_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("span, a, li").expect("tag selector"));

const DATE_FORMATS: [&str; 4] = ["%B %d, %Y", "%b %d, %Y", "%Y-%m-%d", "%m/%d/%Y"];

#[derive(Debug, Clone)]
pub struct BlogScraper {
    http: HttpFetcher,
}

impl BlogScraper {
    pub fn new(http: HttpFetcher) -> Self {
        Self { http }
    }

    #[instrument(skip(self))]
    pub async fn fetch_articles(&self, url: &str, source_type: &str, max_results: usize) -> Result<Vec<ArticleItem>> {
        let html = self.http.get_text(url).await?;
        let mut articles = parse_listing(&html, url, source_type)
            .with_context(|| format!("Error fetching {source_type} articles"))?;
        articles.truncate(max_results);
        Ok(articles)
    }
}

#[async_trait]
impl ContentSource for BlogScraper {
    async fn fetch(&self, spec: &SourceSpec) -> Result<Vec<ContentItem>> {
        let section = spec.section.as_deref().unwrap_or("blog");
        let articles = self.fetch_articles(&spec.id, section, spec.max_results).await?;
        Ok(articles.into_iter().map(ContentItem::Article).collect())
    }
}

fn clean_text(el: ElementRef<'_>) -> String {
    el.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

fn nearest_div(el: ElementRef<'_>) -> Option<ElementRef<'_>> {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|a| a.value().name() == "div")
}

/// Parse a `<time>` value: RFC 3339 first, then common display formats.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.contains('T') {
        if let Ok(dt) = DateTime::parse_from_rfc3339(&raw.replace('Z', "+00:00")) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

fn slug_of(url: &Url) -> String {
    url.path_segments()
        .and_then(|segs| segs.filter(|s| !s.is_empty()).last())
        .unwrap_or_default()
        .to_string()
}

fn extract_title(link: ElementRef<'_>, parent: ElementRef<'_>, href: &str) -> Option<String> {
    let containing = parent.select(&HEADING_SEL).find(|h| {
        h.select(&ANCHOR_SEL)
            .any(|a| a.id() == link.id() || a.value().attr("href") == Some(href))
    });
    if let Some(heading) = containing {
        return Some(clean_text(heading));
    }

    let text = clean_text(link);
    let len = text.chars().count();
    if len > 100 {
        Some(parent.select(&HEADING_SEL).next().map(clean_text).unwrap_or(text))
    } else if len < 5 {
        None
    } else {
        Some(text)
    }
}

fn extract_date(parent: ElementRef<'_>) -> Option<DateTime<Utc>> {
    let time = parent
        .select(&TIME_SEL)
        .next()
        .or_else(|| nearest_div(parent).and_then(|outer| outer.select(&TIME_SEL).next()))?;
    let raw = time
        .value()
        .attr("datetime")
        .map(str::to_string)
        .unwrap_or_else(|| clean_text(time));
    parse_date(&raw)
}

fn extract_subjects(parent: ElementRef<'_>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut subjects = Vec::new();
    for container in parent.select(&TAG_BOX_SEL) {
        let class = container.value().attr("class").unwrap_or_default().to_lowercase();
        if !(class.contains("tag") || class.contains("category") || class.contains("label")) {
            continue;
        }
        for tag in container.select(&TAG_SEL) {
            let text = clean_text(tag);
            if text.is_empty() || text.chars().count() >= 50 {
                continue;
            }
            if seen.insert(text.to_lowercase()) {
                subjects.push(text);
            }
        }
    }
    subjects
}

/// Extract article cards from a listing page. Article links are anchors whose
/// path contains `/<source_type>/`; team pages are ignored.
pub fn parse_listing(html: &str, page_url: &str, source_type: &str) -> Result<Vec<ArticleItem>> {
    let base = Url::parse(page_url).with_context(|| format!("invalid listing URL {page_url}"))?;
    let marker = format!("/{source_type}/");
    let doc = Html::parse_document(html);
    let now = Utc::now();

    let mut seen = HashSet::new();
    let mut articles = Vec::new();
    for link in doc.select(&LINK_SEL) {
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        if !href.contains(&marker) || href.contains("/team/") {
            continue;
        }
        let Ok(url) = base.join(href) else {
            debug!(href, "skipping unresolvable link");
            continue;
        };
        if !seen.insert(url.to_string()) {
            continue;
        }
        let Some(parent) = nearest_div(link) else {
            continue;
        };
        let Some(title) = extract_title(link, parent, href) else {
            continue;
        };

        let summary = parent
            .select(&PARA_SEL)
            .map(clean_text)
            .find(|t| t.chars().count() > 20)
            .unwrap_or_default();

        articles.push(ArticleItem {
            slug: slug_of(&url),
            url: url.to_string(),
            title,
            published_at: extract_date(parent).unwrap_or(now),
            summary,
            subjects: extract_subjects(parent),
            source_type: source_type.to_string(),
        });
    }
    Ok(articles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const PAGE: &str = r#"<html><body>
<div class="grid">
  <div class="card">
    <a href="/research/constitutional-classifiers"><h3>Constitutional Classifiers</h3></a>
    <time datetime="2025-02-03T00:00:00Z">Feb 3, 2025</time>
    <p>short</p>
    <p>A new method for defending models against jailbreaks.</p>
    <div class="tags"><span>Alignment</span><span>alignment</span><span>Safety</span></div>
  </div>
  <div class="card">
    <a href="/research/constitutional-classifiers">Read more</a>
  </div>
  <div class="card">
    <a href="https://www.anthropic.com/research/tracing-thoughts">Tracing the thoughts of a model</a>
    <time>March 27, 2025</time>
  </div>
  <div class="card"><a href="/research/team/interpretability">Interpretability team</a></div>
  <div class="card"><a href="/news/unrelated">Unrelated news item</a></div>
  <div class="card"><a href="/research/x">Hi</a></div>
</div>
</body></html>"#;

    #[test]
    fn extracts_cards_with_dedup_and_filters() {
        let articles = parse_listing(PAGE, "https://www.anthropic.com/research", "research").unwrap();
        assert_eq!(articles.len(), 2);

        let first = &articles[0];
        assert_eq!(first.url, "https://www.anthropic.com/research/constitutional-classifiers");
        assert_eq!(first.slug, "constitutional-classifiers");
        assert_eq!(first.title, "Constitutional Classifiers");
        assert_eq!(first.published_at, Utc.with_ymd_and_hms(2025, 2, 3, 0, 0, 0).unwrap());
        assert_eq!(first.summary, "A new method for defending models against jailbreaks.");
        assert_eq!(first.subjects, vec!["Alignment", "Safety"]);
        assert_eq!(first.source_type, "research");

        let second = &articles[1];
        assert_eq!(second.title, "Tracing the thoughts of a model");
        assert_eq!(second.published_at, Utc.with_ymd_and_hms(2025, 3, 27, 0, 0, 0).unwrap());
        assert!(second.subjects.is_empty());
    }

    #[test]
    fn date_formats() {
        let d = |y, m, day| Utc.with_ymd_and_hms(y, m, day, 0, 0, 0).unwrap();
        assert_eq!(parse_date("Jan 15, 2024"), Some(d(2024, 1, 15)));
        assert_eq!(parse_date("January 15, 2024"), Some(d(2024, 1, 15)));
        assert_eq!(parse_date("2024-01-15"), Some(d(2024, 1, 15)));
        assert_eq!(parse_date("01/15/2024"), Some(d(2024, 1, 15)));
        assert_eq!(parse_date("2024-01-15T00:00:00Z"), Some(d(2024, 1, 15)));
        assert_eq!(parse_date("soon"), None);
    }
}
