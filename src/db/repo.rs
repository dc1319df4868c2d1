use super::model::{StoredArticle, StoredVideo};
use crate::model::{ArticleItem, VideoItem};
use anyhow::{Context, Result};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tracing::instrument;

pub type Pool = SqlitePool;

/// Connect to SQLite. In-memory databases get a single connection so every
/// query sees the same database.
pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let normalized = prepare_sqlite_url(database_url);
    let max_connections = if normalized.starts_with("sqlite::memory") { 1 } else { 5 };
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect(&normalized)
        .await
        .with_context(|| format!("failed to open database {normalized}"))?;
    sqlx::query("PRAGMA journal_mode=WAL;").execute(&pool).await?;
    sqlx::query("PRAGMA synchronous=FULL;").execute(&pool).await?;
    Ok(pool)
}

/// For file-backed SQLite URLs, expand a leading `~/`, create the parent
/// directory, and add `mode=rwc` so the file is created on first use.
fn prepare_sqlite_url(url: &str) -> String {
    if !url.starts_with("sqlite:") || url.starts_with("sqlite::memory") {
        return url.to_string();
    }

    let rest = &url["sqlite:".len()..];
    let path_with_query = rest.strip_prefix("//").unwrap_or(rest);
    let (path_part, query_part) = match path_with_query.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path_with_query, None),
    };
    if path_part.is_empty() {
        return url.to_string();
    }

    let expanded = match (path_part.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(tail), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), tail),
        _ => path_part.to_string(),
    };

    if let Some(parent) = std::path::Path::new(&expanded).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    let query = match query_part {
        Some(q) if q.contains("mode=") => q.to_string(),
        Some(q) => format!("{q}&mode=rwc"),
        None => "mode=rwc".to_string(),
    };
    format!("sqlite://{expanded}?{query}")
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Insert a video unless its `video_id` exists. Returns true when a row was
/// written. Transcript text is stored only when available.
#[instrument(skip_all, fields(video_id = %video.video_id))]
pub async fn insert_video_if_absent(pool: &Pool, video: &VideoItem) -> Result<bool> {
    let transcript_text = video
        .transcript
        .as_ref()
        .filter(|t| t.is_available)
        .map(|t| t.text.as_str());
    let res = sqlx::query(
        "INSERT INTO videos (video_id, title, channel_name, channel_id, published_at, link, description, transcript_text) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?) ON CONFLICT (video_id) DO NOTHING",
    )
    .bind(&video.video_id)
    .bind(&video.title)
    .bind(&video.channel_name)
    .bind(&video.channel_id)
    .bind(video.published_at)
    .bind(&video.link)
    .bind(&video.description)
    .bind(transcript_text)
    .execute(pool)
    .await?;
    Ok(res.rows_affected() > 0)
}

/// Insert an article unless its `url` exists. Returns true when a row was
/// written.
#[instrument(skip_all, fields(url = %article.url))]
pub async fn insert_article_if_absent(pool: &Pool, article: &ArticleItem) -> Result<bool> {
    let subjects = serde_json::to_string(&article.subjects)?;
    let res = sqlx::query(
        "INSERT INTO articles (url, title, slug, published_at, summary, subjects, source_type) \
         VALUES (?, ?, ?, ?, ?, ?, ?) ON CONFLICT (url) DO NOTHING",
    )
    .bind(&article.url)
    .bind(&article.title)
    .bind(&article.slug)
    .bind(article.published_at)
    .bind(&article.summary)
    .bind(subjects)
    .bind(&article.source_type)
    .execute(pool)
    .await?;
    Ok(res.rows_affected() > 0)
}

#[instrument(skip_all)]
pub async fn find_video(pool: &Pool, video_id: &str) -> Result<Option<StoredVideo>> {
    let row = sqlx::query_as::<_, StoredVideo>(
        "SELECT id, video_id, title, channel_name, published_at, transcript_text FROM videos WHERE video_id = ?",
    )
    .bind(video_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

#[instrument(skip_all)]
pub async fn find_article(pool: &Pool, url: &str) -> Result<Option<StoredArticle>> {
    let row = sqlx::query_as::<_, StoredArticle>(
        "SELECT id, url, title, slug, subjects FROM articles WHERE url = ?",
    )
    .bind(url)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn count_videos(pool: &Pool) -> Result<i64> {
    Ok(sqlx::query_scalar("SELECT COUNT(*) FROM videos").fetch_one(pool).await?)
}

pub async fn count_articles(pool: &Pool) -> Result<i64> {
    Ok(sqlx::query_scalar("SELECT COUNT(*) FROM articles").fetch_one(pool).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    async fn setup_pool() -> Pool {
        let pool = init_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        pool
    }

    fn article(url: &str) -> ArticleItem {
        ArticleItem {
            url: url.into(),
            title: "Title".into(),
            slug: "title".into(),
            published_at: Utc::now(),
            summary: String::new(),
            subjects: vec!["Alignment".into()],
            source_type: "research".into(),
        }
    }

    #[test]
    fn sqlite_url_normalization() {
        assert_eq!(prepare_sqlite_url("sqlite::memory:"), "sqlite::memory:");
        assert_eq!(prepare_sqlite_url("postgres://x"), "postgres://x");
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join("nested").join("c.db");
        let url = prepare_sqlite_url(&format!("sqlite://{}", path.display()));
        assert_eq!(url, format!("sqlite://{}?mode=rwc", path.display()));
        assert!(path.parent().unwrap().exists());
        let url = prepare_sqlite_url(&format!("sqlite://{}?mode=ro", path.display()));
        assert!(url.ends_with("?mode=ro"));
    }

    #[tokio::test]
    async fn article_insert_is_first_write_wins() {
        let pool = setup_pool().await;
        assert!(insert_article_if_absent(&pool, &article("https://a/1")).await.unwrap());
        let mut changed = article("https://a/1");
        changed.title = "Changed".into();
        assert!(!insert_article_if_absent(&pool, &changed).await.unwrap());

        let stored = find_article(&pool, "https://a/1").await.unwrap().unwrap();
        assert_eq!(stored.title, "Title");
        assert_eq!(stored.subjects, r#"["Alignment"]"#);
        assert_eq!(count_articles(&pool).await.unwrap(), 1);
    }
}
