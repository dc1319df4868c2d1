//! Configuration loader and validator for the content sources.
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::model::{SourceKind, SourceSpec};

/// Linear retry backoff: the sleep after attempt `n` is `n` steps.
pub const RETRY_BACKOFF_STEP: Duration = Duration::from_millis(500);

static CHANNEL_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^UC[a-zA-Z0-9_-]{22}$").expect("channel id regex"));

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Configuration file not found: {0} (expected config/sources.yaml)")]
    NotFound(PathBuf),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Root configuration struct mirroring the YAML schema.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SourcesConfig {
    pub youtube: YouTube,
    /// Blog aggregators keyed by name, iterated in name order.
    pub blogs: BTreeMap<String, Blog>,
    pub settings: Settings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct YouTube {
    pub channels: Vec<Channel>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Channel {
    pub id: String,
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_channel_results")]
    pub max_results: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Blog {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub sources: Vec<BlogSource>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlogSource {
    #[serde(rename = "type")]
    pub source_type: String,
    pub url: String,
    #[serde(default = "default_blog_results")]
    pub max_results: u32,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Global fetch settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    pub fetch_timeout_seconds: u64,
    pub retry_attempts: u32,
    pub max_concurrent_sources: usize,
    pub max_concurrent_enrichments: usize,
    pub user_interests: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            fetch_timeout_seconds: 30,
            retry_attempts: 3,
            max_concurrent_sources: 4,
            max_concurrent_enrichments: 4,
            user_interests: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_channel_results() -> u32 {
    15
}

fn default_blog_results() -> u32 {
    20
}

impl Settings {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_seconds)
    }

    /// Outer deadline for one source invocation: every attempt may run its
    /// full timeout (plus a second of slack) and sleep its backoff step.
    pub fn source_deadline(&self) -> Duration {
        let attempts = self.retry_attempts.max(1);
        let per_attempt = Duration::from_secs(self.fetch_timeout_seconds + 1);
        per_attempt * attempts + RETRY_BACKOFF_STEP * (attempts * (attempts - 1) / 2)
    }
}

impl SourcesConfig {
    /// One `SourceSpec` per configured YouTube channel, in file order.
    pub fn video_specs(&self) -> Vec<SourceSpec> {
        self.youtube
            .channels
            .iter()
            .map(|ch| SourceSpec {
                kind: SourceKind::VideoChannel,
                id: ch.id.clone(),
                name: ch.name.clone(),
                max_results: ch.max_results as usize,
                enabled: ch.enabled,
                section: None,
            })
            .collect()
    }

    /// One `SourceSpec` per blog source; a source is enabled only if its blog is too.
    pub fn blog_specs(&self) -> Vec<SourceSpec> {
        self.blogs
            .iter()
            .flat_map(|(blog_name, blog)| {
                blog.sources.iter().map(move |src| SourceSpec {
                    kind: SourceKind::BlogAggregator,
                    id: src.url.clone(),
                    name: format!("{}/{}", blog_name, src.source_type),
                    max_results: src.max_results as usize,
                    enabled: blog.enabled && src.enabled,
                    section: Some(src.source_type.clone()),
                })
            })
            .collect()
    }
}

/// Resolve the config path: explicit path, else `config/sources.yaml`,
/// else `sources.yaml` in the working directory.
pub fn resolve_path(path: Option<&Path>) -> PathBuf {
    if let Some(p) = path {
        return p.to_path_buf();
    }
    let primary = Path::new("config").join("sources.yaml");
    if primary.exists() {
        primary
    } else {
        PathBuf::from("sources.yaml")
    }
}

/// Load configuration from a YAML file and validate it.
pub fn load(path: Option<&Path>) -> Result<SourcesConfig, ConfigError> {
    let path = resolve_path(path);
    if !path.exists() {
        return Err(ConfigError::NotFound(path));
    }
    let content = fs::read_to_string(&path)?;
    parse(&content)
}

/// Parse and validate YAML text. An empty document is an empty config.
pub fn parse(content: &str) -> Result<SourcesConfig, ConfigError> {
    let cfg: SourcesConfig = if content.trim().is_empty() {
        SourcesConfig::default()
    } else {
        serde_yaml::from_str(content)?
    };
    let cfg = normalize(cfg);
    validate(&cfg)?;
    Ok(cfg)
}

fn normalize(mut cfg: SourcesConfig) -> SourcesConfig {
    for ch in &mut cfg.youtube.channels {
        ch.id = ch.id.trim().to_string();
        ch.name = ch.name.trim().to_string();
    }
    for blog in cfg.blogs.values_mut() {
        for src in &mut blog.sources {
            src.source_type = src.source_type.trim().to_string();
            src.url = src.url.trim().to_string();
        }
    }
    cfg
}

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(msg.into())
}

/// Validate a configuration instance.
fn validate(cfg: &SourcesConfig) -> Result<(), ConfigError> {
    for (i, ch) in cfg.youtube.channels.iter().enumerate() {
        if !CHANNEL_ID_RE.is_match(&ch.id) {
            return Err(invalid(format!(
                "youtube.channels[{i}].id must be UC followed by 22 characters"
            )));
        }
        let name_len = ch.name.chars().count();
        if name_len == 0 || name_len > 200 {
            return Err(invalid(format!(
                "youtube.channels[{i}].name must be 1..=200 characters"
            )));
        }
        if !(1..=50).contains(&ch.max_results) {
            return Err(invalid(format!(
                "youtube.channels[{i}].max_results must be within 1..=50"
            )));
        }
    }

    for (name, blog) in &cfg.blogs {
        for (i, src) in blog.sources.iter().enumerate() {
            let type_len = src.source_type.chars().count();
            if type_len == 0 || type_len > 50 {
                return Err(invalid(format!(
                    "blogs.{name}.sources[{i}].type must be 1..=50 characters"
                )));
            }
            match reqwest::Url::parse(&src.url) {
                Ok(url) if matches!(url.scheme(), "http" | "https") => {}
                _ => {
                    return Err(invalid(format!(
                        "blogs.{name}.sources[{i}].url must be an http(s) URL"
                    )))
                }
            }
            if !(1..=50).contains(&src.max_results) {
                return Err(invalid(format!(
                    "blogs.{name}.sources[{i}].max_results must be within 1..=50"
                )));
            }
        }
    }

    let s = &cfg.settings;
    if !(1..=300).contains(&s.fetch_timeout_seconds) {
        return Err(invalid("settings.fetch_timeout_seconds must be within 1..=300"));
    }
    if !(1..=10).contains(&s.retry_attempts) {
        return Err(invalid("settings.retry_attempts must be within 1..=10"));
    }
    if !(1..=32).contains(&s.max_concurrent_sources) {
        return Err(invalid("settings.max_concurrent_sources must be within 1..=32"));
    }
    if !(1..=32).contains(&s.max_concurrent_enrichments) {
        return Err(invalid(
            "settings.max_concurrent_enrichments must be within 1..=32",
        ));
    }

    Ok(())
}

/// Example `sources.yaml` content.
pub fn example() -> &'static str {
    r#"youtube:
  channels:
    - id: "UCXZCJLdBC09xxGZ6gcdrc6A"
      name: "OpenAI"
      enabled: true
      max_results: 10
    - id: "UCrDwWp7EBBv4NwvScIpBDOA"
      name: "Anthropic"
      max_results: 15

blogs:
  anthropic:
    enabled: true
    sources:
      - type: research
        url: "https://www.anthropic.com/research"
        max_results: 20
      - type: engineering
        url: "https://www.anthropic.com/engineering"
        max_results: 20

settings:
  fetch_timeout_seconds: 30
  retry_attempts: 3
  max_concurrent_sources: 4
  max_concurrent_enrichments: 4
  user_interests:
    - "agents"
    - "evaluation"
"#
}
