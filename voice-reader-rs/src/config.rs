//! Configuration management for voice-reader-rs.
//!
//! Loads `config.json` (or a YAML file when the path ends in .yaml/.yml).
//! Every section falls back to its defaults field by field, so a partial
//! file only overrides what it names.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::ConfigError;
use crate::text_utils::SummaryLength;

const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub url: String,
    /// Per-request timeout in milliseconds.
    pub timeout: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:50021".into(),
            timeout: 10_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeakerConfig {
    pub default_id: u32,
    pub name: String,
}

impl Default for SpeakerConfig {
    fn default() -> Self {
        Self {
            default_id: 0,
            name: "四国めたん（ノーマル）".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: String,
    pub filename: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: "output".into(),
            filename: "output.wav".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub auto_play: bool,
    /// Pause between batch items in milliseconds.
    pub delay_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            auto_play: true,
            delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadingConfig {
    pub split_files: bool,
    pub max_chars_per_file: usize,
    pub include_metadata: bool,
    pub output_prefix: String,
}

impl Default for ReadingConfig {
    fn default() -> Self {
        Self {
            split_files: true,
            max_chars_per_file: 300,
            include_metadata: false,
            output_prefix: "news_reading_".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NewsConfig {
    pub keywords: Vec<String>,
    pub max_articles: usize,
    /// Digest length in characters.
    pub summary_length: usize,
    pub output_file: String,
    pub output_dir: String,
    pub language: String,
    pub rss_feeds: Vec<String>,
    pub reading: ReadingConfig,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            keywords: vec!["AI".into(), "人工知能".into(), "テクノロジー".into()],
            max_articles: 5,
            summary_length: 200,
            output_file: "news_summary.txt".into(),
            output_dir: "news_output".into(),
            language: "ja".into(),
            rss_feeds: vec![
                "https://news.yahoo.co.jp/rss/topics/it.xml".into(),
                "https://feeds.feedburner.com/itmedia/news".into(),
                "https://rss.cnn.com/rss/edition.rss".into(),
                "https://feeds.bbci.co.uk/news/technology/rss.xml".into(),
            ],
            reading: ReadingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebsitesConfig {
    pub urls: Vec<String>,
    pub output_dir: String,
    /// short | medium | long | <chars>
    pub summary_length: String,
}

impl Default for WebsitesConfig {
    fn default() -> Self {
        Self {
            urls: vec![],
            output_dir: "website_summaries".into(),
            summary_length: "medium".into(),
        }
    }
}

impl WebsitesConfig {
    pub fn length(&self) -> SummaryLength {
        self.summary_length.parse().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizerConfig {
    /// OpenAI-compatible base URL. `OPENAI_API_URL` overrides it.
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
    /// Characters per document sent to the map step.
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".into(),
            model: "gpt-4o-mini".into(),
            temperature: 0.1,
            timeout_secs: 120,
            chunk_size: 30_000,
            chunk_overlap: 1_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub max_requests: usize,
    pub max_tokens: u64,
    pub window_ms: u64,
    /// Extra wait added on top of the computed window wait.
    pub guard_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 200,
            max_tokens: 150_000,
            window_ms: 60_000,
            guard_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub speaker: SpeakerConfig,
    pub output: OutputConfig,
    pub playback: PlaybackConfig,
    pub news: NewsConfig,
    pub websites: WebsitesConfig,
    pub summarizer: SummarizerConfig,
    pub rate_limit: RateLimitConfig,
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml" | "yml")
    )
}

impl Config {
    /// Load configuration and validate it.
    ///
    /// Searches standard locations if no path is provided:
    /// 1. ./config.json
    /// 2. ~/.config/voice-reader/config.json
    ///
    /// A missing file is created with the defaults. A file that fails to
    /// parse is left alone and the defaults are used for this run.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config_path = path.map(PathBuf::from).unwrap_or_else(|| {
            let candidates = [
                std::env::current_dir().ok().map(|d| d.join(CONFIG_FILE_NAME)),
                dirs::config_dir().map(|c| c.join("voice-reader").join(CONFIG_FILE_NAME)),
            ];
            candidates
                .iter()
                .flatten()
                .find(|p| p.exists())
                .cloned()
                .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
        });

        let config = if config_path.exists() {
            Self::read_or_default(&config_path)
        } else {
            info!("No config file found, using defaults");
            let config = Self::default();
            config.save(&config_path);
            config
        };

        config.validate()?;
        Ok(config)
    }

    fn read_or_default(path: &Path) -> Self {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                warn!("Failed to read {}: {e}, using defaults", path.display());
                return Self::default();
            }
        };

        let parsed = if is_yaml(path) {
            serde_yml::from_str(&contents).map_err(|e| e.to_string())
        } else {
            serde_json::from_str(&contents).map_err(|e| e.to_string())
        };

        match parsed {
            Ok(config) => {
                info!("Loaded config from {}", path.display());
                config
            }
            Err(e) => {
                warn!("Failed to parse {}: {e}, using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Write this config to `path`. Failures are logged, not returned.
    pub fn save(&self, path: &Path) {
        let serialized = if is_yaml(path) {
            serde_yml::to_string(self).map_err(|e| e.to_string())
        } else {
            serde_json::to_string_pretty(self).map_err(|e| e.to_string())
        };

        let contents = match serialized {
            Ok(c) => c,
            Err(e) => {
                warn!("Failed to serialize config: {e}");
                return;
            }
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!("Failed to create {}: {e}", parent.display());
                return;
            }
        }

        match std::fs::write(path, contents) {
            Ok(()) => info!("Created config file {}", path.display()),
            Err(e) => warn!("Failed to write config {}: {e}", path.display()),
        }
    }

    /// Reject values that would make a batch fail later.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
            ConfigError::Invalid {
                field,
                reason: reason.into(),
            }
        }

        if self.api.url.trim().is_empty() {
            return Err(ConfigError::Missing("api.url"));
        }
        url::Url::parse(&self.api.url).map_err(|e| invalid("api.url", e.to_string()))?;
        if self.api.timeout == 0 {
            return Err(invalid("api.timeout", "must be greater than zero"));
        }
        if self.news.reading.max_chars_per_file == 0 {
            return Err(invalid("news.reading.max_chars_per_file", "must be greater than zero"));
        }
        if self.news.summary_length == 0 {
            return Err(invalid("news.summary_length", "must be greater than zero"));
        }
        if let Err(e) = self.websites.summary_length.parse::<SummaryLength>() {
            return Err(invalid("websites.summary_length", e));
        }
        if self.summarizer.chunk_size == 0 {
            return Err(invalid("summarizer.chunk_size", "must be greater than zero"));
        }
        if self.rate_limit.max_requests == 0 {
            return Err(invalid("rate_limit.max_requests", "must be greater than zero"));
        }
        if self.rate_limit.max_tokens == 0 {
            return Err(invalid("rate_limit.max_tokens", "must be greater than zero"));
        }
        if self.rate_limit.window_ms == 0 {
            return Err(invalid("rate_limit.window_ms", "must be greater than zero"));
        }
        Ok(())
    }
}
