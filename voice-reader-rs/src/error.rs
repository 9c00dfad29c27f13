//! Error types for each failure domain.
//!
//! Config errors are fatal before any batch starts. Everything else is
//! reported per item by the caller and the batch moves on.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid config value `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("Missing required setting: {0}")]
    Missing(&'static str),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChunkError {
    #[error("max_length must be greater than zero")]
    InvalidMaxLength,
}

#[derive(Error, Debug)]
pub enum TtsError {
    #[error("Cannot connect to VOICEVOX at {url}. Is the engine running? (https://voicevox.hiroshiba.jp/)")]
    Unreachable { url: String },

    #[error("VOICEVOX request timed out")]
    Timeout,

    #[error("VOICEVOX returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("VOICEVOX request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to write audio file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid VOICEVOX URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Nothing to synthesize: {0}")]
    EmptyText(String),
}

#[derive(Error, Debug)]
pub enum SummarizeError {
    #[error("Summarizer API key is not set (OPENAI_API_KEY)")]
    MissingApiKey,

    #[error("Summarizer request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Summarizer returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Summarizer returned an empty response")]
    Empty,

    #[error("Nothing to summarize")]
    NoInput,
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Request to {url} failed: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Failed to parse feed {url}: {source}")]
    Feed { url: String, source: rss::Error },

    #[error("No readable text found at {0}")]
    EmptyContent(String),

    #[error("Invalid URL {url}: {source}")]
    Url {
        url: String,
        source: url::ParseError,
    },
}

#[derive(Error, Debug)]
pub enum PlaybackError {
    #[error("Failed to open audio output: {0}")]
    Output(String),

    #[error("Failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to decode {path}: {reason}")]
    Decode { path: PathBuf, reason: String },

    #[error("Playback task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to read directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to remove {path}: {source}")]
    Remove {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Chunk(#[from] ChunkError),
}

/// Failure of a whole website item: fetch, summarize or write.
#[derive(Error, Debug)]
pub enum WebsiteError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Summarize(#[from] SummarizeError),

    #[error(transparent)]
    Output(#[from] OutputError),
}
