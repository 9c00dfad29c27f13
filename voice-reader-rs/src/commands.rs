//! Subcommand handlers. Each one builds its collaborators from the loaded
//! config and runs one pipeline to the end.

use std::error::Error;
use std::path::{Path, PathBuf};

use chrono::Local;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

use crate::batch::{BatchOutcome, BatchState};
use crate::config::Config;
use crate::error::ConfigError;
use crate::news::NewsProcessor;
use crate::player::RodioPlayer;
use crate::rate_limiter::TokenRateLimiter;
use crate::reader::{multi_directory_items, Reader};
use crate::reading_files::{create_reading_files, write_summary_report, ReportContext};
use crate::summarizer::OpenAiSummarizer;
use crate::text_utils::SummaryLength;
use crate::voicevox::VoicevoxClient;
use crate::website::{today, write_all_websites_report, WebsiteResult, WebsiteSummarizer};

type CommandResult<T = ()> = Result<T, Box<dyn Error>>;

fn log_outcome(outcome: &BatchOutcome) {
    for failure in &outcome.generation_failures {
        warn!("Not generated: {} ({})", failure.label, failure.message);
    }
    for failure in &outcome.playback_failures {
        warn!("Not played: {} ({})", failure.label, failure.message);
    }
    match outcome.playback {
        BatchState::NothingGenerated => warn!("No audio was generated"),
        BatchState::PlaybackSkipped => info!(
            "{} audio files saved, playback disabled",
            outcome.artifacts.len()
        ),
        _ => info!("Read {} items", outcome.artifacts.len()),
    }
}

async fn confirm(question: &str) -> bool {
    println!("{question} (y/n)");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    match lines.next_line().await {
        Ok(Some(answer)) => matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"),
        _ => false,
    }
}

pub async fn say(config: &Config, text: &str) -> CommandResult {
    let tts = VoicevoxClient::new(&config.api, &config.output)?;
    let player = RodioPlayer::new();
    let outcome = Reader::new(config, &tts, &player).read_text(text).await;
    log_outcome(&outcome);
    Ok(())
}

pub async fn read(config: &Config, path: &Path) -> CommandResult {
    let tts = VoicevoxClient::new(&config.api, &config.output)?;
    let player = RodioPlayer::new();
    let tool_root = std::env::current_dir()?;

    let outcome = Reader::new(config, &tts, &player)
        .read_path(path, &tool_root)
        .await?;
    log_outcome(&outcome);
    Ok(())
}

/// Fetch, filter and digest news, then write reading files and the report.
///
/// Returns the output directory, or `None` when nothing matched.
pub async fn news_fetch(config: &Config) -> CommandResult<Option<PathBuf>> {
    let processor = NewsProcessor::new(&config.news)?;
    info!(
        "Fetching {} feeds (language: {})",
        config.news.rss_feeds.len(),
        config.news.language
    );

    let all_news = processor.fetch_all_news().await;
    if all_news.is_empty() {
        info!("No news found");
        return Ok(None);
    }
    info!("Fetched {} articles", all_news.len());

    let items = processor.filter_and_summarize(all_news);
    if items.is_empty() {
        info!("No articles matched the keywords");
        return Ok(None);
    }
    info!("{} articles matched", items.len());

    let output_dir = PathBuf::from(&config.news.output_dir);
    let created = create_reading_files(&items, &output_dir, &config.news.reading)?;

    let context = ReportContext {
        heading: "ニュース要約レポート".into(),
        generated_at: Local::now().format("%Y/%m/%d %H:%M:%S").to_string(),
        keywords: config.news.keywords.clone(),
        feed_count: config.news.rss_feeds.len(),
    };
    write_summary_report(&items, &output_dir, &config.news.output_file, &context)?;
    info!("Created {} reading files in {}", created.len(), output_dir.display());

    Ok(Some(output_dir))
}

pub async fn news(config: &Config, assume_yes: bool) -> CommandResult {
    let Some(output_dir) = news_fetch(config).await? else {
        return Ok(());
    };

    if !assume_yes && !confirm("Read these files aloud?").await {
        info!("Skipping playback");
        return Ok(());
    }

    let tts = VoicevoxClient::new(&config.api, &config.output)?;
    let player = RodioPlayer::new();
    let outcome = Reader::new(config, &tts, &player)
        .read_directory(&output_dir, None)
        .await?;
    log_outcome(&outcome);
    Ok(())
}

async fn summarize_configured_urls(
    config: &Config,
    output_dir: &Path,
    length: SummaryLength,
) -> CommandResult<Vec<WebsiteResult>> {
    if config.websites.urls.is_empty() {
        return Err(ConfigError::Missing("websites.urls").into());
    }

    let llm = OpenAiSummarizer::from_env(&config.summarizer)?;
    let mut limiter = TokenRateLimiter::new(&config.rate_limit);
    let mut summarizer = WebsiteSummarizer::new(&llm, &mut limiter, &config.summarizer)?;

    Ok(summarizer
        .process_urls(&config.websites.urls, output_dir, length)
        .await)
}

/// Summarize one URL, or every configured URL plus a combined report.
pub async fn website(
    config: &Config,
    url: Option<&str>,
    output: Option<&Path>,
    length: Option<SummaryLength>,
) -> CommandResult {
    let output_dir = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(&config.websites.output_dir));
    let length = length.unwrap_or_else(|| config.websites.length());

    if let Some(url) = url {
        let llm = OpenAiSummarizer::from_env(&config.summarizer)?;
        let mut limiter = TokenRateLimiter::new(&config.rate_limit);
        let mut summarizer = WebsiteSummarizer::new(&llm, &mut limiter, &config.summarizer)?;

        let result = summarizer.process_url(url, &output_dir, length).await?;
        info!(
            "Report: {} ({} reading files)",
            result.summary_file.display(),
            result.created_files.len()
        );
        println!("{}", result.summary);
        return Ok(());
    }

    let results = summarize_configured_urls(config, &output_dir, length).await?;
    let report = write_all_websites_report(&results, &output_dir, &today())?;
    info!("Combined report: {}", report.display());
    Ok(())
}

/// Summarize configured URLs, then read every result directory in one batch.
pub async fn website_read(config: &Config) -> CommandResult {
    let output_dir = PathBuf::from(&config.websites.output_dir);
    let results = summarize_configured_urls(config, &output_dir, config.websites.length()).await?;
    if results.is_empty() {
        warn!("No website was summarized");
        return Ok(());
    }

    let dirs: Vec<PathBuf> = results.iter().map(|r| r.output_dir.clone()).collect();
    let items = multi_directory_items(&dirs, "website");

    let tts = VoicevoxClient::new(&config.api, &config.output)?;
    let player = RodioPlayer::new();
    let outcome = Reader::new(config, &tts, &player).read_items(&items).await;
    log_outcome(&outcome);
    Ok(())
}

/// News first, then websites. A news failure does not stop the website run.
pub async fn all(config: &Config) -> CommandResult {
    if let Err(e) = news(config, true).await {
        error!("News reading failed: {e}");
    }
    website_read(config).await
}

pub async fn speakers(config: &Config) -> CommandResult {
    let tts = VoicevoxClient::new(&config.api, &config.output)?;
    for speaker in tts.speakers().await {
        let marker = if speaker.id == config.speaker.default_id {
            " (default)"
        } else {
            ""
        };
        println!("{:>3}: {}{marker}", speaker.id, speaker.name);
    }
    Ok(())
}
