//! Website summarization: fetch a page, summarize it with the LLM, and write
//! reading files plus a Markdown report per URL.
//!
//! Output layout:
//! ```text
//! {output_dir}/{YYYY-MM-DD}/{host_path}/website_summary_01_01.txt
//! {output_dir}/{YYYY-MM-DD}/{host_path}/website_summary_report.md
//! {output_dir}/{YYYY-MM-DD}/all_summaries/all_websites_summary.md
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Local;
use reqwest::header::USER_AGENT;
use reqwest::Client;
use tracing::{error, info};
use url::Url;

use crate::chunker::split_documents;
use crate::config::{ReadingConfig, SummarizerConfig};
use crate::error::{FetchError, OutputError, WebsiteError};
use crate::http::{build_client, RetryPolicy, BROWSER_USER_AGENT};
use crate::progress::ProgressLogger;
use crate::rate_limiter::TokenRateLimiter;
use crate::reading_files::{
    create_reading_files, ensure_dir, write_summary_report, write_text_file, ReportContext,
    SummarizedItem,
};
use crate::summarizer::{MapReduce, Summarizer};
use crate::text_utils::{clean_text, SummaryLength};

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
const SUBDIR_MAX_CHARS: usize = 50;
pub const REPORT_FILE: &str = "website_summary_report.md";
pub const ALL_SUMMARIES_DIR: &str = "all_summaries";
pub const ALL_SUMMARIES_FILE: &str = "all_websites_summary.md";

#[derive(Debug, Clone)]
pub struct WebsiteResult {
    pub url: String,
    pub summary: String,
    pub summary_file: PathBuf,
    pub created_files: Vec<PathBuf>,
    pub output_dir: PathBuf,
}

/// Reading file layout for website summaries.
pub fn website_reading_options() -> ReadingConfig {
    ReadingConfig {
        split_files: true,
        max_chars_per_file: 100,
        include_metadata: true,
        output_prefix: "website_summary_".into(),
    }
}

/// Directory name for a URL: host dots and path slashes/dots become `_`,
/// cut to 50 chars.
pub fn url_subdir(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default().replace('.', "_");
    let path = url.path().replace(['/', '.'], "_");
    format!("{host}{path}").chars().take(SUBDIR_MAX_CHARS).collect()
}

pub fn today() -> String {
    Local::now().format("%Y-%m-%d").to_string()
}

fn timestamp() -> String {
    Local::now().format("%Y/%m/%d %H:%M:%S").to_string()
}

pub fn render_all_websites_report(results: &[WebsiteResult], generated_at: &str) -> String {
    let url_list = results
        .iter()
        .enumerate()
        .map(|(i, r)| format!("{}. [{}]({})", i + 1, r.url, r.url))
        .collect::<Vec<_>>()
        .join("\n");

    let summaries = results
        .iter()
        .map(|r| {
            format!(
                "### {}\n\n{}\n\n[詳細レポート]({})\n",
                r.url,
                r.summary,
                r.summary_file.display()
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "# 複数ウェブサイト要約レポート\n\n\
         処理日時: {generated_at}\n\n\
         ## 処理したURL一覧\n\n\
         {url_list}\n\n\
         ## 各サイトの要約\n\n\
         {summaries}\n"
    )
}

/// Write `{output_dir}/{date}/all_summaries/all_websites_summary.md`.
pub fn write_all_websites_report(
    results: &[WebsiteResult],
    output_dir: &Path,
    date: &str,
) -> Result<PathBuf, OutputError> {
    let dir = output_dir.join(date).join(ALL_SUMMARIES_DIR);
    ensure_dir(&dir)?;
    let path = dir.join(ALL_SUMMARIES_FILE);
    write_text_file(&path, &render_all_websites_report(results, &timestamp()))?;
    info!("Saved combined report {}", path.display());
    Ok(path)
}

pub struct WebsiteSummarizer<'a, S: Summarizer + ?Sized> {
    llm: &'a S,
    limiter: &'a mut TokenRateLimiter,
    config: &'a SummarizerConfig,
    client: Client,
    retry: RetryPolicy,
}

impl<'a, S: Summarizer + ?Sized> WebsiteSummarizer<'a, S> {
    pub fn new(
        llm: &'a S,
        limiter: &'a mut TokenRateLimiter,
        config: &'a SummarizerConfig,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            llm,
            limiter,
            config,
            client: build_client(FETCH_TIMEOUT)?,
            retry: RetryPolicy::NoRetry,
        })
    }

    /// Fetch raw HTML. Anything but 200 is an error.
    pub async fn fetch_website_content(&self, url: &str) -> Result<String, FetchError> {
        info!("Fetching {url}");
        let http_error = |source| FetchError::Http {
            url: url.to_string(),
            source,
        };

        let resp = self
            .retry
            .send(self.client.get(url).header(USER_AGENT, BROWSER_USER_AGENT))
            .await
            .map_err(http_error)?;
        if resp.status() != reqwest::StatusCode::OK {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: resp.status().as_u16(),
            });
        }
        resp.text().await.map_err(http_error)
    }

    /// Fetch and summarize one URL into `{output_dir}/{today}/{host_path}`.
    pub async fn process_url(
        &mut self,
        url: &str,
        output_dir: &Path,
        length: SummaryLength,
    ) -> Result<WebsiteResult, WebsiteError> {
        let parsed = Url::parse(url).map_err(|source| FetchError::Url {
            url: url.to_string(),
            source,
        })?;
        info!("Summarizing {url} into {} ({length})", output_dir.display());

        let mut progress = ProgressLogger::new(4);
        let html = self.fetch_website_content(url).await?;
        progress.step("fetched page");

        let url_dir = output_dir.join(today()).join(url_subdir(&parsed));
        let result = self
            .summarize_html(url, &html, &url_dir, length, &mut progress)
            .await?;
        progress.complete();
        Ok(result)
    }

    /// Everything after the fetch: clean, split, summarize, write.
    pub async fn summarize_html(
        &mut self,
        url: &str,
        html: &str,
        url_dir: &Path,
        length: SummaryLength,
        progress: &mut ProgressLogger,
    ) -> Result<WebsiteResult, WebsiteError> {
        let text = clean_text(html);
        if text.is_empty() {
            return Err(FetchError::EmptyContent(url.to_string()).into());
        }
        info!("Text length: {} chars", text.chars().count());

        let documents = split_documents(&text, self.config.chunk_size, self.config.chunk_overlap)
            .map_err(OutputError::from)?;
        progress.step("split text");

        let summary = MapReduce::new(self.llm, &mut *self.limiter, self.config.chunk_size)
            .summarize(&documents, length)
            .await?;
        progress.step("summarized");

        let items = [SummarizedItem {
            title: format!("ウェブサイト要約: {url}"),
            summary: summary.clone(),
            source: url.to_string(),
            published_at: timestamp(),
            link: url.to_string(),
        }];

        let created_files = create_reading_files(&items, url_dir, &website_reading_options())?;
        let context = ReportContext {
            heading: "ウェブサイト要約レポート".into(),
            generated_at: timestamp(),
            ..Default::default()
        };
        let summary_file = write_summary_report(&items, url_dir, REPORT_FILE, &context)?;
        progress.step("wrote files");

        Ok(WebsiteResult {
            url: url.to_string(),
            summary,
            summary_file,
            created_files,
            output_dir: url_dir.to_path_buf(),
        })
    }

    /// Process URLs in order. Failed URLs are logged and left out.
    pub async fn process_urls(
        &mut self,
        urls: &[String],
        output_dir: &Path,
        length: SummaryLength,
    ) -> Vec<WebsiteResult> {
        let total = urls.len();
        let mut results = Vec::with_capacity(total);

        for (i, url) in urls.iter().enumerate() {
            info!("[{}/{total}] Processing {url}", i + 1);
            match self.process_url(url, output_dir, length).await {
                Ok(result) => results.push(result),
                Err(e) => error!("Skipping {url}: {e}"),
            }
        }

        info!("{} of {total} websites summarized", results.len());
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SummarizeError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingLlm {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Summarizer for CountingLlm {
        async fn complete(&self, _prompt: &str) -> Result<String, SummarizeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("ページの要約です。二文目です。".into())
        }
    }

    fn result(url: &str, summary: &str) -> WebsiteResult {
        WebsiteResult {
            url: url.into(),
            summary: summary.into(),
            summary_file: PathBuf::from(format!("out/{summary}.md")),
            created_files: vec![],
            output_dir: PathBuf::from("out"),
        }
    }

    #[test]
    fn test_url_subdir() {
        let url = Url::parse("https://www.example.com/news/2024/article.html").unwrap();
        assert_eq!(url_subdir(&url), "www_example_com_news_2024_article_html");

        let root = Url::parse("https://example.com").unwrap();
        assert_eq!(url_subdir(&root), "example_com_");
    }

    #[test]
    fn test_url_subdir_truncated() {
        let long = format!("https://example.com/{}", "a".repeat(100));
        let url = Url::parse(&long).unwrap();
        let subdir = url_subdir(&url);
        assert_eq!(subdir.chars().count(), 50);
        assert!(subdir.starts_with("example_com_aaa"));
    }

    #[test]
    fn test_all_websites_report() {
        let report = render_all_websites_report(
            &[result("https://a.com", "要約A"), result("https://b.com", "要約B")],
            "2024/01/01 09:00:00",
        );

        assert!(report.starts_with("# 複数ウェブサイト要約レポート\n\n処理日時: 2024/01/01 09:00:00\n"));
        assert!(report
            .contains("1. [https://a.com](https://a.com)\n2. [https://b.com](https://b.com)\n"));
        assert!(report.contains("### https://b.com\n\n要約B\n\n[詳細レポート](out/要約B.md)\n"));
    }

    #[test]
    fn test_all_websites_report_location() {
        let dir = tempfile::TempDir::new().unwrap();
        let path =
            write_all_websites_report(&[result("https://a.com", "s")], dir.path(), "2024-01-01")
                .unwrap();
        assert_eq!(
            path,
            dir.path().join("2024-01-01").join("all_summaries").join("all_websites_summary.md")
        );
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_summarize_html_writes_outputs() {
        let dir = tempfile::TempDir::new().unwrap();
        let llm = CountingLlm::default();
        let mut limiter = TokenRateLimiter::with_limits(200, 150_000, Duration::from_secs(60));
        let config = SummarizerConfig::default();
        let mut summarizer = WebsiteSummarizer::new(&llm, &mut limiter, &config).unwrap();
        let url_dir = dir.path().join("example_com_");

        let result = summarizer
            .summarize_html(
                "https://example.com",
                "<html><body><p>本文です。</p></body></html>",
                &url_dir,
                SummaryLength::Short,
                &mut ProgressLogger::new(4),
            )
            .await
            .unwrap();

        assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.summary, "ページの要約です。二文目です。");
        assert_eq!(result.summary_file, url_dir.join(REPORT_FILE));
        assert_eq!(result.created_files, vec![url_dir.join("website_summary_01_01.txt")]);
        let report = std::fs::read_to_string(&result.summary_file).unwrap();
        assert!(report.contains("## 1. ウェブサイト要約: https://example.com"));
    }

    #[tokio::test]
    async fn test_empty_page_is_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let llm = CountingLlm::default();
        let mut limiter = TokenRateLimiter::with_limits(200, 150_000, Duration::from_secs(60));
        let config = SummarizerConfig::default();
        let mut summarizer = WebsiteSummarizer::new(&llm, &mut limiter, &config).unwrap();

        let result = summarizer
            .summarize_html(
                "https://example.com",
                "<script>var a;</script>   ",
                dir.path(),
                SummaryLength::Medium,
                &mut ProgressLogger::new(4),
            )
            .await;

        assert!(matches!(
            result,
            Err(WebsiteError::Fetch(FetchError::EmptyContent(_)))
        ));
        assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invalid_url_is_skipped() {
        let dir = tempfile::TempDir::new().unwrap();
        let llm = CountingLlm::default();
        let mut limiter = TokenRateLimiter::with_limits(200, 150_000, Duration::from_secs(60));
        let config = SummarizerConfig::default();
        let mut summarizer = WebsiteSummarizer::new(&llm, &mut limiter, &config).unwrap();

        let results = summarizer
            .process_urls(&["not a url".into()], dir.path(), SummaryLength::Medium)
            .await;
        assert!(results.is_empty());
    }
}
