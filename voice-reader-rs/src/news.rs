//! RSS news collection: fetch, keyword filter, de-duplicate, digest.

use std::collections::HashSet;
use std::time::Duration;

use reqwest::Client;
use tracing::{info, warn};

use crate::chunker::summarize_excerpt;
use crate::config::NewsConfig;
use crate::error::FetchError;
use crate::http::{build_client, RetryPolicy};
use crate::reading_files::SummarizedItem;

const FEED_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub title: String,
    pub description: String,
    pub content: String,
    pub link: String,
    pub pub_date: String,
    pub source: String,
}

/// Parse an RSS document into articles in feed order.
pub fn parse_feed(bytes: &[u8], url: &str) -> Result<Vec<Article>, FetchError> {
    let channel = rss::Channel::read_from(bytes).map_err(|source| FetchError::Feed {
        url: url.to_string(),
        source,
    })?;

    let source = match channel.title().trim() {
        "" => "Unknown".to_string(),
        title => title.to_string(),
    };

    Ok(channel
        .items()
        .iter()
        .map(|item| {
            let description = item.description().unwrap_or_default().to_string();
            let content = item
                .content()
                .map(str::to_string)
                .unwrap_or_else(|| description.clone());
            Article {
                title: item.title().unwrap_or_default().to_string(),
                description,
                content,
                link: item.link().unwrap_or_default().to_string(),
                pub_date: item.pub_date().unwrap_or_default().to_string(),
                source: source.clone(),
            }
        })
        .collect())
}

/// Case-insensitive match of any keyword. No keywords matches everything.
pub fn contains_keywords(text: &str, keywords: &[String]) -> bool {
    if keywords.is_empty() {
        return true;
    }
    let lower = text.to_lowercase();
    keywords
        .iter()
        .any(|keyword| lower.contains(&keyword.to_lowercase()))
}

pub struct NewsProcessor<'a> {
    config: &'a NewsConfig,
    client: Client,
    retry: RetryPolicy,
}

impl<'a> NewsProcessor<'a> {
    pub fn new(config: &'a NewsConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            config,
            client: build_client(FEED_TIMEOUT)?,
            retry: RetryPolicy::NoRetry,
        })
    }

    pub async fn fetch_feed(&self, url: &str) -> Result<Vec<Article>, FetchError> {
        let http_error = |source| FetchError::Http {
            url: url.to_string(),
            source,
        };

        let resp = self
            .retry
            .send(self.client.get(url))
            .await
            .map_err(http_error)?;
        if !resp.status().is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: resp.status().as_u16(),
            });
        }
        let bytes = resp.bytes().await.map_err(http_error)?;
        parse_feed(&bytes, url)
    }

    /// Fetch one feed. A failing feed contributes no articles.
    pub async fn fetch_news_from_rss(&self, url: &str) -> Vec<Article> {
        info!("Fetching RSS feed {url}");
        match self.fetch_feed(url).await {
            Ok(articles) => articles,
            Err(e) => {
                warn!("Skipping feed: {e}");
                Vec::new()
            }
        }
    }

    /// Fetch every configured feed in order.
    pub async fn fetch_all_news(&self) -> Vec<Article> {
        if self.config.rss_feeds.is_empty() {
            warn!("No RSS feeds configured");
            return Vec::new();
        }

        let mut all_news = Vec::new();
        for url in &self.config.rss_feeds {
            all_news.extend(self.fetch_news_from_rss(url).await);
        }
        all_news
    }

    /// Keep keyword matches, drop repeated titles, cap the count and digest each.
    pub fn filter_and_summarize(&self, articles: Vec<Article>) -> Vec<SummarizedItem> {
        let mut seen = HashSet::new();

        articles
            .into_iter()
            .filter(|a| {
                let search_text = format!("{} {} {}", a.title, a.description, a.content);
                contains_keywords(&search_text, &self.config.keywords)
            })
            .filter(|a| seen.insert(a.title.clone()))
            .take(self.config.max_articles)
            .map(|a| {
                let body = if a.content.is_empty() {
                    &a.description
                } else {
                    &a.content
                };
                SummarizedItem {
                    summary: summarize_excerpt(body, self.config.summary_length),
                    title: a.title,
                    source: a.source,
                    published_at: a.pub_date,
                    link: a.link,
                }
            })
            .collect()
    }
}
