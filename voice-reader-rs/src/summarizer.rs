//! LLM summarization over an OpenAI-compatible chat completions API.
//!
//! Long text is summarized map-reduce style: each document gets its own
//! summary, then the partial summaries are combined into one. Every call
//! waits on the token rate limiter first.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::SummarizerConfig;
use crate::error::SummarizeError;
use crate::http::RetryPolicy;
use crate::rate_limiter::TokenRateLimiter;
use crate::text_utils::SummaryLength;

const API_KEY_ENV: &str = "OPENAI_API_KEY";
const API_URL_ENV: &str = "OPENAI_API_URL";

/// Sends one prompt and returns the model's reply.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, SummarizeError>;
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

pub struct OpenAiSummarizer {
    base_url: String,
    model: String,
    temperature: f32,
    client: Client,
    retry: RetryPolicy,
}

impl OpenAiSummarizer {
    pub fn new(config: &SummarizerConfig, api_key: &str) -> Result<Self, SummarizeError> {
        if api_key.trim().is_empty() {
            return Err(SummarizeError::MissingApiKey);
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let bearer = HeaderValue::from_str(&format!("Bearer {}", api_key.trim()))
            .map_err(|_| SummarizeError::MissingApiKey)?;
        headers.insert(AUTHORIZATION, bearer);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            client,
            retry: RetryPolicy::NoRetry,
        })
    }

    /// Build from `OPENAI_API_KEY`, with `OPENAI_API_URL` overriding the base URL.
    pub fn from_env(config: &SummarizerConfig) -> Result<Self, SummarizeError> {
        let api_key = std::env::var(API_KEY_ENV).map_err(|_| SummarizeError::MissingApiKey)?;

        let mut config = config.clone();
        if let Ok(url) = std::env::var(API_URL_ENV) {
            let url = url.trim();
            if !url.is_empty() {
                debug!("Using summarizer base URL from {API_URL_ENV}: {url}");
                config.base_url = url.to_string();
            }
        }

        Self::new(&config, &api_key)
    }
}

#[async_trait]
impl Summarizer for OpenAiSummarizer {
    async fn complete(&self, prompt: &str) -> Result<String, SummarizeError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
        };

        let t_start = Instant::now();
        let resp = self.retry.send(self.client.post(&url).json(&body)).await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SummarizeError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatCompletionResponse = resp.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .unwrap_or_default();

        if content.is_empty() {
            return Err(SummarizeError::Empty);
        }

        debug!(
            "Completion: {} chars → {} chars ({:.0}ms)",
            prompt.chars().count(),
            content.chars().count(),
            t_start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(content)
    }
}

pub fn map_prompt(length: SummaryLength, text: &str) -> String {
    format!("{}\n\nテキスト: {text}\n\n要約:", length.instruction())
}

pub fn combine_prompt(length: SummaryLength, summaries: &[String]) -> String {
    format!(
        "{}\n\n要約リスト:\n{}\n\n最終要約:",
        length.instruction(),
        summaries.join("\n\n")
    )
}

/// Estimated token cost of one call over a `chunk_size`-char document.
pub fn estimated_tokens(chunk_size: usize) -> u64 {
    chunk_size.div_ceil(4) as u64
}

/// Map-reduce summarization of ordered documents.
pub struct MapReduce<'a, S: Summarizer + ?Sized> {
    llm: &'a S,
    limiter: &'a mut TokenRateLimiter,
    tokens_per_call: u64,
}

impl<'a, S: Summarizer + ?Sized> MapReduce<'a, S> {
    pub fn new(llm: &'a S, limiter: &'a mut TokenRateLimiter, chunk_size: usize) -> Self {
        Self {
            llm,
            limiter,
            tokens_per_call: estimated_tokens(chunk_size),
        }
    }

    async fn call(&mut self, prompt: &str) -> Result<String, SummarizeError> {
        let waited = self.limiter.wait_if_needed(self.tokens_per_call).await;
        if !waited.is_zero() {
            info!("Rate limit: waited {:.1}s", waited.as_secs_f64());
        }
        let (requests, tokens) = self.limiter.usage();
        debug!("Rate window: {requests} requests, {tokens} tokens");
        self.llm.complete(prompt).await
    }

    /// One summary for all of `documents`.
    ///
    /// A single document is summarized in one call. Otherwise each document
    /// is summarized in order and the partial summaries are combined.
    pub async fn summarize(
        &mut self,
        documents: &[String],
        length: SummaryLength,
    ) -> Result<String, SummarizeError> {
        match documents {
            [] => Err(SummarizeError::NoInput),
            [only] => self.call(&map_prompt(length, only)).await,
            _ => {
                let total = documents.len();
                info!("Summarizing {total} documents ({} requests)", total + 1);

                let mut partials = Vec::with_capacity(total);
                for (i, document) in documents.iter().enumerate() {
                    info!("Summarizing chunk {}/{total}", i + 1);
                    partials.push(self.call(&map_prompt(length, document)).await?);
                }

                info!("Combining {total} partial summaries");
                self.call(&combine_prompt(length, &partials)).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeLlm {
        prompts: Mutex<Vec<String>>,
        fail_after: Option<usize>,
    }

    #[async_trait]
    impl Summarizer for FakeLlm {
        async fn complete(&self, prompt: &str) -> Result<String, SummarizeError> {
            let mut prompts = self.prompts.lock().unwrap();
            prompts.push(prompt.to_string());
            if self.fail_after.is_some_and(|n| prompts.len() > n) {
                return Err(SummarizeError::Empty);
            }
            Ok(format!("summary{}", prompts.len()))
        }
    }

    fn limiter() -> TokenRateLimiter {
        TokenRateLimiter::with_limits(200, 150_000, Duration::from_secs(60))
    }

    #[test]
    fn test_estimated_tokens_rounds_up() {
        assert_eq!(estimated_tokens(30_000), 7_500);
        assert_eq!(estimated_tokens(10), 3);
    }

    #[test]
    fn test_prompt_layout() {
        let map = map_prompt(SummaryLength::Short, "本文");
        assert!(map.starts_with("簡潔に2-3文で要約してください。"));
        assert!(map.ends_with("\n\nテキスト: 本文\n\n要約:"));

        let combine = combine_prompt(SummaryLength::Chars(100), &["a".into(), "b".into()]);
        assert!(combine.starts_with("約100文字程度で要約してください。"));
        assert!(combine.ends_with("\n\n要約リスト:\na\n\nb\n\n最終要約:"));
    }

    #[tokio::test]
    async fn test_single_document_is_one_call() {
        let llm = FakeLlm::default();
        let mut limiter = limiter();

        let summary = MapReduce::new(&llm, &mut limiter, 30_000)
            .summarize(&["only".into()], SummaryLength::Medium)
            .await
            .unwrap();

        assert_eq!(summary, "summary1");
        assert_eq!(llm.prompts.lock().unwrap().len(), 1);
        assert_eq!(limiter.usage(), (1, 7_500));
    }

    #[tokio::test]
    async fn test_map_then_reduce_in_order() {
        let llm = FakeLlm::default();
        let mut limiter = limiter();
        let docs = vec!["one".to_string(), "two".into(), "three".into()];

        let summary = MapReduce::new(&llm, &mut limiter, 30_000)
            .summarize(&docs, SummaryLength::Medium)
            .await
            .unwrap();

        let prompts = llm.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 4);
        assert!(prompts[0].contains("テキスト: one"));
        assert!(prompts[2].contains("テキスト: three"));
        assert!(prompts[3].contains("summary1\n\nsummary2\n\nsummary3"));
        assert_eq!(summary, "summary4");
        assert_eq!(limiter.usage(), (4, 30_000));
    }

    #[tokio::test]
    async fn test_failure_stops_without_reduce() {
        let llm = FakeLlm {
            fail_after: Some(1),
            ..Default::default()
        };
        let mut limiter = limiter();

        let result = MapReduce::new(&llm, &mut limiter, 100)
            .summarize(&["a".into(), "b".into(), "c".into()], SummaryLength::Long)
            .await;

        assert!(matches!(result, Err(SummarizeError::Empty)));
        assert_eq!(llm.prompts.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_no_documents() {
        let llm = FakeLlm::default();
        let mut limiter = limiter();
        let result = MapReduce::new(&llm, &mut limiter, 100)
            .summarize(&[], SummaryLength::Medium)
            .await;
        assert!(matches!(result, Err(SummarizeError::NoInput)));
    }

    #[test]
    fn test_blank_api_key_rejected() {
        assert!(matches!(
            OpenAiSummarizer::new(&SummarizerConfig::default(), "  "),
            Err(SummarizeError::MissingApiKey)
        ));
    }
}
