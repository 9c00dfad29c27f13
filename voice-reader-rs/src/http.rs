//! Shared HTTP client setup and the retry policy for external calls.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};

pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// How failed external calls are repeated.
///
/// Only `NoRetry` exists: every request is sent once and its error goes
/// straight back to the caller, which skips the item. Each summarizer
/// attempt is also one rate-limiter slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryPolicy {
    #[default]
    NoRetry,
}

impl RetryPolicy {
    pub async fn send(self, request: RequestBuilder) -> Result<Response, reqwest::Error> {
        match self {
            Self::NoRetry => request.send().await,
        }
    }
}

pub fn build_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder().timeout(timeout).build()
}
