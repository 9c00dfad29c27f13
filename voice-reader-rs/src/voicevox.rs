//! VOICEVOX engine client.
//!
//! Synthesis is two calls: `/audio_query` builds the query for the text and
//! speaker, `/synthesis` renders it to WAV. The WAV is written under the
//! configured output directory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};
use url::Url;

use crate::batch::SpeechSynthesizer;
use crate::config::{ApiConfig, OutputConfig};
use crate::error::TtsError;
use crate::http::{build_client, RetryPolicy};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Speaker {
    pub id: u32,
    pub name: String,
}

#[derive(Deserialize)]
struct SpeakerEntry {
    name: String,
    styles: Vec<SpeakerStyle>,
}

#[derive(Deserialize)]
struct SpeakerStyle {
    id: u32,
    name: String,
}

const DEFAULT_SPEAKERS: [(u32, &str); 16] = [
    (0, "四国めたん（ノーマル）"),
    (1, "四国めたん（あまあま）"),
    (2, "四国めたん（ツンツン）"),
    (3, "四国めたん（セクシー）"),
    (4, "ずんだもん（ノーマル）"),
    (5, "ずんだもん（あまあま）"),
    (6, "ずんだもん（ツンツン）"),
    (7, "ずんだもん（セクシー）"),
    (8, "春日部つむぎ（ノーマル）"),
    (9, "雨晴はう（ノーマル）"),
    (10, "波音リツ（ノーマル）"),
    (11, "玄野武宏（ノーマル）"),
    (12, "白上虎太郎（ノーマル）"),
    (13, "青山龍星（ノーマル）"),
    (14, "冥鳴ひまり（ノーマル）"),
    (15, "九州そら（ノーマル）"),
];

pub fn default_speakers() -> Vec<Speaker> {
    DEFAULT_SPEAKERS
        .iter()
        .map(|&(id, name)| Speaker {
            id,
            name: name.to_string(),
        })
        .collect()
}

fn flatten_speakers(entries: Vec<SpeakerEntry>) -> Vec<Speaker> {
    entries
        .into_iter()
        .flat_map(|entry| {
            let speaker = entry.name;
            entry.styles.into_iter().map(move |style| Speaker {
                id: style.id,
                name: format!("{speaker}（{}）", style.name),
            })
        })
        .collect()
}

/// Length of a WAV file in seconds, if it can be parsed.
pub fn wav_duration(path: &Path) -> Option<f64> {
    let reader = hound::WavReader::open(path).ok()?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return None;
    }
    Some(reader.duration() as f64 / spec.sample_rate as f64)
}

pub struct VoicevoxClient {
    base_url: String,
    output_dir: PathBuf,
    client: Client,
    retry: RetryPolicy,
}

impl VoicevoxClient {
    pub fn new(api: &ApiConfig, output: &OutputConfig) -> Result<Self, TtsError> {
        Url::parse(&api.url)?;
        let client = build_client(Duration::from_millis(api.timeout))?;

        Ok(Self {
            base_url: api.url.trim_end_matches('/').to_string(),
            output_dir: PathBuf::from(&output.dir),
            client,
            retry: RetryPolicy::NoRetry,
        })
    }

    fn endpoint(&self, path: &str, params: &[(&str, &str)]) -> Result<Url, TtsError> {
        Ok(Url::parse_with_params(
            &format!("{}/{path}", self.base_url),
            params,
        )?)
    }

    fn map_send_error(&self, e: reqwest::Error) -> TtsError {
        if e.is_connect() {
            TtsError::Unreachable {
                url: self.base_url.clone(),
            }
        } else if e.is_timeout() {
            TtsError::Timeout
        } else {
            TtsError::Http(e)
        }
    }

    async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, TtsError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(TtsError::Status {
            status: status.as_u16(),
            body,
        })
    }

    /// List available speakers. Falls back to the built-in list on error.
    pub async fn speakers(&self) -> Vec<Speaker> {
        let result = async {
            let url = self.endpoint("speakers", &[])?;
            let resp = self
                .retry
                .send(self.client.get(url))
                .await
                .map_err(|e| self.map_send_error(e))?;
            let resp = Self::check_status(resp).await?;
            Ok::<_, TtsError>(resp.json::<Vec<SpeakerEntry>>().await?)
        }
        .await;

        match result {
            Ok(entries) => flatten_speakers(entries),
            Err(e) => {
                warn!("Failed to fetch speakers: {e}, using built-in list");
                default_speakers()
            }
        }
    }

    async fn audio_query(
        &self,
        text: &str,
        speaker_id: u32,
    ) -> Result<serde_json::Value, TtsError> {
        let speaker = speaker_id.to_string();
        let url = self.endpoint("audio_query", &[("text", text), ("speaker", &speaker)])?;

        debug!("Building audio query ({} chars)", text.chars().count());
        let resp = self
            .retry
            .send(
                self.client
                    .post(url)
                    .header("Content-Type", "application/json")
                    .body("{}"),
            )
            .await
            .map_err(|e| self.map_send_error(e))?;
        let resp = Self::check_status(resp).await?;
        Ok(resp.json().await?)
    }

    async fn synthesis(
        &self,
        query: &serde_json::Value,
        speaker_id: u32,
    ) -> Result<Vec<u8>, TtsError> {
        let speaker = speaker_id.to_string();
        let url = self.endpoint("synthesis", &[("speaker", &speaker)])?;

        debug!("Synthesizing audio");
        let resp = self
            .retry
            .send(
                self.client
                    .post(url)
                    .header("Accept", "audio/wav")
                    .json(query),
            )
            .await
            .map_err(|e| self.map_send_error(e))?;
        let resp = Self::check_status(resp).await?;
        Ok(resp.bytes().await?.to_vec())
    }
}

#[async_trait]
impl SpeechSynthesizer for VoicevoxClient {
    async fn synthesize(
        &self,
        text: &str,
        speaker_id: u32,
        output_file_name: &str,
    ) -> Result<PathBuf, TtsError> {
        if text.trim().is_empty() {
            return Err(TtsError::EmptyText(output_file_name.to_string()));
        }

        let query = self.audio_query(text, speaker_id).await?;
        let audio = self.synthesis(&query, speaker_id).await?;

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|source| TtsError::Write {
                path: self.output_dir.clone(),
                source,
            })?;

        let path = self.output_dir.join(output_file_name);
        tokio::fs::write(&path, &audio)
            .await
            .map_err(|source| TtsError::Write {
                path: path.clone(),
                source,
            })?;

        match wav_duration(&path) {
            Some(secs) => info!("Saved {} ({secs:.1}s)", path.display()),
            None => info!("Saved {}", path.display()),
        }
        Ok(path)
    }
}
