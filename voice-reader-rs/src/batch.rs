//! Two-phase batch reading: generate every audio file, then play them all.
//!
//! IDLE → GENERATING → {NOTHING_GENERATED | PLAYBACK_SKIPPED | PLAYING} → DONE
//!
//! A failure on one item is logged and that item is dropped; the batch
//! always runs to the end.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::error::{PlaybackError, TtsError};

/// Turns text into an audio file.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` and save it as `output_file_name`. Returns the written path.
    async fn synthesize(
        &self,
        text: &str,
        speaker_id: u32,
        output_file_name: &str,
    ) -> Result<PathBuf, TtsError>;
}

/// Plays an audio file to completion.
#[async_trait]
pub trait AudioPlayer: Send + Sync {
    async fn play(&self, path: &Path) -> Result<(), PlaybackError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Idle,
    Generating,
    NothingGenerated,
    PlaybackSkipped,
    Playing,
    Done,
}

impl std::fmt::Display for BatchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "IDLE"),
            Self::Generating => write!(f, "GENERATING"),
            Self::NothingGenerated => write!(f, "NOTHING_GENERATED"),
            Self::PlaybackSkipped => write!(f, "PLAYBACK_SKIPPED"),
            Self::Playing => write!(f, "PLAYING"),
            Self::Done => write!(f, "DONE"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextSource {
    Inline(String),
    File(PathBuf),
}

/// One input of a batch, already in its final position.
#[derive(Debug, Clone)]
pub struct BatchItem {
    pub label: String,
    pub output_file_name: String,
    pub source: TextSource,
}

impl BatchItem {
    pub fn from_file(path: PathBuf, output_file_name: String) -> Self {
        let label = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            label,
            output_file_name,
            source: TextSource::File(path),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedArtifact {
    pub sequence_index: usize,
    pub file_path: PathBuf,
    pub source_label: String,
}

#[derive(Debug, Clone)]
pub struct ItemFailure {
    pub label: String,
    pub message: String,
}

#[derive(Debug)]
pub struct BatchOutcome {
    /// Which way phase 2 went.
    pub playback: BatchState,
    pub artifacts: Vec<GeneratedArtifact>,
    pub generation_failures: Vec<ItemFailure>,
    pub playback_failures: Vec<ItemFailure>,
}

pub struct BatchRunner<'a, S: SpeechSynthesizer, P: AudioPlayer> {
    synthesizer: &'a S,
    player: &'a P,
    speaker_id: u32,
    auto_play: bool,
    delay: Duration,
    state: BatchState,
}

impl<'a, S: SpeechSynthesizer, P: AudioPlayer> BatchRunner<'a, S, P> {
    pub fn new(
        synthesizer: &'a S,
        player: &'a P,
        speaker_id: u32,
        auto_play: bool,
        delay: Duration,
    ) -> Self {
        Self {
            synthesizer,
            player,
            speaker_id,
            auto_play,
            delay,
            state: BatchState::Idle,
        }
    }

    fn transition(&mut self, next: BatchState) {
        info!("State: {} → {}", self.state, next);
        self.state = next;
    }

    /// Run both phases over `items` in the given order.
    pub async fn run(&mut self, items: &[BatchItem]) -> BatchOutcome {
        self.transition(BatchState::Generating);
        let (artifacts, generation_failures) = self.generate_all(items).await;

        let mut playback_failures = Vec::new();
        let playback = if artifacts.is_empty() {
            info!("No audio files were generated, nothing to play");
            BatchState::NothingGenerated
        } else if !self.auto_play {
            info!(
                "Auto-play is disabled, generated {} audio files without playing",
                artifacts.len()
            );
            BatchState::PlaybackSkipped
        } else {
            BatchState::Playing
        };
        self.transition(playback);

        if playback == BatchState::Playing {
            playback_failures = self.play_all(&artifacts).await;
        }

        self.transition(BatchState::Done);
        BatchOutcome {
            playback,
            artifacts,
            generation_failures,
            playback_failures,
        }
    }

    /// Phase 1: synthesize every item, skipping the ones that fail.
    pub async fn generate_all(
        &self,
        items: &[BatchItem],
    ) -> (Vec<GeneratedArtifact>, Vec<ItemFailure>) {
        let total = items.len();
        let mut artifacts = Vec::with_capacity(total);
        let mut failures = Vec::new();

        info!("Generating {total} audio files");

        for (i, item) in items.iter().enumerate() {
            info!("[{}/{total}] Generating audio for {}", i + 1, item.label);

            match self.generate_one(item).await {
                Ok(path) => {
                    info!(
                        "Generated {}",
                        path.file_name().unwrap_or_default().to_string_lossy()
                    );
                    artifacts.push(GeneratedArtifact {
                        sequence_index: artifacts.len(),
                        file_path: path,
                        source_label: item.label.clone(),
                    });
                }
                Err(message) => {
                    error!("Skipping {}: {message}", item.label);
                    failures.push(ItemFailure {
                        label: item.label.clone(),
                        message,
                    });
                }
            }
        }

        info!("{} of {total} audio files generated", artifacts.len());
        (artifacts, failures)
    }

    async fn generate_one(&self, item: &BatchItem) -> Result<PathBuf, String> {
        let text = match &item.source {
            TextSource::Inline(text) => text.clone(),
            TextSource::File(path) => tokio::fs::read_to_string(path)
                .await
                .map_err(|e| format!("failed to read {}: {e}", path.display()))?,
        };

        if text.trim().is_empty() {
            return Err("no text to read".into());
        }

        self.synthesizer
            .synthesize(&text, self.speaker_id, &item.output_file_name)
            .await
            .map_err(|e| e.to_string())
    }

    /// Phase 2: play artifacts in order with a pause between them.
    pub async fn play_all(&self, artifacts: &[GeneratedArtifact]) -> Vec<ItemFailure> {
        let total = artifacts.len();
        let mut failures = Vec::new();

        info!("Playing {total} audio files");

        for artifact in artifacts {
            let i = artifact.sequence_index;
            let name = artifact
                .file_path
                .file_name()
                .unwrap_or_default()
                .to_string_lossy()
                .into_owned();
            info!("[{}/{total}] Playing {name}", i + 1);

            if let Err(e) = self.player.play(&artifact.file_path).await {
                warn!("Playback of {name} failed: {e}");
                failures.push(ItemFailure {
                    label: artifact.source_label.clone(),
                    message: e.to_string(),
                });
            }

            if i + 1 < total && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
        }

        info!("Finished playing all audio files");
        failures
    }
}
