//! WAV playback through the default output device (rodio 0.21).
//!
//! Each file opens its own output stream on a blocking thread and waits for
//! the sink to drain before returning.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rodio::OutputStreamBuilder;
use tracing::debug;

use crate::batch::AudioPlayer;
use crate::error::PlaybackError;

#[derive(Debug, Default, Clone, Copy)]
pub struct RodioPlayer;

impl RodioPlayer {
    pub fn new() -> Self {
        Self
    }
}

fn play_blocking(path: PathBuf) -> Result<(), PlaybackError> {
    let file = File::open(&path).map_err(|source| PlaybackError::Open {
        path: path.clone(),
        source,
    })?;

    let mut stream = OutputStreamBuilder::open_default_stream()
        .map_err(|e| PlaybackError::Output(e.to_string()))?;
    stream.log_on_drop(false);

    let sink = rodio::play(stream.mixer(), BufReader::new(file)).map_err(|e| {
        PlaybackError::Decode {
            path: path.clone(),
            reason: e.to_string(),
        }
    })?;
    sink.sleep_until_end();

    debug!("Finished {}", path.display());
    Ok(())
}

#[async_trait]
impl AudioPlayer for RodioPlayer {
    async fn play(&self, path: &Path) -> Result<(), PlaybackError> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || play_blocking(path)).await?
    }
}
