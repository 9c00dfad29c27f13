//! Reading files and directories aloud.
//!
//! A single file is synthesized to `output.filename` and played. A directory
//! is read as one two-phase batch over its eligible files in name order.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{info, warn};

use crate::batch::{
    AudioPlayer, BatchItem, BatchOutcome, BatchRunner, SpeechSynthesizer, TextSource,
};
use crate::config::Config;
use crate::error::OutputError;
use crate::read_ignore::ReadIgnore;

pub const SUPPORTED_EXTENSIONS: [&str; 9] =
    ["txt", "md", "json", "js", "ts", "html", "css", "xml", "csv"];

pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}

/// Eligible files directly inside `dir`, sorted by file name.
pub fn collect_text_files(
    dir: &Path,
    ignore: Option<&ReadIgnore>,
) -> Result<Vec<PathBuf>, OutputError> {
    let read_dir_error = |source| OutputError::ReadDir {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(read_dir_error)? {
        let path = entry.map_err(read_dir_error)?.path();
        if !path.is_file() || !is_supported(&path) {
            continue;
        }
        if ignore.is_some_and(|ig| ig.is_ignored(&path)) {
            info!("Excluded by .readignore: {}", path.display());
            continue;
        }
        files.push(path);
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Batch items for a directory listing: `{stem}_{i}.wav`, 1-based.
pub fn directory_items(files: &[PathBuf]) -> Vec<BatchItem> {
    files
        .iter()
        .enumerate()
        .map(|(i, path)| {
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            BatchItem::from_file(path.clone(), format!("{stem}_{}.wav", i + 1))
        })
        .collect()
}

/// Batch items across several directories: `{prefix}_{d}_{f}.wav`, 1-based.
///
/// A directory that cannot be listed is logged and skipped.
pub fn multi_directory_items(dirs: &[PathBuf], prefix: &str) -> Vec<BatchItem> {
    let mut items = Vec::new();
    for (d, dir) in dirs.iter().enumerate() {
        let files = match collect_text_files(dir, None) {
            Ok(files) => files,
            Err(e) => {
                warn!("Skipping directory: {e}");
                continue;
            }
        };
        for (f, path) in files.into_iter().enumerate() {
            items.push(BatchItem::from_file(
                path,
                format!("{prefix}_{}_{}.wav", d + 1, f + 1),
            ));
        }
    }
    items
}

pub struct Reader<'a, S: SpeechSynthesizer, P: AudioPlayer> {
    config: &'a Config,
    synthesizer: &'a S,
    player: &'a P,
}

impl<'a, S: SpeechSynthesizer, P: AudioPlayer> Reader<'a, S, P> {
    pub fn new(config: &'a Config, synthesizer: &'a S, player: &'a P) -> Self {
        Self {
            config,
            synthesizer,
            player,
        }
    }

    fn runner(&self) -> BatchRunner<'a, S, P> {
        BatchRunner::new(
            self.synthesizer,
            self.player,
            self.config.speaker.default_id,
            self.config.playback.auto_play,
            Duration::from_millis(self.config.playback.delay_ms),
        )
    }

    /// Read a file or every eligible file in a directory.
    ///
    /// A directory is resolved to its canonical path first so `.readignore`
    /// patterns see it relative to `tool_root` however it was spelled.
    pub async fn read_path(
        &self,
        path: &Path,
        tool_root: &Path,
    ) -> Result<BatchOutcome, OutputError> {
        if path.is_dir() {
            let dir = path.canonicalize().map_err(|source| OutputError::ReadDir {
                path: path.to_path_buf(),
                source,
            })?;
            let ignore = ReadIgnore::load(tool_root);
            self.read_directory(&dir, Some(&ignore)).await
        } else {
            Ok(self.read_file(path).await)
        }
    }

    pub async fn read_file(&self, path: &Path) -> BatchOutcome {
        info!("Reading {}", path.display());
        let item = BatchItem::from_file(path.to_path_buf(), self.config.output.filename.clone());
        self.runner().run(&[item]).await
    }

    /// Read text given directly, saved as `output.filename`.
    pub async fn read_text(&self, text: &str) -> BatchOutcome {
        let item = BatchItem {
            label: "text".into(),
            output_file_name: self.config.output.filename.clone(),
            source: TextSource::Inline(text.to_string()),
        };
        self.runner().run(&[item]).await
    }

    pub async fn read_directory(
        &self,
        dir: &Path,
        ignore: Option<&ReadIgnore>,
    ) -> Result<BatchOutcome, OutputError> {
        let files = collect_text_files(dir, ignore)?;
        info!("Found {} readable files in {}", files.len(), dir.display());
        Ok(self.read_items(&directory_items(&files)).await)
    }

    pub async fn read_items(&self, items: &[BatchItem]) -> BatchOutcome {
        self.runner().run(items).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::BatchState;
    use crate::error::{PlaybackError, TtsError};
    use async_trait::async_trait;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingSynth {
        names: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SpeechSynthesizer for RecordingSynth {
        async fn synthesize(
            &self,
            _text: &str,
            _speaker_id: u32,
            output_file_name: &str,
        ) -> Result<PathBuf, TtsError> {
            self.names.lock().unwrap().push(output_file_name.to_string());
            Ok(PathBuf::from(output_file_name))
        }
    }

    struct SilentPlayer;

    #[async_trait]
    impl AudioPlayer for SilentPlayer {
        async fn play(&self, _path: &Path) -> Result<(), PlaybackError> {
            Ok(())
        }
    }

    fn quiet_config() -> Config {
        let mut config = Config::default();
        config.playback.delay_ms = 0;
        config
    }

    #[test]
    fn test_supported_extensions() {
        assert!(is_supported(Path::new("a.txt")));
        assert!(is_supported(Path::new("b.MD")));
        assert!(!is_supported(Path::new("c.wav")));
        assert!(!is_supported(Path::new("noext")));
    }

    #[tokio::test]
    async fn test_directory_with_ignored_files() {
        let root = TempDir::new().unwrap();
        let input = root.path().join("input");
        fs::create_dir(&input).unwrap();
        for name in ["c.txt", "a.md", "b.csv", "draft.txt", "skip.json"] {
            fs::write(input.join(name), format!("{name}の内容。")).unwrap();
        }
        fs::write(input.join("song.wav"), b"RIFF").unwrap();
        fs::create_dir(input.join("sub.txt")).unwrap();
        fs::write(root.path().join(".readignore"), "draft.txt\ninput/skip.json\n").unwrap();

        let config = quiet_config();
        let synth = RecordingSynth::default();
        let reader = Reader::new(&config, &synth, &SilentPlayer);

        let outcome = reader.read_path(&input, root.path()).await.unwrap();

        assert_eq!(outcome.artifacts.len(), 3);
        assert_eq!(outcome.playback, BatchState::Playing);
        assert_eq!(
            *synth.names.lock().unwrap(),
            vec!["a_1.wav", "b_2.wav", "c_3.wav"]
        );
    }

    #[tokio::test]
    async fn test_ignore_patterns_apply_to_non_normalized_directory() {
        let root = TempDir::new().unwrap();
        let input = root.path().join("input");
        fs::create_dir(&input).unwrap();
        fs::write(input.join("a.txt"), "読む。").unwrap();
        fs::write(input.join("skip.json"), "{}").unwrap();
        fs::write(root.path().join(".readignore"), "input/skip.json\n").unwrap();

        let config = quiet_config();
        let synth = RecordingSynth::default();
        let reader = Reader::new(&config, &synth, &SilentPlayer);

        let roundabout = root.path().join(".").join("input").join("..").join("input");
        let outcome = reader.read_path(&roundabout, root.path()).await.unwrap();

        assert_eq!(outcome.artifacts.len(), 1);
        assert_eq!(*synth.names.lock().unwrap(), vec!["a_1.wav"]);
    }

    #[tokio::test]
    async fn test_single_file_uses_configured_name() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("note.txt");
        fs::write(&file, "こんにちは。").unwrap();

        let config = quiet_config();
        let synth = RecordingSynth::default();
        let reader = Reader::new(&config, &synth, &SilentPlayer);

        let outcome = reader.read_path(&file, dir.path()).await.unwrap();

        assert_eq!(outcome.artifacts.len(), 1);
        assert_eq!(*synth.names.lock().unwrap(), vec!["output.wav"]);
    }

    #[tokio::test]
    async fn test_inline_text() {
        let config = quiet_config();
        let synth = RecordingSynth::default();
        let reader = Reader::new(&config, &synth, &SilentPlayer);

        let outcome = reader.read_text("テストです。").await;
        assert_eq!(outcome.artifacts[0].source_label, "text");

        let outcome = reader.read_text("   ").await;
        assert_eq!(outcome.playback, BatchState::NothingGenerated);
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let dir = TempDir::new().unwrap();
        let result = collect_text_files(&dir.path().join("nope"), None);
        assert!(matches!(result, Err(OutputError::ReadDir { .. })));
    }

    #[test]
    fn test_multi_directory_naming() {
        let root = TempDir::new().unwrap();
        let first = root.path().join("one");
        let second = root.path().join("two");
        fs::create_dir(&first).unwrap();
        fs::create_dir(&second).unwrap();
        fs::write(first.join("a_01.txt"), "a").unwrap();
        fs::write(first.join("a_02.txt"), "b").unwrap();
        fs::write(second.join("report.md"), "c").unwrap();

        let dirs = vec![first, root.path().join("missing"), second];
        let names: Vec<_> = multi_directory_items(&dirs, "website")
            .into_iter()
            .map(|i| i.output_file_name)
            .collect();

        assert_eq!(names, vec!["website_1_1.wav", "website_1_2.wav", "website_3_1.wav"]);
    }
}
