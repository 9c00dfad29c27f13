//! Numbered reading files and the summary report.
//!
//! File names sort lexicographically into narration order:
//! - split mode: `{prefix}{item:02}_{chunk:02}.txt`
//! - combined mode: `{prefix}{chunk:02}.txt`
//!
//! Every write replaces the file, and reading files from an earlier run are
//! removed first, so a rerun leaves exactly the current batch behind.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::chunker::{chunk_text, TextChunk};
use crate::config::ReadingConfig;
use crate::error::OutputError;

/// A summarized article or website, ready to be written out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummarizedItem {
    pub title: String,
    pub summary: String,
    pub source: String,
    pub published_at: String,
    pub link: String,
}

/// Header values for the summary report.
#[derive(Debug, Clone, Default)]
pub struct ReportContext {
    pub heading: String,
    pub generated_at: String,
    pub keywords: Vec<String>,
    pub feed_count: usize,
}

pub fn ensure_dir(dir: &Path) -> Result<(), OutputError> {
    fs::create_dir_all(dir).map_err(|source| OutputError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })
}

pub fn write_text_file(path: &Path, content: &str) -> Result<(), OutputError> {
    fs::write(path, content).map_err(|source| OutputError::Write {
        path: path.to_path_buf(),
        source,
    })
}

fn write_chunk(
    output_dir: &Path,
    file_name: String,
    chunk: &TextChunk,
) -> Result<PathBuf, OutputError> {
    let path = output_dir.join(&file_name);
    write_text_file(&path, &chunk.content)?;
    info!(
        "Created reading file {file_name} ({} of {} chars)",
        chunk.content.chars().count(),
        chunk.source_length
    );
    Ok(path)
}

/// Remove `{prefix}*.txt` files left in `output_dir` by an earlier run.
fn remove_stale_reading_files(output_dir: &Path, prefix: &str) -> Result<usize, OutputError> {
    if prefix.is_empty() {
        return Ok(0);
    }

    let read_dir_error = |source| OutputError::ReadDir {
        path: output_dir.to_path_buf(),
        source,
    };

    let mut removed = 0;
    for entry in fs::read_dir(output_dir).map_err(read_dir_error)? {
        let path = entry.map_err(read_dir_error)?.path();
        let is_stale = path.is_file()
            && path.extension().is_some_and(|ext| ext == "txt")
            && path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(prefix));
        if is_stale {
            fs::remove_file(&path).map_err(|source| OutputError::Remove {
                path: path.clone(),
                source,
            })?;
            removed += 1;
        }
    }

    if removed > 0 {
        info!("Removed {removed} old reading files from {}", output_dir.display());
    }
    Ok(removed)
}

fn with_period(text: &str) -> String {
    let text = text.trim();
    if text.ends_with('。') {
        text.to_string()
    } else {
        format!("{text}。")
    }
}

/// Write reading files for `items` into `output_dir`.
///
/// Returns the paths in the order they were written, which is the order
/// they should be read aloud.
pub fn create_reading_files(
    items: &[SummarizedItem],
    output_dir: &Path,
    options: &ReadingConfig,
) -> Result<Vec<PathBuf>, OutputError> {
    ensure_dir(output_dir)?;

    let max_chars = options.max_chars_per_file;
    let prefix = &options.output_prefix;
    remove_stale_reading_files(output_dir, prefix)?;
    let mut created = Vec::new();

    if options.split_files {
        for (i, item) in items.iter().enumerate() {
            for chunk in chunk_text(&item.summary, max_chars)? {
                let file_name = format!("{prefix}{:02}_{:02}.txt", i + 1, chunk.index + 1);
                created.push(write_chunk(output_dir, file_name, &chunk)?);
            }
        }
    } else {
        let mut all_content = String::new();
        if options.include_metadata {
            all_content.push_str(&format!("ニュース要約。{}件の記事があります。", items.len()));
        }
        for (i, item) in items.iter().enumerate() {
            if options.include_metadata {
                all_content.push_str(&format!("記事{}。", i + 1));
            }
            all_content.push_str(&with_period(&item.title));
            all_content.push_str(&with_period(&item.summary));
        }

        for chunk in chunk_text(&all_content, max_chars)? {
            let file_name = format!("{prefix}{:02}.txt", chunk.index + 1);
            created.push(write_chunk(output_dir, file_name, &chunk)?);
        }
    }

    Ok(created)
}

/// Render the human-readable Markdown report.
pub fn render_report(items: &[SummarizedItem], context: &ReportContext) -> String {
    let keywords = if context.keywords.is_empty() {
        "なし".to_string()
    } else {
        context.keywords.join(", ")
    };

    let mut content = format!(
        "# {}\n\
         生成日時: {}\n\
         検索キーワード: {keywords}\n\
         記事数: {}件\n\
         RSSフィード数: {}件\n\n",
        context.heading,
        context.generated_at,
        items.len(),
        context.feed_count,
    );

    for (i, item) in items.iter().enumerate() {
        content.push_str(&format!(
            "## {}. {}\n\
             **ソース**: {}\n\
             **公開日**: {}\n\
             **URL**: {}\n\n\
             **要約**:\n{}\n\n\
             ---\n\n",
            i + 1,
            item.title,
            item.source,
            item.published_at,
            item.link,
            item.summary,
        ));
    }

    content
}

/// Write the report for `items` to `output_dir/file_name`.
pub fn write_summary_report(
    items: &[SummarizedItem],
    output_dir: &Path,
    file_name: &str,
    context: &ReportContext,
) -> Result<PathBuf, OutputError> {
    ensure_dir(output_dir)?;
    let path = output_dir.join(file_name);
    write_text_file(&path, &render_report(items, context))?;
    info!("Saved summary report {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn item(title: &str, summary: &str) -> SummarizedItem {
        SummarizedItem {
            title: title.into(),
            summary: summary.into(),
            source: "Example News".into(),
            published_at: "Mon, 01 Jan 2024 00:00:00 GMT".into(),
            link: "https://example.com/a".into(),
        }
    }

    fn names(paths: &[PathBuf]) -> Vec<String> {
        paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    fn options(split_files: bool, max_chars: usize) -> ReadingConfig {
        ReadingConfig {
            split_files,
            max_chars_per_file: max_chars,
            include_metadata: true,
            output_prefix: "news_reading_".into(),
        }
    }

    #[test]
    fn test_split_mode_names_by_item_and_chunk() {
        let dir = TempDir::new().unwrap();
        let items = vec![
            item("一", "最初の記事です。二文目です。"),
            item("二", "短い。"),
        ];

        let files = create_reading_files(&items, dir.path(), &options(true, 8)).unwrap();

        assert_eq!(
            names(&files),
            vec!["news_reading_01_01.txt", "news_reading_01_02.txt", "news_reading_02_01.txt"]
        );
        assert_eq!(fs::read_to_string(&files[0]).unwrap(), "最初の記事です。");
        assert_eq!(fs::read_to_string(&files[2]).unwrap(), "短い。");
    }

    #[test]
    fn test_combined_mode_includes_metadata() {
        let dir = TempDir::new().unwrap();
        let items = vec![item("見出し", "本文です。")];

        let files = create_reading_files(&items, dir.path(), &options(false, 300)).unwrap();

        assert_eq!(names(&files), vec!["news_reading_01.txt"]);
        assert_eq!(
            fs::read_to_string(&files[0]).unwrap(),
            "ニュース要約。1件の記事があります。記事1。見出し。本文です。"
        );
    }

    #[test]
    fn test_listing_order_matches_write_order() {
        let dir = TempDir::new().unwrap();
        let summary = "あ。".repeat(15);
        let items: Vec<_> = (0..11).map(|i| item(&i.to_string(), &summary)).collect();

        let files = create_reading_files(&items, dir.path(), &options(true, 2)).unwrap();

        let mut sorted = names(&files);
        sorted.sort();
        assert_eq!(sorted, names(&files));
    }

    #[test]
    fn test_rerun_overwrites_same_files() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("nested").join("out");
        let items = vec![item("a", "一。二。三。")];

        let first = create_reading_files(&items, &out, &options(true, 2)).unwrap();
        let second = create_reading_files(&items, &out, &options(true, 2)).unwrap();

        assert_eq!(first, second);
        assert_eq!(fs::read_dir(&out).unwrap().count(), first.len());
    }

    #[test]
    fn test_smaller_rerun_removes_old_reading_files() {
        let dir = TempDir::new().unwrap();
        let many: Vec<_> = (0..3).map(|i| item(&i.to_string(), "一。二。")).collect();
        create_reading_files(&many, dir.path(), &options(true, 2)).unwrap();
        fs::write(dir.path().join("news_summary.txt"), "report").unwrap();
        fs::write(dir.path().join("news_reading_notes.md"), "keep").unwrap();

        let files = create_reading_files(&many[..1], dir.path(), &options(true, 2)).unwrap();

        let mut left: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        left.sort();
        assert_eq!(names(&files), vec!["news_reading_01_01.txt", "news_reading_01_02.txt"]);
        assert_eq!(
            left,
            vec![
                "news_reading_01_01.txt",
                "news_reading_01_02.txt",
                "news_reading_notes.md",
                "news_summary.txt",
            ]
        );
    }

    #[test]
    fn test_zero_max_chars_is_an_error() {
        let dir = TempDir::new().unwrap();
        let result = create_reading_files(&[item("a", "b")], dir.path(), &options(true, 0));
        assert!(matches!(result, Err(OutputError::Chunk(_))));
    }

    #[test]
    fn test_report_lists_every_item() {
        let context = ReportContext {
            heading: "ニュース要約レポート".into(),
            generated_at: "2024/1/1 9:00:00".into(),
            keywords: vec!["AI".into(), "Rust".into()],
            feed_count: 2,
        };
        let report = render_report(&[item("見出しA", "要約A"), item("見出しB", "要約B")], &context);

        assert!(report.starts_with("# ニュース要約レポート\n生成日時: 2024/1/1 9:00:00\n"));
        assert!(report.contains("検索キーワード: AI, Rust\n記事数: 2件\nRSSフィード数: 2件"));
        assert!(report.contains("## 1. 見出しA\n**ソース**: Example News\n"));
        assert!(report.contains("**要約**:\n要約B\n\n---\n\n"));
        assert_eq!(report.matches("---").count(), 2);
    }

    #[test]
    fn test_report_written_once() {
        let dir = TempDir::new().unwrap();
        let path = write_summary_report(
            &[item("t", "s")],
            dir.path(),
            "news_summary.txt",
            &ReportContext::default(),
        )
        .unwrap();
        assert_eq!(path, dir.path().join("news_summary.txt"));
        assert!(fs::read_to_string(path).unwrap().contains("検索キーワード: なし"));
    }
}
