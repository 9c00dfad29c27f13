//! `.readignore` support: glob patterns for files the directory reader skips.
//!
//! One pattern per line; blank lines and lines starting with `#` are
//! ignored. A file is skipped when a pattern matches either its path
//! relative to the tool root or its bare file name.

use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use tracing::{info, warn};

pub const READIGNORE_FILE: &str = ".readignore";

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

#[derive(Debug, Default)]
pub struct ReadIgnore {
    root: PathBuf,
    patterns: Vec<Pattern>,
}

impl ReadIgnore {
    /// Parse pattern lines. Invalid globs are logged and dropped.
    pub fn parse(contents: &str, root: &Path) -> Self {
        let patterns = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| match Pattern::new(line) {
                Ok(p) => Some(p),
                Err(e) => {
                    warn!("Ignoring invalid .readignore pattern '{line}': {e}");
                    None
                }
            })
            .collect();

        Self {
            root: root.to_path_buf(),
            patterns,
        }
    }

    /// Load `root/.readignore`. A missing or unreadable file means no patterns.
    ///
    /// Patterns are matched against paths relative to the canonical `root`.
    pub fn load(root: &Path) -> Self {
        let root = &root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
        let path = root.join(READIGNORE_FILE);
        if !path.exists() {
            return Self::parse("", root);
        }

        match std::fs::read_to_string(&path) {
            Ok(contents) => {
                let ignore = Self::parse(&contents, root);
                if !ignore.is_empty() {
                    info!("Loaded {} exclude patterns from {}", ignore.len(), path.display());
                }
                ignore
            }
            Err(e) => {
                warn!("Failed to read {}: {e}", path.display());
                Self::parse("", root)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn is_ignored(&self, path: &Path) -> bool {
        if self.patterns.is_empty() {
            return false;
        }

        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        let file_name = path.file_name().map(Path::new);

        self.patterns.iter().any(|pattern| {
            pattern.matches_path_with(relative, MATCH_OPTIONS)
                || file_name.is_some_and(|name| pattern.matches_path_with(name, MATCH_OPTIONS))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comments_and_blank_lines_skipped() {
        let ignore = ReadIgnore::parse("# drafts\n\n*.tmp\n  \ndocs/*.md\n", Path::new("/tool"));
        assert_eq!(ignore.len(), 2);
    }

    #[test]
    fn test_matches_bare_name_and_relative_path() {
        let ignore = ReadIgnore::parse("secret_*.txt\nnotes/*.md", Path::new("/tool"));

        assert!(ignore.is_ignored(Path::new("/tool/input/secret_plan.txt")));
        assert!(ignore.is_ignored(Path::new("/tool/notes/todo.md")));
        assert!(!ignore.is_ignored(Path::new("/tool/other/todo.md")));
        assert!(!ignore.is_ignored(Path::new("/tool/input/plan.txt")));
    }

    #[test]
    fn test_star_does_not_cross_directories() {
        let ignore = ReadIgnore::parse("input*", Path::new("/tool"));
        assert!(!ignore.is_ignored(Path::new("/tool/input/a.txt")));
        assert!(ignore.is_ignored(Path::new("/tool/input_b.txt")));
    }

    #[test]
    fn test_load_resolves_root() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("input")).unwrap();
        std::fs::write(dir.path().join(READIGNORE_FILE), "input/skip.json\n").unwrap();

        let ignore = ReadIgnore::load(&dir.path().join("input").join(".."));
        let canonical = dir.path().canonicalize().unwrap();

        assert!(ignore.is_ignored(&canonical.join("input").join("skip.json")));
        assert!(!ignore.is_ignored(&canonical.join("input").join("a.txt")));
    }

    #[test]
    fn test_missing_file_means_nothing_ignored() {
        let dir = tempfile::TempDir::new().unwrap();
        let ignore = ReadIgnore::load(dir.path());
        assert!(ignore.is_empty());
        assert!(!ignore.is_ignored(&dir.path().join("a.txt")));
    }
}
