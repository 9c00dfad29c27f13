//! Sentence-aware text chunking.
//!
//! Three splitters share the same sentence rules:
//! - `split_text_by_length`: bounded chunks for VOICEVOX, oversize sentences
//!   are cut into fixed-width pieces
//! - `summarize_excerpt`: one lossy digest string, stops at the first
//!   sentence that no longer fits
//! - `split_documents`: large overlapping windows fed to the summarizer
//!
//! All lengths are counted in chars, not bytes.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::ChunkError;

/// Sentence terminators. The delimiter stays with the sentence it ends.
const SENTENCE_DELIMITERS: [char; 5] = ['。', '．', '！', '？', '\n'];

static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());
static HTML_ENTITY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"&[^;\s]+;").unwrap());

/// One bounded piece of text in narration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub index: usize,
    pub content: String,
    /// Char count of the text the chunk was cut from.
    pub source_length: usize,
}

fn is_delimiter(c: char) -> bool {
    SENTENCE_DELIMITERS.contains(&c)
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Split text into sentences, keeping each delimiter attached.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;

    for (i, c) in text.char_indices() {
        if is_delimiter(c) {
            let end = i + c.len_utf8();
            sentences.push(&text[start..end]);
            start = end;
        }
    }

    if start < text.len() {
        sentences.push(&text[start..]);
    }

    sentences
}

/// Cut a sentence into consecutive pieces of exactly `width` chars.
fn force_split(sentence: &str, width: usize) -> Vec<String> {
    let chars: Vec<char> = sentence.chars().collect();
    chars.chunks(width).map(|piece| piece.iter().collect()).collect()
}

/// Split text into chunks of at most `max_length` chars on sentence boundaries.
///
/// Sentences are packed greedily. A sentence longer than `max_length` is
/// flushed on its own as fixed-width pieces; the last piece may be shorter.
pub fn split_text_by_length(text: &str, max_length: usize) -> Result<Vec<String>, ChunkError> {
    if max_length == 0 {
        return Err(ChunkError::InvalidMaxLength);
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for sentence in split_sentences(text) {
        let sentence_len = char_len(sentence);

        if current_len + sentence_len <= max_length {
            current.push_str(sentence);
            current_len += sentence_len;
            continue;
        }

        if !current.is_empty() {
            chunks.push(current.trim().to_string());
            current.clear();
            current_len = 0;
        }

        if sentence_len > max_length {
            chunks.extend(force_split(sentence, max_length));
        } else {
            current.push_str(sentence);
            current_len = sentence_len;
        }
    }

    if !current.is_empty() {
        chunks.push(current.trim().to_string());
    }

    // Whitespace-only leftovers (blank lines, a trailing newline piece)
    chunks.retain(|chunk| !chunk.trim().is_empty());
    Ok(chunks)
}

/// Like `split_text_by_length`, but numbered.
pub fn chunk_text(text: &str, max_length: usize) -> Result<Vec<TextChunk>, ChunkError> {
    let source_length = char_len(text);
    Ok(split_text_by_length(text, max_length)?
        .into_iter()
        .enumerate()
        .map(|(index, content)| TextChunk {
            index,
            content,
            source_length,
        })
        .collect())
}

/// Strip HTML tags and entities from feed content.
pub fn strip_html(text: &str) -> String {
    let without_tags = HTML_TAG.replace_all(text, "");
    HTML_ENTITY.replace_all(&without_tags, "").into_owned()
}

/// Build a short digest from the leading sentences of `text`.
///
/// Sentences are joined with `。` while they fit in `max_length`; the first
/// one that does not fit ends the digest and the rest is dropped. If not even
/// the first sentence fits, the cleaned text is hard-truncated and `...` is
/// appended.
pub fn summarize_excerpt(text: &str, max_length: usize) -> String {
    let clean = strip_html(text);

    let mut summary = String::new();
    let mut current_length = 0;

    for sentence in clean.split(is_delimiter) {
        let sentence = sentence.trim();
        if sentence.is_empty() {
            continue;
        }

        let sentence_len = char_len(sentence);
        if current_length + sentence_len + 1 > max_length {
            break;
        }

        if !summary.is_empty() {
            summary.push('。');
        }
        summary.push_str(sentence);
        current_length += sentence_len + 1;
    }

    if summary.is_empty() {
        let truncated: String = clean.chars().take(max_length).collect();
        return format!("{truncated}...");
    }

    if !summary.ends_with('。') {
        summary.push('。');
    }
    summary
}

fn is_soft_break(c: char) -> bool {
    is_delimiter(c) || c.is_whitespace()
}

/// Split long text into overlapping windows of about `chunk_size` chars.
///
/// Each window prefers to end on a sentence delimiter or whitespace found in
/// its back half. Consecutive windows share up to `overlap` chars, capped at
/// half the chunk size.
pub fn split_documents(
    text: &str,
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<String>, ChunkError> {
    if chunk_size == 0 {
        return Err(ChunkError::InvalidMaxLength);
    }

    let overlap = overlap.min(chunk_size / 2);
    let chars: Vec<char> = text.chars().collect();
    let mut documents = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let mut end = (start + chunk_size).min(chars.len());

        if end < chars.len() {
            let floor = start + chunk_size / 2;
            if let Some(pos) = (floor..end).rev().find(|&i| is_soft_break(chars[i])) {
                end = pos + 1;
            }
        }

        let document: String = chars[start..end].iter().collect();
        let document = document.trim();
        if !document.is_empty() {
            documents.push(document.to_string());
        }

        if end == chars.len() {
            break;
        }
        start = end.saturating_sub(overlap).max(start + 1);
    }

    Ok(documents)
}
