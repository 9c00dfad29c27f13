//! Text cleanup for fetched pages and the summary length instruction.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

static SCRIPT_OR_STYLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<(script|style)[^>]*>.*?</(script|style)>").unwrap());
static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());
static SPECIAL_TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<\|[^|]*\|>").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Remove markup, model special tokens and NULs, then collapse whitespace.
pub fn clean_text(text: &str) -> String {
    // Special tokens look like tags, so strip them first
    let text = SPECIAL_TOKEN.replace_all(text, "");
    let text = SCRIPT_OR_STYLE.replace_all(&text, " ");
    let text = HTML_TAG.replace_all(&text, "");
    let text = text.replace('\0', "");
    WHITESPACE.replace_all(&text, " ").trim().to_string()
}

/// How long a generated summary should be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryLength {
    Short,
    Medium,
    Long,
    /// Roughly this many characters.
    Chars(u32),
}

impl Default for SummaryLength {
    fn default() -> Self {
        Self::Medium
    }
}

impl FromStr for SummaryLength {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "short" | "brief" => Ok(Self::Short),
            "medium" | "normal" => Ok(Self::Medium),
            "long" | "detailed" => Ok(Self::Long),
            other => other
                .parse::<u32>()
                .map(Self::Chars)
                .map_err(|_| format!("unknown summary length '{s}' (short|medium|long|<chars>)")),
        }
    }
}

impl fmt::Display for SummaryLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Short => write!(f, "short"),
            Self::Medium => write!(f, "medium"),
            Self::Long => write!(f, "long"),
            Self::Chars(n) => write!(f, "{n}"),
        }
    }
}

impl SummaryLength {
    /// Prompt instruction telling the model how long to write.
    pub fn instruction(&self) -> String {
        let length = match self {
            Self::Short => "簡潔に2-3文で要約してください。".to_string(),
            Self::Medium => "適度な長さ（5-8文程度）で要約してください。".to_string(),
            Self::Long => "詳細に10-15文程度で要約してください。".to_string(),
            Self::Chars(n) => format!("約{n}文字程度で要約してください。"),
        };
        format!(
            "{length}要約は日本語で行ってください。\
             記事のタイトルとして抽出できそうな部分があれば、1行目にタイトルを記載してください。"
        )
    }
}
