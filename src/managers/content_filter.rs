//! Pattern list for removing unwanted group messages.
//!
//! The file holds one pattern per line; blank lines and `#` comments are
//! skipped. Each line is read as the first of these that applies:
//!
//! - `/body/flags` is a regular expression (`i`, `m` and `s` flags honored)
//! - text containing `*` or `?` is a wildcard, matched anywhere in the message
//! - `"text"` is a case-sensitive substring
//! - anything else is a case-insensitive substring

use regex::{Regex, RegexBuilder};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::error::{BotError, Result};

#[derive(Debug)]
enum Pattern {
    Regex(Regex),
    Exact(String),
    Folded(String),
}

impl Pattern {
    fn parse(line: &str) -> Result<Self> {
        if let Some((body, flags)) = split_regex_literal(line) {
            let mut builder = RegexBuilder::new(body);
            for flag in flags.chars() {
                match flag {
                    'i' => builder.case_insensitive(true),
                    'm' => builder.multi_line(true),
                    's' => builder.dot_matches_new_line(true),
                    _ => &mut builder,
                };
            }
            return compile(line, builder.build()).map(Pattern::Regex);
        }

        if line.contains(['*', '?']) {
            return compile(line, Regex::new(&wildcard_to_regex(line))).map(Pattern::Regex);
        }

        if line.len() >= 2 && line.starts_with('"') && line.ends_with('"') {
            return Ok(Pattern::Exact(line[1..line.len() - 1].to_string()));
        }

        Ok(Pattern::Folded(line.to_lowercase()))
    }

    fn is_match(&self, text: &str, folded: &str) -> bool {
        match self {
            Pattern::Regex(regex) => regex.is_match(text),
            Pattern::Exact(needle) => text.contains(needle.as_str()),
            Pattern::Folded(needle) => folded.contains(needle.as_str()),
        }
    }
}

fn compile(line: &str, built: std::result::Result<Regex, regex::Error>) -> Result<Regex> {
    built.map_err(|source| BotError::FilterPattern {
        pattern: line.to_string(),
        source,
    })
}

/// `/body/flags` with a non-empty body
fn split_regex_literal(line: &str) -> Option<(&str, &str)> {
    let rest = line.strip_prefix('/')?;
    let end = rest.rfind('/')?;
    if end == 0 {
        return None;
    }
    Some((&rest[..end], &rest[end + 1..]))
}

/// `*` is any run of characters, `?` exactly one; everything else is literal
fn wildcard_to_regex(pattern: &str) -> String {
    let mut regex = String::with_capacity(pattern.len() * 2);
    for c in pattern.chars() {
        match c {
            '*' => regex.push_str(".*"),
            '?' => regex.push('.'),
            other => regex.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }
    regex
}

#[derive(Debug, Default)]
pub struct ContentFilter {
    patterns: Vec<Pattern>,
}

impl ContentFilter {
    pub fn parse(source: &str) -> Result<Self> {
        let patterns = source
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(Pattern::parse)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// Read the pattern file. A missing file means nothing is filtered; a
    /// pattern that does not compile is an error.
    pub async fn load(path: &Path) -> Result<Self> {
        let source = match tokio::fs::read_to_string(path).await {
            Ok(source) => source,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No content filter at {}, filtering disabled", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(BotError::StateLoad {
                    path: path.display().to_string(),
                    source,
                })
            }
        };

        let filter = Self::parse(&source)?;
        info!("Loaded {} content filter pattern(s) from {}", filter.len(), path.display());
        Ok(filter)
    }

    /// Whether any pattern matches `text`
    pub fn matches(&self, text: &str) -> bool {
        let folded = text.to_lowercase();
        self.patterns.iter().any(|p| p.is_match(text, &folded))
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Shared content filter type
pub type SharedContentFilter = Arc<ContentFilter>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_patterns_ignore_case() {
        let filter = ContentFilter::parse("Casino\n").unwrap();
        assert!(filter.matches("best CASINO bonuses"));
        assert!(!filter.matches("casual chat"));
    }

    #[test]
    fn test_quoted_patterns_keep_case() {
        let filter = ContentFilter::parse("\"USDT\"").unwrap();
        assert!(filter.matches("cheap USDT here"));
        assert!(!filter.matches("cheap usdt here"));
    }

    #[test]
    fn test_wildcards_match_anywhere() {
        let filter = ContentFilter::parse("free*money\nv?agra").unwrap();
        assert!(filter.matches("get free easy money now"));
        assert!(filter.matches("cheap v1agra"));
        assert!(!filter.matches("money for free"));
        // Regex metacharacters in wildcards are literal
        let filter = ContentFilter::parse("a.b*").unwrap();
        assert!(filter.matches("xa.bz"));
        assert!(!filter.matches("axbz"));
    }

    #[test]
    fn test_regex_literals_and_flags() {
        let filter = ContentFilter::parse("/t\\.me/\\w+/i").unwrap();
        assert!(filter.matches("join T.ME/spamgroup"));
        assert!(!filter.matches("tme spam"));

        let filter = ContentFilter::parse("/^buy$/").unwrap();
        assert!(filter.matches("buy"));
        assert!(!filter.matches("Buy"));
    }

    #[test]
    fn test_comments_and_blank_lines_are_skipped() {
        let filter = ContentFilter::parse("# spam words\n\n   \nspam\n").unwrap();
        assert_eq!(filter.len(), 1);
        assert!(!ContentFilter::default().matches("anything"));
    }

    #[test]
    fn test_bad_regex_is_reported() {
        assert!(matches!(
            ContentFilter::parse("/(unclosed/"),
            Err(BotError::FilterPattern { pattern, .. }) if pattern == "/(unclosed/"
        ));
    }

    #[tokio::test]
    async fn test_missing_file_disables_filtering() {
        let path = std::env::temp_dir().join(format!("filter-{}.txt", uuid::Uuid::new_v4()));
        let filter = ContentFilter::load(&path).await.unwrap();
        assert!(filter.is_empty());

        tokio::fs::write(&path, "spam\n\"Scam\"\n").await.unwrap();
        let filter = ContentFilter::load(&path).await.unwrap();
        assert_eq!(filter.len(), 2);
        assert!(filter.matches("SPAM"));

        tokio::fs::remove_file(&path).await.ok();
    }
}
