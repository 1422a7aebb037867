//! Engagement count parsing.
//!
//! Counts are rendered as short strings such as `1,234`, `12.5K` or `3M`. Extraction keeps the
//! raw string; [`parse_count`] turns it into an integer when a caller needs one.

use std::sync::OnceLock;

use regex::Regex;

/// Vocabulary a count can be tagged with inside free text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountTag {
    Likes,
    Comments,
    Posts,
    Followers,
    Following,
}

impl CountTag {
    const ALL: [CountTag; 5] = [
        CountTag::Likes,
        CountTag::Comments,
        CountTag::Posts,
        CountTag::Followers,
        CountTag::Following,
    ];

    fn vocabulary(self) -> &'static str {
        match self {
            CountTag::Likes => "likes?",
            CountTag::Comments => "comments?",
            CountTag::Posts => "posts?",
            CountTag::Followers => "followers?",
            CountTag::Following => "following",
        }
    }
}

fn tagged_pattern(tag: CountTag) -> &'static Regex {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    let patterns = PATTERNS.get_or_init(|| {
        CountTag::ALL
            .iter()
            .map(|tag| {
                let pattern = format!(
                    r"(?i)(\d+(?:,\d+)*(?:\.\d+)?[KMB]?)\s*{}\b",
                    tag.vocabulary()
                );
                Regex::new(&pattern).expect("valid regex")
            })
            .collect()
    });
    &patterns[tag as usize]
}

fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^\d+(?:,\d+)*(?:\.\d+)?[KMB]?$").expect("valid regex")
    })
}

/// First count in `text` followed by the vocabulary of `tag`, e.g. `"1.2K likes"` → `"1.2K"`.
pub fn find_tagged_count(text: &str, tag: CountTag) -> Option<String> {
    tagged_pattern(tag)
        .captures(text)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().to_string())
}

/// Whether a short text token looks like a bare count (`"87"`, `"1.2K"`, `"3,400"`).
pub fn is_count_token(token: &str) -> bool {
    token_pattern().is_match(token.trim())
}

/// Normalizes a raw count string. Thousands separators are ignored and `K`/`M`/`B` suffixes
/// scale the value; anything else yields `None`.
pub fn parse_count(raw: &str) -> Option<u64> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return None;
    }
    let (number, multiplier) = match cleaned.chars().last()?.to_ascii_uppercase() {
        'K' => (&cleaned[..cleaned.len() - 1], 1_000f64),
        'M' => (&cleaned[..cleaned.len() - 1], 1_000_000f64),
        'B' => (&cleaned[..cleaned.len() - 1], 1_000_000_000f64),
        _ => (cleaned.as_str(), 1f64),
    };
    if number.is_empty() || !number.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }
    let value: f64 = number.parse().ok()?;
    Some((value * multiplier).round() as u64)
}
