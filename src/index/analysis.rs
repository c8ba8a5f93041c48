//! Turning field values into index terms.
//!
//! Free text is split into word tokens (`\w+(\.\w+)*`, so `v1.2` and
//! `example.com` stay whole), lowercased, and stripped of stop words and
//! one-character tokens. Keyword fields split on commas and keep case.

use std::sync::LazyLock;

use regex::Regex;

static WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\w+(?:\.?\w+)*").expect("word pattern is valid"));

/// Tokens too common to be worth indexing.
pub const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "can", "for", "from", "have", "if", "in",
    "is", "it", "may", "not", "of", "on", "or", "tbd", "that", "the", "this", "to", "us", "we",
    "when", "will", "with", "yet", "you", "your",
];

/// Tokens shorter than this are dropped from text fields.
const MIN_TOKEN_CHARS: usize = 2;

/// Analyze free text into lowercase word terms, in order of appearance.
pub fn text_terms(text: &str) -> Vec<String> {
    WORD.find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .filter(|t| t.chars().count() >= MIN_TOKEN_CHARS && !STOP_WORDS.contains(&t.as_str()))
        .collect()
}

/// Split a comma-joined keyword list into trimmed, non-empty terms.
pub fn keyword_terms(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Remove later duplicates, keeping first-occurrence order.
pub fn unique<T: PartialEq + Clone>(items: &[T]) -> Vec<T> {
    let mut out: Vec<T> = Vec::with_capacity(items.len());
    for item in items {
        if !out.contains(item) {
            out.push(item.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_terms_lowercase_and_stop_words() {
        assert_eq!(
            text_terms("The Quarterly REPORT is in the folder"),
            vec!["quarterly", "report", "folder"]
        );
    }

    #[test]
    fn test_text_terms_keep_dotted_words() {
        assert_eq!(
            text_terms("mail bob@example.com about v1.2!"),
            vec!["mail", "bob", "example.com", "about", "v1.2"]
        );
    }

    #[test]
    fn test_text_terms_drop_single_chars() {
        assert_eq!(text_terms("x y zz"), vec!["zz"]);
    }

    #[test]
    fn test_keyword_terms() {
        assert_eq!(
            keyword_terms(" a@x.org,b@y.org , ,Inbox"),
            vec!["a@x.org", "b@y.org", "Inbox"]
        );
        assert!(keyword_terms("").is_empty());
    }

    #[test]
    fn test_unique_keeps_first() {
        assert_eq!(unique(&["b", "a", "b", "c", "a"]), vec!["b", "a", "c"]);
    }
}
