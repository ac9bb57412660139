//! Keyword matching shared by the classifiers.
//!
//! Word-like markers ("ok", "good night") match on token boundaries so that
//! "hii" is not "hi" and "book" is not "ok". Symbol markers (emoji, ":)")
//! match as plain substrings.

use std::collections::HashSet;

const TERMINAL_PUNCTUATION: &[char] = &['.', '!', '?', '।'];

pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Lowercased whitespace tokens with surrounding punctuation stripped.
pub fn tokens(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|t| {
            t.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|t| !t.is_empty())
        .collect()
}

/// `@handle` tokens, lowercased, trailing punctuation removed.
pub fn mention_tokens(text: &str) -> Vec<String> {
    text.split_whitespace()
        .filter(|t| t.starts_with('@') && t.len() > 1)
        .map(|t| {
            t.trim_end_matches(|c: char| !c.is_alphanumeric() && c != '_')
                .to_lowercase()
        })
        .collect()
}

/// Phrase occurs as a contiguous run of whole tokens.
pub fn contains_word(text: &str, phrase: &str) -> bool {
    let needle = tokens(phrase);
    if needle.is_empty() {
        return false;
    }
    let hay = tokens(text);
    hay.windows(needle.len()).any(|w| w == needle.as_slice())
}

pub fn matches_marker(text: &str, marker: &str) -> bool {
    if marker.chars().any(char::is_alphanumeric) {
        contains_word(text, marker)
    } else {
        !marker.is_empty() && text.to_lowercase().contains(marker)
    }
}

pub fn matches_any<S: AsRef<str>>(text: &str, markers: &[S]) -> bool {
    markers.iter().any(|m| matches_marker(text, m.as_ref()))
}

/// The whole message is one of `phrases`, ignoring case and punctuation.
pub fn matches_whole<S: AsRef<str>>(text: &str, phrases: &[S]) -> bool {
    let hay = tokens(text);
    !hay.is_empty() && phrases.iter().any(|p| tokens(p.as_ref()) == hay)
}

/// Number of distinct markers present in `text`.
pub fn count_markers<S: AsRef<str>>(text: &str, markers: &[S]) -> usize {
    markers
        .iter()
        .filter(|m| matches_marker(text, m.as_ref()))
        .count()
}

pub fn ends_with_terminal_punctuation(text: &str) -> bool {
    text.trim_end()
        .chars()
        .last()
        .map(|c| TERMINAL_PUNCTUATION.contains(&c))
        .unwrap_or(false)
}

pub fn shares_vocabulary(a: &str, b: &str) -> bool {
    let left: HashSet<String> = tokens(a).into_iter().collect();
    tokens(b).iter().any(|t| left.contains(t))
}
