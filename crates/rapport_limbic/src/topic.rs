//! Topic detection against the persona's ordered keyword table.

use rapport_core::lexicon::matches_any;
use rapport_core::{HistoryEntry, TopicKeywords};

/// Recent entries scanned together with the current message.
pub const TOPIC_CONTEXT: usize = 3;

/// First table entry with a keyword in the message or recent context.
///
/// `None` means "general"; callers convert with `Topic::from`.
pub fn detect_topic(
    message: &str,
    recent: &[HistoryEntry],
    table: &[TopicKeywords],
) -> Option<String> {
    let context = &recent[recent.len().saturating_sub(TOPIC_CONTEXT)..];
    let texts: Vec<&str> = std::iter::once(message)
        .chain(context.iter().map(|e| e.text.as_str()))
        .collect();

    table
        .iter()
        .find(|t| texts.iter().any(|text| matches_any(text, &t.keywords)))
        .map(|t| t.name.clone())
}
