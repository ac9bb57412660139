//! Keyword-driven mood classification.

use rapport_core::lexicon::count_markers;
use rapport_core::{HistoryEntry, Mood, MoodMarkers};

/// Entries inspected when classifying mood.
pub const MOOD_WINDOW: usize = 5;

/// Messages longer than this read as serious when no marker fires.
const SERIOUS_LENGTH: usize = 50;

/// Classify the mood of the last few entries.
///
/// Highest marker count wins, ties go to the earlier category. With no
/// marker hits: any long message means `Serious`, any `?` means `Curious`,
/// otherwise `Neutral`.
pub fn analyze_mood(entries: &[HistoryEntry], markers: &MoodMarkers) -> Mood {
    let window = &entries[entries.len().saturating_sub(MOOD_WINDOW)..];

    let mut best = (Mood::Neutral, 0usize);
    for (mood, list) in markers.ordered() {
        let score: usize = window.iter().map(|e| count_markers(&e.text, list)).sum();
        if score > best.1 {
            best = (mood, score);
        }
    }
    if best.1 > 0 {
        return best.0;
    }

    if window.iter().any(|e| e.text.chars().count() > SERIOUS_LENGTH) {
        Mood::Serious
    } else if window.iter().any(|e| e.text.contains('?')) {
        Mood::Curious
    } else {
        Mood::Neutral
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rapport_core::PersonaProfile;

    fn entries(texts: &[&str]) -> Vec<HistoryEntry> {
        texts
            .iter()
            .map(|t| HistoryEntry {
                sender_id: "u1".into(),
                text: t.to_string(),
                timestamp: Utc::now(),
                is_agent: false,
            })
            .collect()
    }

    fn markers() -> MoodMarkers {
        PersonaProfile::default().mood_markers
    }

    #[test]
    fn test_highest_count_wins() {
        let e = entries(&["haha lol", "wtf"]);
        assert_eq!(analyze_mood(&e, &markers()), Mood::Happy);
    }

    #[test]
    fn test_tie_goes_to_declaration_order() {
        // one happy marker, one angry marker
        let e = entries(&["nice", "wtf"]);
        assert_eq!(analyze_mood(&e, &markers()), Mood::Happy);
        let e = entries(&["sad", "noob"]);
        assert_eq!(analyze_mood(&e, &markers()), Mood::Sad);
    }

    #[test]
    fn test_only_last_five_entries_count() {
        let e = entries(&["wtf wtf stfu", "a", "b", "c", "d", "e"]);
        assert_eq!(analyze_mood(&e, &markers()), Mood::Neutral);
    }

    #[test]
    fn test_fallbacks() {
        let long = "a".repeat(51);
        assert_eq!(analyze_mood(&entries(&[&long, "kab?"]), &markers()), Mood::Serious);
        assert_eq!(analyze_mood(&entries(&["kab aayega?"]), &markers()), Mood::Curious);
        assert_eq!(analyze_mood(&entries(&["chal"]), &markers()), Mood::Neutral);
        assert_eq!(analyze_mood(&[], &markers()), Mood::Neutral);
    }

    #[test]
    fn test_emoji_markers() {
        assert_eq!(analyze_mood(&entries(&["🔥🔥"]), &markers()), Mood::Excited);
    }
}
