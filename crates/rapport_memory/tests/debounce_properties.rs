//! Property tests for the debounce buffer.

use chrono::{DateTime, Duration, Utc};
use proptest::prelude::*;
use rapport_core::{DebounceConfig, PersonaProfile};
use rapport_memory::{Completion, DebounceBuffer};

fn start() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap()
}

proptest! {
    /// Every fragment ends up in exactly one utterance, in order, and no
    /// utterance mixes fragments across a completion.
    #[test]
    fn fragments_flush_exactly_once(
        steps in prop::collection::vec(("[a-z]{1,6}[.?]?", 0i64..3_000), 1..40)
    ) {
        let mut buffer = DebounceBuffer::new(&DebounceConfig::default(), &PersonaProfile::default());
        let mut now = start();
        let mut emitted = Vec::new();

        for (text, gap_ms) in &steps {
            now += Duration::milliseconds(*gap_ms);
            for f in buffer.flush_due(now) {
                emitted.push(f.utterance.text);
            }
            if let Completion::Complete(f) = buffer.append("g1", "u1", text, now) {
                emitted.push(f.utterance.text);
            }
            prop_assert!(buffer.open_buffers() <= 1);
        }
        if let Some(f) = buffer.flush("g1", "u1") {
            emitted.push(f.utterance.text);
        }
        prop_assert!(buffer.flush("g1", "u1").is_none());

        let expected: Vec<String> = steps.iter().map(|(t, _)| t.clone()).collect();
        let rejoined: Vec<String> = emitted
            .iter()
            .flat_map(|u| u.split(' ').map(str::to_string))
            .collect();
        prop_assert_eq!(rejoined, expected);

        // terminal punctuation only ever appears at the end of an utterance
        for u in &emitted {
            let inner = &u[..u.len().saturating_sub(1)];
            prop_assert!(!inner.contains('.') && !inner.contains('?'), "{}", u);
        }
    }
}
