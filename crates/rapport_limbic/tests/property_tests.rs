//! Property-based tests for conversation state and the circadian scheduler.

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use rapport_core::{HistoryEntry, PersonaProfile, ScheduleConfig};
use rapport_limbic::{ConversationRecord, PersonaScheduler, MAX_HISTORY};
use std::sync::Arc;

fn timestamp(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

proptest! {
    #[test]
    fn record_never_exceeds_bound(texts in prop::collection::vec("[a-z ?!]{0,20}", 0..60)) {
        let persona = PersonaProfile::default();
        let mut record = ConversationRecord::default();
        for (i, text) in texts.iter().enumerate() {
            let entry = HistoryEntry {
                sender_id: format!("u{}", i % 3),
                text: text.clone(),
                timestamp: timestamp(i as i64),
                is_agent: i % 4 == 0,
            };
            record.push(entry, &persona);
            prop_assert!(record.len() <= MAX_HISTORY);
        }
        prop_assert_eq!(record.len(), texts.len().min(MAX_HISTORY));
    }

    #[test]
    fn sleep_state_is_a_pure_function_of_time(secs in 0i64..(366 * 86_400), privileged in any::<bool>()) {
        let scheduler = PersonaScheduler::new(Arc::new(PersonaProfile::default()), ScheduleConfig::default());
        let now = timestamp(secs);
        let first = scheduler.sleep_state(now, privileged);
        let second = scheduler.sleep_state(now, privileged);
        prop_assert_eq!(&first, &second);
        if privileged {
            prop_assert!(!first.is_sleeping);
        }
        if first.is_sleeping {
            let start = first.sleep_started_at.unwrap();
            let wake = first.wake_at.unwrap();
            prop_assert!(start <= now && now < wake);
            prop_assert!(wake - start <= Duration::hours(24));
        }
    }
}
