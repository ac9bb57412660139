//! Circadian persona scheduling.
//!
//! Both the behavior profile and the sleep state are pure functions of the
//! wall clock and the sender's privilege; nothing is cached between calls.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, TimeZone, Timelike, Utc};
use rapport_core::{hour_in_window, BehaviorProfile, PersonaProfile, PersonaState, ScheduleConfig};
use std::sync::Arc;

pub struct PersonaScheduler {
    persona: Arc<PersonaProfile>,
    schedule: ScheduleConfig,
    offset: FixedOffset,
}

impl PersonaScheduler {
    pub fn new(persona: Arc<PersonaProfile>, schedule: ScheduleConfig) -> Self {
        let offset = schedule.utc_offset();
        Self {
            persona,
            schedule,
            offset,
        }
    }

    pub fn local_hour(&self, now: DateTime<Utc>) -> u32 {
        now.with_timezone(&self.offset).hour()
    }

    /// Late evening through early morning, local time.
    pub fn is_night(&self, now: DateTime<Utc>) -> bool {
        hour_in_window(
            self.local_hour(now),
            self.schedule.night_start_hour,
            self.schedule.night_end_hour,
        )
    }

    /// Behavior profile for the local hour. Privileged senders always get the
    /// privileged profile; uncovered hours fall back to the neutral profile.
    pub fn profile(&self, now: DateTime<Utc>, privileged: bool) -> BehaviorProfile {
        if privileged {
            return self.persona.privileged_profile.clone();
        }
        let hour = self.local_hour(now);
        match self.persona.day_part_for_hour(hour) {
            Some(part) => part.profile.clone(),
            None => {
                tracing::debug!("No day part covers hour {}, using neutral profile", hour);
                self.persona.neutral_profile.clone()
            }
        }
    }

    pub fn sleep_state(&self, now: DateTime<Utc>, privileged: bool) -> PersonaState {
        let (start, end) = (self.schedule.sleep_start_hour, self.schedule.sleep_end_hour);
        let local = now.with_timezone(&self.offset);
        let hour = local.hour();

        if privileged || !hour_in_window(hour, start, end) {
            return PersonaState::default();
        }

        let today = local.date_naive();
        let yesterday = today.pred_opt().unwrap_or(today);
        let tomorrow = today.succ_opt().unwrap_or(today);

        // A wrapping window entered before midnight started yesterday and ends today.
        let wraps = start > end;
        let started_on = if wraps && hour < end { yesterday } else { today };
        let wakes_on = if wraps && hour >= start { tomorrow } else { today };

        PersonaState {
            is_sleeping: true,
            sleep_started_at: self.at_local_hour(started_on, start),
            wake_at: self.at_local_hour(wakes_on, end),
        }
    }

    /// Time left until wake-up, zero when awake.
    pub fn time_until_wake(&self, now: DateTime<Utc>, privileged: bool) -> Duration {
        self.sleep_state(now, privileged)
            .wake_at
            .map(|wake| (wake - now).max(Duration::zero()))
            .unwrap_or_else(Duration::zero)
    }

    fn at_local_hour(&self, date: NaiveDate, hour: u32) -> Option<DateTime<Utc>> {
        let naive = date.and_hms_opt(hour, 0, 0)?;
        self.offset
            .from_local_datetime(&naive)
            .single()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 2026-03-10 at the given IST hour:minute.
    fn ist(hour: u32, minute: u32) -> DateTime<Utc> {
        let offset = FixedOffset::east_opt(330 * 60).unwrap();
        offset
            .with_ymd_and_hms(2026, 3, 10, hour, minute, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn scheduler() -> PersonaScheduler {
        PersonaScheduler::new(Arc::new(PersonaProfile::default()), ScheduleConfig::default())
    }

    #[test]
    fn test_sleeps_inside_window() {
        let s = scheduler();
        let state = s.sleep_state(ist(3, 0), false);
        assert!(state.is_sleeping);
        assert_eq!(state.sleep_started_at, Some(ist(2, 0)));
        assert_eq!(state.wake_at, Some(ist(6, 0)));
        assert_eq!(s.time_until_wake(ist(3, 0), false), Duration::hours(3));
    }

    #[test]
    fn test_awake_outside_window() {
        let s = scheduler();
        assert!(!s.sleep_state(ist(1, 59), false).is_sleeping);
        assert!(!s.sleep_state(ist(6, 0), false).is_sleeping);
        assert!(!s.sleep_state(ist(14, 0), false).is_sleeping);
    }

    #[test]
    fn test_privileged_never_sleeps() {
        let s = scheduler();
        assert_eq!(s.sleep_state(ist(3, 0), true), PersonaState::default());
        assert_eq!(s.profile(ist(3, 0), true).name, "close friend");
    }

    #[test]
    fn test_sleep_state_is_idempotent() {
        let s = scheduler();
        let now = ist(4, 30);
        assert_eq!(s.sleep_state(now, false), s.sleep_state(now, false));
    }

    #[test]
    fn test_wrapping_sleep_window() {
        let schedule = ScheduleConfig {
            sleep_start_hour: 23,
            sleep_end_hour: 5,
            ..Default::default()
        };
        let s = PersonaScheduler::new(Arc::new(PersonaProfile::default()), schedule);

        let late = s.sleep_state(ist(23, 30), false);
        assert!(late.is_sleeping);
        assert_eq!(late.sleep_started_at, Some(ist(23, 0)));
        assert_eq!(late.wake_at, Some(ist(5, 0) + Duration::days(1)));

        let early = s.sleep_state(ist(1, 0), false);
        assert_eq!(early.sleep_started_at, Some(ist(23, 0) - Duration::days(1)));
        assert_eq!(early.wake_at, Some(ist(5, 0)));
    }

    #[test]
    fn test_profile_by_hour() {
        let s = scheduler();
        assert_eq!(s.profile(ist(7, 0), false).name, "groggy");
        assert_eq!(s.profile(ist(20, 0), false).name, "night");
        assert!(s.is_night(ist(23, 0)));
        assert!(!s.is_night(ist(12, 0)));
    }

    #[test]
    fn test_uncovered_hour_uses_neutral_profile() {
        let persona = PersonaProfile {
            day_parts: vec![],
            ..Default::default()
        };
        let s = PersonaScheduler::new(Arc::new(persona), ScheduleConfig::default());
        assert_eq!(s.profile(ist(12, 0), false).name, "neutral");
    }
}
