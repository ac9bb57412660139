use chrono::{DateTime, FixedOffset, Timelike, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use rapport_core::{hour_in_window, PersonaProfile, ScheduleConfig};
use regex::Regex;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

static EMPHASIS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*{1,3}").unwrap());
static LABEL_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(response|reply|answer|assistant)\s*:\s*").unwrap()
});
static TRAILING_SECTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)\n\s*\(?(analysis|translation|note|explanation)\s*:.*$").unwrap()
});

/// Morning replies come a little slower than daytime ones.
const MORNING: (u32, u32) = (6, 9);
/// Characters typed between short pauses.
const PAUSE_EVERY_CHARS: usize = 20;

/// Human-like pacing and canned lines for the persona.
pub struct Humanizer {
    persona: Arc<PersonaProfile>,
    offset: FixedOffset,
    night: (u32, u32),
}

impl Humanizer {
    pub fn new(persona: Arc<PersonaProfile>, schedule: &ScheduleConfig) -> Self {
        Self {
            persona,
            offset: schedule.utc_offset(),
            night: (schedule.night_start_hour, schedule.night_end_hour),
        }
    }

    /// Delay before the agent starts typing.
    pub fn initial_delay<R: Rng + ?Sized>(&self, now: DateTime<Utc>, rng: &mut R) -> Duration {
        let hour = now.with_timezone(&self.offset).hour();
        let base = if hour_in_window(hour, self.night.0, self.night.1) {
            rng.gen_range(3.0..8.0)
        } else if hour_in_window(hour, MORNING.0, MORNING.1) {
            rng.gen_range(1.5..4.0)
        } else {
            rng.gen_range(1.0..3.0)
        };
        // occasionally distracted
        let extra = if rng.gen_bool(0.2) {
            rng.gen_range(2.0..5.0)
        } else {
            0.0
        };
        Duration::from_secs_f64(base + extra)
    }

    /// Time spent "typing" a reply: 4-7 chars/sec plus a short pause every
    /// few words.
    pub fn typing_duration<R: Rng + ?Sized>(&self, text: &str, rng: &mut R) -> Duration {
        let chars = text.chars().count();
        let speed: f64 = rng.gen_range(4.0..7.0);
        let mut secs = chars as f64 / speed;
        for _ in 0..chars / PAUSE_EVERY_CHARS {
            secs += rng.gen_range(0.5..1.5);
        }
        Duration::from_secs_f64(secs)
    }

    /// Canned reply for when the agent is woken up.
    pub fn sleepy_line<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        self.persona
            .sleepy_lines
            .choose(rng)
            .cloned()
            .unwrap_or_else(|| "zzz".to_string())
    }

    /// Minimal acknowledgement used when generation fails.
    pub fn filler_line<R: Rng + ?Sized>(&self, at_night: bool, rng: &mut R) -> String {
        if at_night {
            return self.persona.night_filler.clone();
        }
        self.persona
            .filler_lines
            .choose(rng)
            .cloned()
            .unwrap_or_else(|| self.persona.night_filler.clone())
    }

    pub fn clean(&self, text: &str) -> String {
        clean_response(text, &self.persona)
    }
}

/// Strip formatting artifacts from generated text: markdown emphasis,
/// speaker labels, wrapping quotes and trailing commentary sections.
pub fn clean_response(text: &str, persona: &PersonaProfile) -> String {
    let text = TRAILING_SECTION.replace(text, "");
    let text = EMPHASIS.replace_all(&text, "");
    let mut text = LABEL_PREFIX.replace(&text, "").trim().to_string();

    let mut labels: Vec<String> = persona
        .name_aliases
        .iter()
        .map(|n| n.to_lowercase())
        .collect();
    labels.push(persona.display_name.to_lowercase());
    // longest first so "avinash patel:" wins over "avinash:"
    labels.sort_by_key(|l| std::cmp::Reverse(l.len()));
    for label in &labels {
        let lower = text.to_lowercase();
        if lower.len() != text.len() {
            break;
        }
        if let Some(rest) = lower.strip_prefix(label.as_str()) {
            if rest.trim_start().starts_with(':') {
                let cut = text.len() - rest.trim_start().len() + 1;
                text = text[cut..].trim().to_string();
                break;
            }
        }
    }

    let quoted = text.len() >= 2
        && ((text.starts_with('"') && text.ends_with('"'))
            || (text.starts_with('\'') && text.ends_with('\'')));
    if quoted {
        text = text[1..text.len() - 1].trim().to_string();
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn humanizer() -> Humanizer {
        Humanizer::new(Arc::new(PersonaProfile::default()), &ScheduleConfig::default())
    }

    fn ist(hour: u32) -> DateTime<Utc> {
        FixedOffset::east_opt(330 * 60)
            .unwrap()
            .with_ymd_and_hms(2026, 3, 10, hour, 0, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_clean_response() {
        let persona = PersonaProfile::default();
        assert_eq!(clean_response("**haan bhai** bol", &persona), "haan bhai bol");
        assert_eq!(clean_response("Avinash Patel: kya scene", &persona), "kya scene");
        assert_eq!(clean_response("avii : arre", &persona), "arre");
        assert_eq!(clean_response("Response: \"chal theek\"", &persona), "chal theek");
        assert_eq!(
            clean_response("bas chill\n\nAnalysis: the user is bored", &persona),
            "bas chill"
        );
        assert_eq!(clean_response("patel bhai kaha ho", &persona), "patel bhai kaha ho");
    }

    #[test]
    fn test_delays_by_time_of_day() {
        let h = humanizer();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let night = h.initial_delay(ist(23), &mut rng).as_secs_f64();
            assert!((3.0..13.0).contains(&night));
            let morning = h.initial_delay(ist(8), &mut rng).as_secs_f64();
            assert!((1.5..9.0).contains(&morning));
            let day = h.initial_delay(ist(16), &mut rng).as_secs_f64();
            assert!((1.0..8.0).contains(&day));
        }
    }

    #[test]
    fn test_morning_window_ends_at_nine() {
        let h = humanizer();
        let mut rng = StdRng::seed_from_u64(11);
        let at_eight: Vec<f64> = (0..200).map(|_| h.initial_delay(ist(8), &mut rng).as_secs_f64()).collect();
        let at_ten: Vec<f64> = (0..200).map(|_| h.initial_delay(ist(10), &mut rng).as_secs_f64()).collect();
        assert!(at_eight.iter().all(|d| *d >= 1.5));
        // daytime range starts at 1.0
        assert!(at_ten.iter().any(|d| *d < 1.5));
    }

    #[test]
    fn test_typing_scales_with_length() {
        let h = humanizer();
        let mut rng = StdRng::seed_from_u64(9);
        let short = h.typing_duration("hmm", &mut rng).as_secs_f64();
        assert!(short < 1.0);
        let long = h.typing_duration(&"a".repeat(70), &mut rng).as_secs_f64();
        // 70/7 + 3 pauses of at least 0.5s
        assert!(long >= 11.5);
    }

    #[test]
    fn test_canned_lines() {
        let h = humanizer();
        let mut rng = StdRng::seed_from_u64(11);
        assert_eq!(h.filler_line(true, &mut rng), "hmm");
        let day = h.filler_line(false, &mut rng);
        assert!(PersonaProfile::default().filler_lines.contains(&day));
        assert!(h.sleepy_line(&mut rng).contains("subah") || h.sleepy_line(&mut rng).contains("Zzz"));
    }
}
