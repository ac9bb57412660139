//! Engagement gate: respond or stay quiet.
//!
//! Forced outcomes are checked first, in order. Anything left over is a
//! weighted coin flip whose probability is built from relationship, mood
//! and conversation signals, then clamped into the configured band.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rapport_core::{
    AddressReason, BehaviorProfile, DecisionReason, EngagementConfig, PersonaProfile,
    PersonaState, RelationshipMetrics, ResponseDecision, ResponseMode, Topic, Utterance,
};
use std::sync::Arc;

/// Signals gathered for one utterance.
#[derive(Debug, Clone)]
pub struct GateInput<'a> {
    pub utterance: &'a Utterance,
    pub address: Option<AddressReason>,
    pub targeted_elsewhere: bool,
    pub is_farewell: bool,
    pub is_greeting: bool,
    pub is_night: bool,
    pub persona_state: &'a PersonaState,
    pub profile: &'a BehaviorProfile,
    /// `None` when the store had nothing; baselines are used.
    pub metrics: Option<&'a RelationshipMetrics>,
    pub topic: &'a Topic,
    /// The agent spoke recently in this conversation.
    pub conversation_active: bool,
    /// Another member spoke just before this utterance.
    pub someone_else_replied: bool,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GateVerdict {
    pub decision: ResponseDecision,
    /// Persist "farewell observed now" for the sender.
    pub record_farewell: bool,
}

impl GateVerdict {
    fn respond(input: &GateInput<'_>, mode: ResponseMode, reason: DecisionReason) -> Self {
        Self {
            decision: ResponseDecision::respond(input.utterance, mode, reason),
            record_farewell: false,
        }
    }

    fn suppress(reason: DecisionReason) -> Self {
        Self {
            decision: ResponseDecision::suppress(reason),
            record_farewell: false,
        }
    }

    fn with_farewell(mut self) -> Self {
        self.record_farewell = true;
        self
    }
}

pub struct EngagementGate {
    config: EngagementConfig,
    persona: Arc<PersonaProfile>,
}

impl EngagementGate {
    pub fn new(config: EngagementConfig, persona: Arc<PersonaProfile>) -> Self {
        Self { config, persona }
    }

    pub fn config(&self) -> &EngagementConfig {
        &self.config
    }

    pub fn decide(&self, input: &GateInput<'_>) -> GateVerdict {
        self.decide_with_rng(input, &mut rand::thread_rng())
    }

    pub fn decide_with_rng<R: Rng + ?Sized>(&self, input: &GateInput<'_>, rng: &mut R) -> GateVerdict {
        let baseline = RelationshipMetrics::default();
        let metrics = input.metrics.unwrap_or(&baseline);

        if input.persona_state.is_sleeping {
            return match input.address {
                Some(by) => GateVerdict::respond(input, ResponseMode::Sleepy, DecisionReason::Addressed { by }),
                None => GateVerdict::suppress(DecisionReason::Sleeping),
            };
        }

        if input.is_farewell {
            return if input.is_night {
                GateVerdict::suppress(DecisionReason::FarewellAtNight).with_farewell()
            } else {
                GateVerdict::respond(input, ResponseMode::Farewell, DecisionReason::FarewellInDay)
                    .with_farewell()
            };
        }

        if let Some(by) = input.address {
            return GateVerdict::respond(input, ResponseMode::Normal, DecisionReason::Addressed { by });
        }

        if input.targeted_elsewhere {
            return GateVerdict::suppress(DecisionReason::TargetedElsewhere);
        }

        if let Some(last) = metrics.last_farewell_at {
            if input.now - last < Duration::seconds(self.config.farewell_cooldown_secs) {
                return GateVerdict::suppress(DecisionReason::FarewellCooldown);
            }
        }

        if input.is_greeting && metrics.relationship_level > self.config.trusted_greeting_level {
            return GateVerdict::respond(input, ResponseMode::Normal, DecisionReason::TrustedGreeting);
        }

        let probability = self.response_probability(input);
        let roll: f64 = rng.gen();
        let reason = DecisionReason::Sampled { probability, roll };
        if roll < probability {
            GateVerdict::respond(input, ResponseMode::Normal, reason)
        } else {
            GateVerdict::suppress(reason)
        }
    }

    /// A standing interest of the persona or a topic the current profile favors.
    fn is_interesting(&self, topic: &str, profile: &BehaviorProfile) -> bool {
        self.persona.is_interest(topic)
            || profile
                .topics_of_interest
                .iter()
                .any(|t| t.eq_ignore_ascii_case(topic))
    }

    /// Clamped probability of a spontaneous reply.
    pub fn response_probability(&self, input: &GateInput<'_>) -> f64 {
        let c = &self.config;
        let baseline = RelationshipMetrics::default();
        let m = input.metrics.unwrap_or(&baseline);

        let mut p = c.base_probability;
        p += f64::from(m.relationship_level.saturating_sub(1)) * c.relationship_step;
        p += f64::from(m.trust_level.saturating_sub(1)) * c.trust_step;

        if m.happiness_level > c.happy_threshold {
            p += c.happiness_adjustment;
        } else if m.happiness_level < c.unhappy_threshold {
            p -= c.happiness_adjustment;
        }

        if input.topic.name().is_some_and(|t| self.is_interesting(t, input.profile)) {
            p += c.interest_bonus;
        }
        if input.conversation_active {
            p += c.active_bonus;
        }
        if input.is_greeting {
            p += c.greeting_bonus;
        }
        if input.someone_else_replied {
            p -= c.interrupt_penalty;
        }
        p += input.profile.engagement_bias;

        p.clamp(c.min_probability, c.max_probability)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    struct Fixture {
        utterance: Utterance,
        state: PersonaState,
        profile: BehaviorProfile,
        topic: Topic,
    }

    impl Fixture {
        fn new(text: &str) -> Self {
            Self {
                utterance: Utterance {
                    conversation_id: "g1".into(),
                    sender_id: "u1".into(),
                    text: text.into(),
                    received_at: DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap(),
                },
                state: PersonaState::default(),
                profile: BehaviorProfile::default(),
                topic: Topic::General,
            }
        }

        fn input(&self) -> GateInput<'_> {
            GateInput {
                utterance: &self.utterance,
                address: None,
                targeted_elsewhere: false,
                is_farewell: false,
                is_greeting: false,
                is_night: false,
                persona_state: &self.state,
                profile: &self.profile,
                metrics: None,
                topic: &self.topic,
                conversation_active: false,
                someone_else_replied: false,
                now: self.utterance.received_at,
            }
        }
    }

    fn gate() -> EngagementGate {
        EngagementGate::new(EngagementConfig::default(), Arc::new(PersonaProfile::default()))
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    #[test]
    fn test_missing_metrics_use_base_probability() {
        let f = Fixture::new("kuch bhi");
        assert!((gate().response_probability(&f.input()) - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_probability_clamps_high() {
        let mut f = Fixture::new("pubg khelega");
        f.topic = Topic::Named("gaming".into());
        let friend = RelationshipMetrics {
            relationship_level: 5,
            trust_level: 10,
            happiness_level: 5,
            last_farewell_at: None,
        };
        let input = GateInput {
            metrics: Some(&friend),
            conversation_active: true,
            ..f.input()
        };
        assert!((gate().response_probability(&input) - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_day_part_topic_earns_interest_bonus() {
        let mut f = Fixture::new("biryani khayega?");
        f.topic = Topic::Named("food".into());
        // food is not a standing interest
        assert!((gate().response_probability(&f.input()) - 0.2).abs() < 1e-9);

        f.profile.topics_of_interest = vec!["food".into()];
        assert!((gate().response_probability(&f.input()) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_probability_clamps_low() {
        let f = Fixture::new("kuch bhi");
        let grumpy = RelationshipMetrics {
            happiness_level: 1,
            ..Default::default()
        };
        let input = GateInput {
            metrics: Some(&grumpy),
            someone_else_replied: true,
            ..f.input()
        };
        assert!((gate().response_probability(&input) - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_sleeping_suppresses_unless_addressed() {
        let mut f = Fixture::new("hello");
        f.state.is_sleeping = true;
        let v = gate().decide_with_rng(&f.input(), &mut rng());
        assert!(!v.decision.should_respond);
        assert_eq!(v.decision.reason, DecisionReason::Sleeping);

        let input = GateInput {
            address: Some(AddressReason::Name),
            ..f.input()
        };
        let v = gate().decide_with_rng(&input, &mut rng());
        assert!(v.decision.should_respond);
        assert_eq!(v.decision.mode, ResponseMode::Sleepy);
    }

    #[test]
    fn test_farewell_day_and_night() {
        let f = Fixture::new("chalo bye");
        let day = GateInput {
            is_farewell: true,
            ..f.input()
        };
        let v = gate().decide_with_rng(&day, &mut rng());
        assert!(v.decision.should_respond && v.record_farewell);
        assert_eq!(v.decision.mode, ResponseMode::Farewell);

        let night = GateInput {
            is_night: true,
            ..day
        };
        let v = gate().decide_with_rng(&night, &mut rng());
        assert!(!v.decision.should_respond && v.record_farewell);
        assert_eq!(v.decision.reason, DecisionReason::FarewellAtNight);
    }

    #[test]
    fn test_addressed_beats_targeting_and_cooldown() {
        let f = Fixture::new("avinash sun");
        let recent = RelationshipMetrics {
            last_farewell_at: Some(f.utterance.received_at - Duration::hours(1)),
            ..Default::default()
        };
        let input = GateInput {
            address: Some(AddressReason::Name),
            targeted_elsewhere: true,
            metrics: Some(&recent),
            ..f.input()
        };
        assert!(gate().decide_with_rng(&input, &mut rng()).decision.should_respond);
    }

    #[test]
    fn test_targeted_elsewhere_is_forced_suppress() {
        let f = Fixture::new("rohit sun");
        let input = GateInput {
            targeted_elsewhere: true,
            conversation_active: true,
            ..f.input()
        };
        for seed in 0..20 {
            let v = gate().decide_with_rng(&input, &mut StdRng::seed_from_u64(seed));
            assert_eq!(v.decision.reason, DecisionReason::TargetedElsewhere);
        }
    }

    #[test]
    fn test_farewell_cooldown_window() {
        let f = Fixture::new("kya chal raha");
        let now = f.utterance.received_at;
        let recent = RelationshipMetrics {
            last_farewell_at: Some(now - Duration::hours(11)),
            ..Default::default()
        };
        let input = GateInput {
            metrics: Some(&recent),
            ..f.input()
        };
        let v = gate().decide_with_rng(&input, &mut rng());
        assert_eq!(v.decision.reason, DecisionReason::FarewellCooldown);

        let old = RelationshipMetrics {
            last_farewell_at: Some(now - Duration::hours(13)),
            ..Default::default()
        };
        let input = GateInput {
            metrics: Some(&old),
            ..f.input()
        };
        let v = gate().decide_with_rng(&input, &mut rng());
        assert!(matches!(v.decision.reason, DecisionReason::Sampled { .. }));
    }

    #[test]
    fn test_trusted_greeting_always_answered() {
        let f = Fixture::new("oye");
        let close = RelationshipMetrics {
            relationship_level: 4,
            ..Default::default()
        };
        let input = GateInput {
            is_greeting: true,
            metrics: Some(&close),
            ..f.input()
        };
        let v = gate().decide_with_rng(&input, &mut rng());
        assert_eq!(v.decision.reason, DecisionReason::TrustedGreeting);
    }

    #[test]
    fn test_sampling_matches_probability() {
        let f = Fixture::new("kuch bhi");
        let g = gate();
        let mut rng = rng();
        let hits = (0..10_000)
            .filter(|_| g.decide_with_rng(&f.input(), &mut rng).decision.should_respond)
            .count();
        // p = 0.2
        assert!((1_700..2_300).contains(&hits), "hits = {hits}");
    }
}
