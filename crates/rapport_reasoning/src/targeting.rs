//! Who is a message meant for?
//!
//! Two pure questions answered from the text and a little conversation
//! context: is the message aimed at somebody else, and is it aimed at the
//! agent (and why).

use chrono::Duration;
use rapport_core::lexicon::{contains_word, matches_any, mention_tokens, shares_vocabulary, tokens};
use rapport_core::{
    AddressReason, AddressingMode, HistoryEntry, Participant, PersonaProfile, ReplyContext,
    Utterance,
};

// ============================================================================
// Targeting rules
// ============================================================================

/// Everything the targeting rules may look at.
pub struct TargetingContext<'a> {
    pub utterance: &'a Utterance,
    /// Known members of the conversation, by display name.
    pub participants: &'a [Participant],
    /// The entry immediately before this utterance, if any.
    pub previous: Option<&'a HistoryEntry>,
    pub persona: &'a PersonaProfile,
    /// Back-to-back window for continuation detection.
    pub window: Duration,
}

pub trait TargetingRule: Send + Sync {
    /// `Some(true)`: aimed elsewhere. `Some(false)`: settled, not elsewhere.
    /// `None`: pass to the next rule.
    fn evaluate(&self, ctx: &TargetingContext<'_>) -> Option<bool>;

    /// Name for logging.
    fn name(&self) -> &str;
}

/// `@mentions` settle the question: elsewhere unless one is the agent's handle.
pub struct MentionRule;

impl TargetingRule for MentionRule {
    fn evaluate(&self, ctx: &TargetingContext<'_>) -> Option<bool> {
        let mentions = mention_tokens(&ctx.utterance.text);
        if mentions.is_empty() {
            return None;
        }
        let to_agent = mentions
            .iter()
            .any(|m| ctx.persona.handles.iter().any(|h| h.eq_ignore_ascii_case(m)));
        Some(!to_agent)
    }

    fn name(&self) -> &str { "mention" }
}

/// Another member's name in the text.
pub struct OtherNameRule;

impl TargetingRule for OtherNameRule {
    fn evaluate(&self, ctx: &TargetingContext<'_>) -> Option<bool> {
        let named = ctx
            .participants
            .iter()
            .filter(|p| p.sender_id != ctx.utterance.sender_id)
            .filter(|p| !is_agent_name(&p.name, ctx.persona))
            .any(|p| contains_word(&ctx.utterance.text, &p.name));
        named.then_some(true)
    }

    fn name(&self) -> &str { "other_name" }
}

/// A quick follow-up to another member's message continues their exchange.
pub struct ContinuationRule;

impl TargetingRule for ContinuationRule {
    fn evaluate(&self, ctx: &TargetingContext<'_>) -> Option<bool> {
        let prev = ctx.previous?;
        if prev.is_agent || prev.sender_id == ctx.utterance.sender_id {
            return None;
        }
        if !ctx.participants.iter().any(|p| p.sender_id == prev.sender_id) {
            return None;
        }
        let gap = ctx.utterance.received_at - prev.timestamp;
        if gap < Duration::zero() || gap > ctx.window {
            return None;
        }
        let related = shares_vocabulary(&prev.text, &ctx.utterance.text)
            || is_quick_reply(&ctx.utterance.text, ctx.persona);
        related.then_some(true)
    }

    fn name(&self) -> &str { "continuation" }
}

static RULES: [&dyn TargetingRule; 3] = [&MentionRule, &OtherNameRule, &ContinuationRule];

/// Whether the utterance is aimed at someone other than the agent.
/// First rule to decide wins; undecided means not elsewhere.
pub fn is_targeted_elsewhere(ctx: &TargetingContext<'_>) -> bool {
    for rule in RULES {
        if let Some(elsewhere) = rule.evaluate(ctx) {
            tracing::debug!("Targeting: rule '{}' decided elsewhere={}", rule.name(), elsewhere);
            return elsewhere;
        }
    }
    false
}

// ============================================================================
// Addressing
// ============================================================================

/// Why the agent is addressed, by precedence: reply > mention > name > greeting.
/// Greetings and question words only count in loose mode.
pub fn address_reason(
    text: &str,
    reply_context: Option<&ReplyContext>,
    persona: &PersonaProfile,
    mode: AddressingMode,
) -> Option<AddressReason> {
    if let Some(reply) = reply_context {
        let quotes_agent = reply
            .quoted_text
            .as_deref()
            .map(|q| mentions_agent_name(q, persona))
            .unwrap_or(false);
        if reply.from_agent || quotes_agent {
            return Some(AddressReason::Reply);
        }
    }

    let handle_mentioned = mention_tokens(text)
        .iter()
        .any(|m| persona.handles.iter().any(|h| h.eq_ignore_ascii_case(m)));
    if handle_mentioned {
        return Some(AddressReason::Mention);
    }

    if mentions_agent_name(text, persona) {
        return Some(AddressReason::Name);
    }

    if mode == AddressingMode::Loose {
        let words = tokens(text);
        let cue = words.iter().any(|w| {
            persona.greeting_tokens.iter().any(|g| g == w)
                || persona.question_tokens.iter().any(|q| q == w)
        });
        if cue || text.contains('?') {
            return Some(AddressReason::Greeting);
        }
    }
    None
}

pub fn is_addressed_to_agent(
    text: &str,
    reply_context: Option<&ReplyContext>,
    persona: &PersonaProfile,
    mode: AddressingMode,
) -> bool {
    address_reason(text, reply_context, persona, mode).is_some()
}

pub fn is_farewell(text: &str, persona: &PersonaProfile) -> bool {
    matches_any(text, &persona.farewell_patterns)
}

pub fn is_greeting(text: &str, persona: &PersonaProfile) -> bool {
    tokens(text)
        .iter()
        .any(|w| persona.greeting_tokens.iter().any(|g| g == w))
}

/// The whole message is a minimal acknowledgement.
pub fn is_quick_reply(text: &str, persona: &PersonaProfile) -> bool {
    let normalized = tokens(text).join(" ");
    !normalized.is_empty() && persona.quick_replies.iter().any(|q| *q == normalized)
}

fn mentions_agent_name(text: &str, persona: &PersonaProfile) -> bool {
    persona.name_aliases.iter().any(|n| contains_word(text, n))
}

fn is_agent_name(name: &str, persona: &PersonaProfile) -> bool {
    persona
        .name_aliases
        .iter()
        .any(|alias| alias.eq_ignore_ascii_case(name.trim()))
        || persona.display_name.eq_ignore_ascii_case(name.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    fn utterance(sender: &str, text: &str, secs: i64) -> Utterance {
        Utterance {
            conversation_id: "g1".into(),
            sender_id: sender.into(),
            text: text.into(),
            received_at: at(secs),
        }
    }

    fn entry(sender: &str, text: &str, secs: i64) -> HistoryEntry {
        HistoryEntry {
            sender_id: sender.into(),
            text: text.into(),
            timestamp: at(secs),
            is_agent: false,
        }
    }

    fn member(id: &str, name: &str) -> Participant {
        Participant {
            sender_id: id.into(),
            name: name.into(),
        }
    }

    fn elsewhere(u: &Utterance, participants: &[Participant], previous: Option<&HistoryEntry>) -> bool {
        let persona = PersonaProfile::default();
        is_targeted_elsewhere(&TargetingContext {
            utterance: u,
            participants,
            previous,
            persona: &persona,
            window: Duration::seconds(5),
        })
    }

    #[test]
    fn test_mentions() {
        assert!(elsewhere(&utterance("u1", "@rohit sun na", 0), &[], None));
        assert!(!elsewhere(&utterance("u1", "@aviiiii_patel sun na", 0), &[], None));
        assert!(!elsewhere(&utterance("u1", "@rohit @Aviiiii_Patel dono suno", 0), &[], None));
    }

    #[test]
    fn test_other_member_name() {
        let members = [member("u2", "Rohit"), member("u3", "Avinash")];
        assert!(elsewhere(&utterance("u1", "rohit kal aa raha?", 0), &members, None));
        // the agent's own name never counts as someone else
        assert!(!elsewhere(&utterance("u1", "avinash kal aa raha?", 0), &members, None));
        // a sender naming themselves is not targeting
        assert!(!elsewhere(&utterance("u2", "rohit is here", 0), &members, None));
    }

    #[test]
    fn test_continuation_of_another_exchange() {
        let members = [member("u2", "Rohit")];
        let prev = entry("u2", "match kab hai", 0);
        assert!(elsewhere(&utterance("u1", "match kal hai", 3), &members, Some(&prev)));
        assert!(elsewhere(&utterance("u1", "haan", 3), &members, Some(&prev)));
        // too slow
        assert!(!elsewhere(&utterance("u1", "match kal hai", 9), &members, Some(&prev)));
    }

    #[test]
    fn test_ok_after_unknown_sender_is_not_elsewhere() {
        // previous sender is not a known member; "ok" shares nothing with it
        let prev = entry("stranger", "lunch kab?", 0);
        assert!(!elsewhere(&utterance("u1", "ok", 3), &[], Some(&prev)));
        assert!(!elsewhere(&utterance("u1", "ok", 3), &[member("u2", "Rohit")], Some(&prev)));
    }

    #[test]
    fn test_address_precedence() {
        let persona = PersonaProfile::default();
        let reply = ReplyContext {
            from_agent: true,
            quoted_text: None,
        };
        assert_eq!(
            address_reason("avinash @aviiiii_patel", Some(&reply), &persona, AddressingMode::Strict),
            Some(AddressReason::Reply)
        );
        assert_eq!(
            address_reason("avinash @aviiiii_patel", None, &persona, AddressingMode::Strict),
            Some(AddressReason::Mention)
        );
        assert_eq!(
            address_reason("avinash bol", None, &persona, AddressingMode::Strict),
            Some(AddressReason::Name)
        );
        assert_eq!(address_reason("hello", None, &persona, AddressingMode::Strict), None);
        assert_eq!(
            address_reason("hello", None, &persona, AddressingMode::Loose),
            Some(AddressReason::Greeting)
        );
    }

    #[test]
    fn test_quoted_agent_counts_as_reply() {
        let persona = PersonaProfile::default();
        let reply = ReplyContext {
            from_agent: false,
            quoted_text: Some("Avinash: chal theek".into()),
        };
        assert_eq!(
            address_reason("sahi hai", Some(&reply), &persona, AddressingMode::Strict),
            Some(AddressReason::Reply)
        );
    }

    #[test]
    fn test_farewell_and_greeting_detection() {
        let persona = PersonaProfile::default();
        assert!(is_farewell("chalo bye guys", &persona));
        assert!(is_farewell("good night everyone", &persona));
        assert!(!is_farewell("byelaws are weird", &persona));
        assert!(is_greeting("arey sun", &persona));
        assert!(!is_greeting("kal milte", &persona));
        assert!(is_quick_reply("Ok!", &persona));
        assert!(!is_quick_reply("ok but why", &persona));
    }
}
