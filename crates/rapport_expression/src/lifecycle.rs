//! Topic lifecycle for privileged senders
//!
//! Each privileged sender gets a session that walks
//! Idle → Active(topic) → Concluding → Active(new topic). A topic is
//! concluded after enough messages, enough elapsed time, a boredom cue, a
//! run of short replies, or an occasional random roll. The next topic is
//! drawn uniformly from the persona's interests, never repeating the one
//! just concluded.
//!
//! The sender can also end the session: a goodbye, a run of dry answers
//! ("haan", "idk"), or two brush-offs ("hmm", "busy now") in a row send it
//! back to Idle with a sign-off line.

use chrono::{DateTime, Duration, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use rapport_core::lexicon::{matches_any, matches_whole, tokens};
use rapport_core::{LifecycleConfig, PersonaProfile};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TopicPhase {
    #[default]
    Idle,
    Active,
    Concluding,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicSession {
    pub phase: TopicPhase,
    /// Where announcements for this sender are delivered.
    pub conversation_id: String,
    pub current_topic: Option<String>,
    /// The most recently concluded topic.
    pub previous_topic: Option<String>,
    pub topic_started_at: Option<DateTime<Utc>>,
    pub messages_since_topic_start: u32,
    pub consecutive_dry: u32,
    /// Short replies seen once the topic passed its stale threshold.
    pub stale_replies: u32,
    pub last_was_indirect: bool,
}

impl TopicSession {
    fn reset_counters(&mut self) {
        self.messages_since_topic_start = 0;
        self.consecutive_dry = 0;
        self.stale_replies = 0;
        self.last_was_indirect = false;
    }
}

/// Replies of at most this many words count as short.
const SHORT_REPLY_WORDS: usize = 3;

/// How a message bears on the session, before any counters move.
#[derive(Debug, Clone, Copy)]
struct Signals {
    bored: bool,
    ending: bool,
    indirect: bool,
    dry: bool,
    short: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnouncementKind {
    /// A topic was opened from Idle.
    Opened,
    /// A topic was concluded and a new one opened.
    Rotated,
    /// A topic was concluded with nothing left to rotate to.
    Closed,
    /// The sender wound the conversation down.
    Ended,
}

/// Lines the agent should volunteer to a privileged sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LifecycleAnnouncement {
    pub sender_id: String,
    pub conversation_id: String,
    pub kind: AnnouncementKind,
    pub topic: Option<String>,
    pub lines: Vec<String>,
}

impl LifecycleAnnouncement {
    pub fn text(&self) -> String {
        self.lines.join("\n\n")
    }
}

pub struct TopicLifecycle {
    persona: Arc<PersonaProfile>,
    config: LifecycleConfig,
    /// sender_id -> display name
    privileged: HashMap<String, String>,
    sessions: HashMap<String, TopicSession>,
}

impl TopicLifecycle {
    pub fn new(
        persona: Arc<PersonaProfile>,
        config: LifecycleConfig,
        privileged: HashMap<String, String>,
    ) -> Self {
        Self {
            persona,
            config,
            privileged,
            sessions: HashMap::new(),
        }
    }

    pub fn is_privileged(&self, sender_id: &str) -> bool {
        self.privileged.contains_key(sender_id)
    }

    pub fn session(&self, sender_id: &str) -> Option<&TopicSession> {
        self.sessions.get(sender_id)
    }

    /// Count a message from `sender_id` and rotate or end the topic if due.
    ///
    /// Opens a topic when the sender's session is idle, unless the message
    /// is itself a goodbye or brush-off. Non-privileged senders are ignored.
    pub fn observe<R: Rng + ?Sized>(
        &mut self,
        sender_id: &str,
        conversation_id: &str,
        text: &str,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Option<LifecycleAnnouncement> {
        if !self.is_privileged(sender_id) {
            return None;
        }
        let signals = self.signals(text);
        let config = &self.config;

        let session = self.sessions.entry(sender_id.to_string()).or_default();
        session.conversation_id = conversation_id.to_string();

        if session.phase != TopicPhase::Active {
            if signals.ending || signals.indirect || signals.dry {
                return None;
            }
            return self.start(sender_id, now, rng);
        }

        session.messages_since_topic_start += 1;
        session.consecutive_dry = if signals.dry { session.consecutive_dry + 1 } else { 0 };
        let brushed_off = signals.indirect && session.last_was_indirect;
        session.last_was_indirect = signals.indirect;
        if signals.short && session.messages_since_topic_start > config.stale_after_messages {
            session.stale_replies += 1;
        }

        if signals.ending || brushed_off || session.consecutive_dry >= config.dry_limit {
            tracing::info!(
                "Session ended by {} (goodbye: {}, brush-off: {}, dry: {})",
                sender_id,
                signals.ending,
                brushed_off,
                session.consecutive_dry
            );
            return self.end(sender_id, rng);
        }

        let stale = session.stale_replies >= config.stale_short_limit;
        let random = session.messages_since_topic_start > config.random_rotation_after
            && rng.gen::<f64>() < config.random_rotation_chance;
        if signals.bored || stale || random || self.rotation_due(sender_id, now) {
            tracing::info!(
                "Topic rotation for {} (bored: {}, stale: {}, random: {}, messages: {})",
                sender_id,
                signals.bored,
                stale,
                random,
                self.sessions.get(sender_id).map(|s| s.messages_since_topic_start).unwrap_or(0)
            );
            return self.rotate(sender_id, now, rng);
        }
        None
    }

    fn signals(&self, text: &str) -> Signals {
        let persona = &self.persona;
        Signals {
            bored: matches_any(text, &persona.topic_change_triggers),
            ending: matches_any(text, &persona.end_indicators),
            indirect: matches_whole(text, &persona.indirect_endings),
            dry: matches_whole(text, &persona.dry_responses),
            short: tokens(text).len() <= SHORT_REPLY_WORDS,
        }
    }

    /// Background cadence: rotate every active session whose topic has run
    /// past the rotation interval.
    pub fn tick<R: Rng + ?Sized>(&mut self, now: DateTime<Utc>, rng: &mut R) -> Vec<LifecycleAnnouncement> {
        let mut due: Vec<String> = self
            .sessions
            .iter()
            .filter(|(_, s)| s.phase == TopicPhase::Active)
            .map(|(id, _)| id.clone())
            .filter(|id| self.rotation_due(id, now))
            .collect();
        due.sort();

        due.iter()
            .filter_map(|id| self.rotate(id, now, rng))
            .collect()
    }

    /// Open a fresh topic for an idle session.
    pub fn start<R: Rng + ?Sized>(
        &mut self,
        sender_id: &str,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Option<LifecycleAnnouncement> {
        let exclude = self.sessions.get(sender_id)?.previous_topic.clone();
        let topic = self.pick_topic(exclude.as_deref(), rng)?;
        let intro = self.render(&self.persona.intro_templates, &topic, rng);

        let session = self.sessions.get_mut(sender_id)?;
        session.phase = TopicPhase::Active;
        session.current_topic = Some(topic.clone());
        session.topic_started_at = Some(now);
        session.reset_counters();
        tracing::info!("New topic for {}: {}", sender_id, topic);

        Some(LifecycleAnnouncement {
            sender_id: sender_id.to_string(),
            conversation_id: session.conversation_id.clone(),
            kind: AnnouncementKind::Opened,
            topic: Some(topic),
            lines: intro.into_iter().collect(),
        })
    }

    fn rotation_due(&self, sender_id: &str, now: DateTime<Utc>) -> bool {
        let Some(session) = self.sessions.get(sender_id) else {
            return false;
        };
        if session.phase != TopicPhase::Active {
            return false;
        }
        let expired = session
            .topic_started_at
            .map(|t| now - t >= Duration::seconds(self.config.rotation_secs))
            .unwrap_or(false);
        expired || session.messages_since_topic_start >= self.config.max_messages_per_topic
    }

    fn rotate<R: Rng + ?Sized>(
        &mut self,
        sender_id: &str,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Option<LifecycleAnnouncement> {
        let session = self.sessions.get_mut(sender_id)?;
        session.phase = TopicPhase::Concluding;
        let concluded = session.current_topic.take()?;
        session.previous_topic = Some(concluded.clone());
        tracing::info!("Concluding topic {} for {}", concluded, sender_id);

        let conclusion = self.render(&self.persona.conclusion_templates, &concluded, rng);
        let transition = self.persona.transition_lines.choose(rng).cloned();

        match self.start(sender_id, now, rng) {
            Some(mut opened) => {
                let mut lines: Vec<String> = conclusion.into_iter().chain(transition).collect();
                lines.append(&mut opened.lines);
                opened.lines = lines;
                opened.kind = AnnouncementKind::Rotated;
                Some(opened)
            }
            None => {
                let session = self.sessions.get_mut(sender_id)?;
                session.phase = TopicPhase::Idle;
                session.topic_started_at = None;
                session.reset_counters();
                tracing::debug!("No alternative topic for {}, going idle", sender_id);
                Some(LifecycleAnnouncement {
                    sender_id: sender_id.to_string(),
                    conversation_id: session.conversation_id.clone(),
                    kind: AnnouncementKind::Closed,
                    topic: None,
                    lines: conclusion.into_iter().collect(),
                })
            }
        }
    }

    /// Drop back to Idle with a sign-off. The ended topic is not reopened first.
    fn end<R: Rng + ?Sized>(&mut self, sender_id: &str, rng: &mut R) -> Option<LifecycleAnnouncement> {
        let sign_off = self.persona.sign_off_lines.choose(rng).cloned();
        let session = self.sessions.get_mut(sender_id)?;
        let ended = session.current_topic.take();
        if ended.is_some() {
            session.previous_topic = ended.clone();
        }
        session.phase = TopicPhase::Idle;
        session.topic_started_at = None;
        session.reset_counters();

        Some(LifecycleAnnouncement {
            sender_id: sender_id.to_string(),
            conversation_id: session.conversation_id.clone(),
            kind: AnnouncementKind::Ended,
            topic: ended,
            lines: sign_off.into_iter().collect(),
        })
    }

    fn pick_topic<R: Rng + ?Sized>(&self, exclude: Option<&str>, rng: &mut R) -> Option<String> {
        let candidates: Vec<&String> = self
            .persona
            .interests
            .iter()
            .filter(|t| Some(t.as_str()) != exclude)
            .collect();
        candidates.choose(rng).map(|t| t.to_string())
    }

    fn render<R: Rng + ?Sized>(&self, templates: &[String], topic: &str, rng: &mut R) -> Option<String> {
        templates
            .choose(rng)
            .map(|t| t.replace("{topic}", topic))
    }
}
