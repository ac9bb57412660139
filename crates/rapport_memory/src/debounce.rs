//! Debounce Buffer - joins rapid-fire fragments into one utterance
//!
//! People type "hii" / "bhai" / "kaisa hai?" as three messages. Fragments
//! from one sender in one conversation accumulate until one of:
//! - the latest fragment ends in terminal punctuation
//! - the gap since the previous fragment reaches the completion delay
//! - the buffer holds a single fragment that is a completion cue ("ok", "hi")
//!
//! A background tick calls `flush_due` so no buffer outlives the delay.
//! Reply metadata rides in the buffer, so whichever path completes the
//! utterance hands it back.

use chrono::{DateTime, Duration, Utc};
use rapport_core::lexicon::{ends_with_terminal_punctuation, tokens};
use rapport_core::{DebounceConfig, PersonaProfile, ReplyContext, Utterance};
use std::collections::{HashMap, HashSet};

type BufferKey = (String, String);

/// A completed utterance plus the reply metadata of its fragments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flushed {
    pub utterance: Utterance,
    pub reply_context: Option<ReplyContext>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Complete(Flushed),
    Pending,
}

impl Completion {
    pub fn into_flushed(self) -> Option<Flushed> {
        match self {
            Completion::Complete(f) => Some(f),
            Completion::Pending => None,
        }
    }
}

/// Fragments from one completion cycle.
#[derive(Debug, Clone)]
struct PendingBuffer {
    fragments: Vec<String>,
    last_fragment_time: DateTime<Utc>,
    /// Latest reply metadata seen in this cycle.
    reply_context: Option<ReplyContext>,
}

impl PendingBuffer {
    fn into_flushed(self, key: BufferKey) -> Flushed {
        Flushed {
            utterance: Utterance {
                conversation_id: key.0,
                sender_id: key.1,
                text: self.fragments.join(" "),
                received_at: self.last_fragment_time,
            },
            reply_context: self.reply_context,
        }
    }
}

pub struct DebounceBuffer {
    completion_delay: Duration,
    cues: HashSet<String>,
    buffers: HashMap<BufferKey, PendingBuffer>,
}

impl DebounceBuffer {
    pub fn new(config: &DebounceConfig, persona: &PersonaProfile) -> Self {
        Self {
            completion_delay: Duration::milliseconds(config.completion_delay_ms as i64),
            cues: persona.completion_cues.all().map(|c| c.to_lowercase()).collect(),
            buffers: HashMap::new(),
        }
    }

    /// Add a fragment without reply metadata.
    pub fn append(
        &mut self,
        conversation_id: &str,
        sender_id: &str,
        text: &str,
        now: DateTime<Utc>,
    ) -> Completion {
        self.append_with_reply(conversation_id, sender_id, text, None, now)
    }

    /// Add a fragment and report whether the sender's message is complete.
    ///
    /// On completion the buffer is removed, so the next fragment starts a
    /// fresh cycle. Blank fragments neither open a buffer nor reset the
    /// gap timer.
    pub fn append_with_reply(
        &mut self,
        conversation_id: &str,
        sender_id: &str,
        text: &str,
        reply_context: Option<ReplyContext>,
        now: DateTime<Utc>,
    ) -> Completion {
        let fragment = text.trim();
        let key = (conversation_id.to_string(), sender_id.to_string());

        if fragment.is_empty() {
            if let (Some(buffer), Some(reply)) = (self.buffers.get_mut(&key), reply_context) {
                buffer.reply_context = Some(reply);
            }
            return Completion::Pending;
        }

        let buffer = self.buffers.entry(key.clone()).or_insert_with(|| PendingBuffer {
            fragments: Vec::new(),
            last_fragment_time: now,
            reply_context: None,
        });
        let gap = now - buffer.last_fragment_time;
        buffer.fragments.push(fragment.to_string());
        buffer.last_fragment_time = now;
        if reply_context.is_some() {
            buffer.reply_context = reply_context;
        }

        let complete = ends_with_terminal_punctuation(fragment)
            || gap >= self.completion_delay
            || (buffer.fragments.len() == 1 && is_cue(&self.cues, &buffer.fragments[0]));
        if !complete {
            return Completion::Pending;
        }

        match self.buffers.remove(&key) {
            Some(done) => {
                tracing::debug!(
                    "Debounce complete for {}/{} after {} fragment(s)",
                    conversation_id,
                    sender_id,
                    done.fragments.len()
                );
                Completion::Complete(done.into_flushed(key))
            }
            None => Completion::Pending,
        }
    }

    /// Flush one buffer regardless of timing. A second call is a no-op.
    pub fn flush(&mut self, conversation_id: &str, sender_id: &str) -> Option<Flushed> {
        let key = (conversation_id.to_string(), sender_id.to_string());
        self.buffers.remove(&key).map(|buffer| buffer.into_flushed(key))
    }

    /// Flush every buffer whose last fragment is at least the completion
    /// delay old.
    pub fn flush_due(&mut self, now: DateTime<Utc>) -> Vec<Flushed> {
        let due: Vec<BufferKey> = self
            .buffers
            .iter()
            .filter(|(_, b)| now - b.last_fragment_time >= self.completion_delay)
            .map(|(k, _)| k.clone())
            .collect();

        let mut flushed: Vec<Flushed> = due
            .iter()
            .filter_map(|(conversation_id, sender_id)| self.flush(conversation_id, sender_id))
            .collect();
        flushed.sort_by_key(|f| f.utterance.received_at);
        flushed
    }

    pub fn pending_len(&self, conversation_id: &str, sender_id: &str) -> usize {
        self.buffers
            .get(&(conversation_id.to_string(), sender_id.to_string()))
            .map(|b| b.fragments.len())
            .unwrap_or(0)
    }

    pub fn open_buffers(&self) -> usize {
        self.buffers.len()
    }
}

fn is_cue(cues: &HashSet<String>, fragment: &str) -> bool {
    tokens(fragment).iter().any(|t| cues.contains(t))
}
