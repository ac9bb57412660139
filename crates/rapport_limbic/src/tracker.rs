//! Rolling per-conversation state.
//!
//! Each conversation gets its own `Mutex<ConversationRecord>`; the outer map
//! lock is held only long enough to find or create the handle, so unrelated
//! conversations never wait on each other.

use crate::{analyze_mood, detect_topic};
use chrono::{DateTime, Duration, Utc};
use rapport_core::{HistoryEntry, Mood, Participant, PersonaProfile, Topic};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Maximum entries kept per conversation.
pub const MAX_HISTORY: usize = 10;

// ============================================================================
// ConversationRecord
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct ConversationRecord {
    entries: VecDeque<HistoryEntry>,
    current_mood: Mood,
    current_topic: Topic,
    /// sender_id -> display name
    participants: HashMap<String, String>,
}

impl ConversationRecord {
    /// Append an entry, evicting the oldest past `MAX_HISTORY`, and refresh
    /// the derived mood and topic.
    pub fn push(&mut self, entry: HistoryEntry, persona: &PersonaProfile) {
        let is_agent = entry.is_agent;
        let text = entry.text.clone();

        let context: Vec<HistoryEntry> = self.entries.iter().cloned().collect();
        self.entries.push_back(entry);
        while self.entries.len() > MAX_HISTORY {
            self.entries.pop_front();
        }

        self.current_mood = analyze_mood(self.entries.make_contiguous(), &persona.mood_markers);
        if !is_agent {
            self.current_topic = Topic::from(detect_topic(&text, &context, &persona.topics));
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    /// The last `n` entries, oldest first.
    pub fn recent(&self, n: usize) -> Vec<HistoryEntry> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).cloned().collect()
    }

    pub fn last_entry(&self) -> Option<&HistoryEntry> {
        self.entries.back()
    }

    pub fn mood(&self) -> Mood {
        self.current_mood
    }

    pub fn topic(&self) -> &Topic {
        &self.current_topic
    }

    pub fn register_participant(&mut self, sender_id: &str, name: &str) {
        let name = name.trim();
        if name.is_empty() {
            return;
        }
        self.participants
            .insert(sender_id.to_string(), name.to_string());
    }

    pub fn participants(&self) -> Vec<Participant> {
        let mut list: Vec<Participant> = self
            .participants
            .iter()
            .map(|(id, name)| Participant {
                sender_id: id.clone(),
                name: name.clone(),
            })
            .collect();
        list.sort_by(|a, b| a.sender_id.cmp(&b.sender_id));
        list
    }

    pub fn last_agent_reply(&self) -> Option<DateTime<Utc>> {
        self.entries
            .iter()
            .rev()
            .find(|e| e.is_agent)
            .map(|e| e.timestamp)
    }

    /// The agent spoke within `window` of `now`.
    pub fn is_active(&self, now: DateTime<Utc>, window: Duration) -> bool {
        self.last_agent_reply()
            .map(|at| now - at <= window)
            .unwrap_or(false)
    }
}

// ============================================================================
// ConversationTracker
// ============================================================================

pub struct ConversationTracker {
    persona: Arc<PersonaProfile>,
    conversations: RwLock<HashMap<String, Arc<Mutex<ConversationRecord>>>>,
}

impl ConversationTracker {
    pub fn new(persona: Arc<PersonaProfile>) -> Self {
        Self {
            persona,
            conversations: RwLock::new(HashMap::new()),
        }
    }

    pub fn persona(&self) -> &PersonaProfile {
        &self.persona
    }

    /// Handle to one conversation's record, created on first use.
    ///
    /// Lock it to serialize all mutation for that conversation.
    pub async fn conversation(&self, conversation_id: &str) -> Arc<Mutex<ConversationRecord>> {
        if let Some(handle) = self.conversations.read().await.get(conversation_id) {
            return handle.clone();
        }
        let mut map = self.conversations.write().await;
        map.entry(conversation_id.to_string())
            .or_insert_with(|| {
                tracing::debug!("Tracking new conversation {}", conversation_id);
                Arc::new(Mutex::new(ConversationRecord::default()))
            })
            .clone()
    }

    pub async fn record(&self, conversation_id: &str, entry: HistoryEntry) {
        let handle = self.conversation(conversation_id).await;
        let mut record = handle.lock().await;
        record.push(entry, &self.persona);
    }

    /// Record a line the agent actually sent.
    pub async fn record_agent_reply(&self, conversation_id: &str, text: &str, at: DateTime<Utc>) {
        self.record(conversation_id, HistoryEntry::agent(text, at)).await;
    }

    /// The last `n` entries of a conversation, oldest first.
    pub async fn recent(&self, conversation_id: &str, n: usize) -> Vec<HistoryEntry> {
        match self.conversations.read().await.get(conversation_id) {
            Some(handle) => handle.lock().await.recent(n),
            None => Vec::new(),
        }
    }

    pub async fn register_participant(&self, conversation_id: &str, sender_id: &str, name: &str) {
        let handle = self.conversation(conversation_id).await;
        handle.lock().await.register_participant(sender_id, name);
    }

    pub async fn mood(&self, conversation_id: &str) -> Mood {
        match self.conversations.read().await.get(conversation_id) {
            Some(handle) => handle.lock().await.mood(),
            None => Mood::Neutral,
        }
    }

    pub async fn topic(&self, conversation_id: &str) -> Topic {
        match self.conversations.read().await.get(conversation_id) {
            Some(handle) => handle.lock().await.topic().clone(),
            None => Topic::General,
        }
    }

    /// Copy of the record; an empty record for unknown conversations.
    pub async fn snapshot(&self, conversation_id: &str) -> ConversationRecord {
        let handle = self.conversations.read().await.get(conversation_id).cloned();
        match handle {
            Some(handle) => handle.lock().await.clone(),
            None => ConversationRecord::default(),
        }
    }

    pub async fn conversation_count(&self) -> usize {
        self.conversations.read().await.len()
    }

    /// Drop conversations whose newest entry is at least `max_idle` old.
    ///
    /// Records that are empty or held elsewhere are kept. Returns the number
    /// dropped.
    pub async fn evict_idle(&self, now: DateTime<Utc>, max_idle: Duration) -> usize {
        let mut map = self.conversations.write().await;
        let before = map.len();
        map.retain(|_, handle| {
            if Arc::strong_count(handle) > 1 {
                return true;
            }
            match handle.try_lock() {
                Ok(record) => record
                    .last_entry()
                    .map_or(true, |e| now - e.timestamp < max_idle),
                Err(_) => true,
            }
        });
        let evicted = before - map.len();
        if evicted > 0 {
            tracing::debug!("Evicted {} idle conversation(s), {} left", evicted, map.len());
        }
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn human(sender: &str, text: &str, at: DateTime<Utc>) -> HistoryEntry {
        HistoryEntry {
            sender_id: sender.into(),
            text: text.into(),
            timestamp: at,
            is_agent: false,
        }
    }

    #[test]
    fn test_record_is_bounded_and_evicts_oldest() {
        let persona = PersonaProfile::default();
        let mut record = ConversationRecord::default();
        let now = Utc::now();
        for i in 0..25 {
            record.push(human("u1", &format!("msg {i}"), now), &persona);
        }
        assert_eq!(record.len(), MAX_HISTORY);
        assert_eq!(record.entries().next().map(|e| e.text.as_str()), Some("msg 15"));
        assert_eq!(record.last_entry().map(|e| e.text.as_str()), Some("msg 24"));
    }

    #[test]
    fn test_derived_mood_and_topic() {
        let persona = PersonaProfile::default();
        let mut record = ConversationRecord::default();
        let now = Utc::now();
        record.push(human("u1", "pubg khelega? 🔥", now), &persona);
        assert_eq!(record.mood(), Mood::Excited);
        assert_eq!(record.topic(), &Topic::Named("gaming".into()));

        // agent lines do not move the topic
        record.push(HistoryEntry::agent("chal biryani khate", now), &persona);
        assert_eq!(record.topic(), &Topic::Named("gaming".into()));
    }

    #[test]
    fn test_activity_window() {
        let persona = PersonaProfile::default();
        let mut record = ConversationRecord::default();
        let now = Utc::now();
        assert!(!record.is_active(now, Duration::seconds(300)));
        record.push(HistoryEntry::agent("haan bhai", now - Duration::seconds(100)), &persona);
        assert!(record.is_active(now, Duration::seconds(300)));
        assert!(!record.is_active(now + Duration::seconds(400), Duration::seconds(300)));
    }

    #[test]
    fn test_participants_ignore_blank_names() {
        let mut record = ConversationRecord::default();
        record.register_participant("u1", "Rohit");
        record.register_participant("u2", "  ");
        let names: Vec<String> = record.participants().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["Rohit"]);
    }

    #[tokio::test]
    async fn test_tracker_keeps_conversations_apart() {
        let tracker = ConversationTracker::new(Arc::new(PersonaProfile::default()));
        let now = Utc::now();
        tracker.record("g1", human("u1", "haha lol", now)).await;
        tracker.record("g2", human("u2", "wtf stfu", now)).await;

        assert_eq!(tracker.mood("g1").await, Mood::Happy);
        assert_eq!(tracker.mood("g2").await, Mood::Angry);
        assert_eq!(tracker.mood("unknown").await, Mood::Neutral);
        assert_eq!(tracker.snapshot("g1").await.len(), 1);
        assert_eq!(tracker.conversation_count().await, 2);
    }

    #[tokio::test]
    async fn test_agent_replies_mark_conversation_active() {
        let tracker = ConversationTracker::new(Arc::new(PersonaProfile::default()));
        let now = Utc::now();
        tracker.record("g1", human("u1", "kya scene", now)).await;
        tracker.record_agent_reply("g1", "kuch nahi bhai", now).await;

        let recent = tracker.recent("g1", 5).await;
        assert_eq!(recent.len(), 2);
        assert!(recent[1].is_agent);
        assert!(tracker.snapshot("g1").await.is_active(now, Duration::seconds(300)));
        assert!(tracker.recent("nope", 5).await.is_empty());
    }

    #[tokio::test]
    async fn test_idle_conversations_are_evicted() {
        let tracker = ConversationTracker::new(Arc::new(PersonaProfile::default()));
        let now = Utc::now();
        tracker.record("old", human("u1", "kal ka plan?", now - Duration::hours(30))).await;
        tracker.record("fresh", human("u2", "aaj ka plan?", now - Duration::hours(1))).await;
        tracker.register_participant("empty", "u3", "Neha").await;

        let held = tracker.conversation("old").await;
        assert_eq!(tracker.evict_idle(now, Duration::hours(24)).await, 0);
        drop(held);

        assert_eq!(tracker.evict_idle(now, Duration::hours(24)).await, 1);
        assert_eq!(tracker.conversation_count().await, 2);
        assert!(tracker.snapshot("old").await.is_empty());
        assert_eq!(tracker.snapshot("fresh").await.len(), 1);
    }
}
