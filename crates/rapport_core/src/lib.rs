pub mod config;
pub mod error;
pub mod lexicon;
pub mod persona;

pub use config::{
    AddressingMode, DebounceConfig, EngagementConfig, FailurePolicy, GenerationConfig,
    LifecycleConfig, PrivilegedSender, RapportConfig, ScheduleConfig, StoreConfig,
};
pub use error::RapportError;
pub use persona::{
    hour_in_window, BehaviorProfile, CompletionCues, DayPart, MoodMarkers, PersonaProfile,
    TopicKeywords,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sender id used for the agent's own history entries.
pub const AGENT_SENDER_ID: &str = "__agent__";

// ============================================================================
// Messages
// ============================================================================

/// Reply threading metadata attached by the transport.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyContext {
    /// The message replies to something the agent sent.
    pub from_agent: bool,
    pub quoted_text: Option<String>,
}

/// A raw message fragment as delivered by the host platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub conversation_id: String,
    pub sender_id: String,
    pub sender_name: Option<String>,
    pub text: String,
    pub received_at: DateTime<Utc>,
    pub reply_context: Option<ReplyContext>,
}

/// One logical message, assembled from debounced fragments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utterance {
    pub conversation_id: String,
    pub sender_id: String,
    pub text: String,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub sender_id: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub is_agent: bool,
}

impl HistoryEntry {
    pub fn agent(text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            sender_id: AGENT_SENDER_ID.to_string(),
            text: text.into(),
            timestamp,
            is_agent: true,
        }
    }
}

impl From<&Utterance> for HistoryEntry {
    fn from(u: &Utterance) -> Self {
        Self {
            sender_id: u.sender_id.clone(),
            text: u.text.clone(),
            timestamp: u.received_at,
            is_agent: false,
        }
    }
}

/// A conversation member known by display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub sender_id: String,
    pub name: String,
}

// ============================================================================
// Labels
// ============================================================================

/// Room mood. The first six variants are marker-driven, in tie-break order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Happy,
    Angry,
    Sad,
    Excited,
    Bored,
    Toxic,
    Serious,
    Curious,
    #[default]
    Neutral,
}

impl Mood {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mood::Happy => "happy",
            Mood::Angry => "angry",
            Mood::Sad => "sad",
            Mood::Excited => "excited",
            Mood::Bored => "bored",
            Mood::Toxic => "toxic",
            Mood::Serious => "serious",
            Mood::Curious => "curious",
            Mood::Neutral => "neutral",
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Conversation topic; `General` when nothing in the keyword table matched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Topic {
    Named(String),
    #[default]
    General,
}

impl Topic {
    pub fn as_str(&self) -> &str {
        match self {
            Topic::Named(name) => name,
            Topic::General => "general",
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Topic::Named(name) => Some(name),
            Topic::General => None,
        }
    }
}

impl From<Option<String>> for Topic {
    fn from(detected: Option<String>) -> Self {
        detected.map(Topic::Named).unwrap_or(Topic::General)
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Relationship & persona state
// ============================================================================

/// Per-sender relationship record owned by the external store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipMetrics {
    /// 1-5
    pub relationship_level: u8,
    /// 1-10
    pub trust_level: u8,
    /// 1-10
    pub happiness_level: u8,
    pub last_farewell_at: Option<DateTime<Utc>>,
}

impl Default for RelationshipMetrics {
    fn default() -> Self {
        Self {
            relationship_level: 1,
            trust_level: 1,
            happiness_level: 5,
            last_farewell_at: None,
        }
    }
}

impl RelationshipMetrics {
    /// Clamp every level into its documented range.
    pub fn clamped(mut self) -> Self {
        self.relationship_level = self.relationship_level.clamp(1, 5);
        self.trust_level = self.trust_level.clamp(1, 10);
        self.happiness_level = self.happiness_level.clamp(1, 10);
        self
    }
}

/// Sleep/wake state, always derived from the clock.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonaState {
    pub is_sleeping: bool,
    pub sleep_started_at: Option<DateTime<Utc>>,
    pub wake_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Decisions
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    #[default]
    Normal,
    Sleepy,
    Farewell,
}

/// Why the agent counts as addressed. Variants are in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressReason {
    Reply,
    Mention,
    Name,
    Greeting,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecisionReason {
    Sleeping,
    Addressed { by: AddressReason },
    FarewellAtNight,
    FarewellInDay,
    TargetedElsewhere,
    FarewellCooldown,
    TrustedGreeting,
    Sampled { probability: f64, roll: f64 },
}

/// What the transport receives for every complete utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseDecision {
    pub should_respond: bool,
    pub mode: ResponseMode,
    /// Present only when `should_respond` is true.
    pub utterance_for_generation: Option<Utterance>,
    pub reason: DecisionReason,
}

impl ResponseDecision {
    pub fn respond(utterance: &Utterance, mode: ResponseMode, reason: DecisionReason) -> Self {
        Self {
            should_respond: true,
            mode,
            utterance_for_generation: Some(utterance.clone()),
            reason,
        }
    }

    pub fn suppress(reason: DecisionReason) -> Self {
        Self {
            should_respond: false,
            mode: ResponseMode::Normal,
            utterance_for_generation: None,
            reason,
        }
    }
}

// ============================================================================
// Collaborators
// ============================================================================

/// Persistent per-sender relationship records.
#[async_trait]
pub trait RelationshipStore: Send + Sync {
    async fn get_relationship(&self, sender_id: &str) -> anyhow::Result<Option<RelationshipMetrics>>;
    async fn put_relationship(&self, sender_id: &str, metrics: &RelationshipMetrics) -> anyhow::Result<()>;
    async fn put_farewell_marker(&self, sender_id: &str, at: DateTime<Utc>) -> anyhow::Result<()>;
}
