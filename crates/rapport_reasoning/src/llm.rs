use anyhow::Result;
use async_trait::async_trait;
use rapport_core::{
    BehaviorProfile, HistoryEntry, Mood, RelationshipMetrics, ResponseMode, Topic, Utterance,
};

/// Everything a generator gets to work with for one reply.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub persona_name: String,
    pub mode: ResponseMode,
    pub utterance: Utterance,
    /// Oldest first, the utterance itself included.
    pub history: Vec<HistoryEntry>,
    pub mood: Mood,
    pub topic: Topic,
    pub profile: BehaviorProfile,
    pub metrics: RelationshipMetrics,
    pub privileged: bool,
}

/// External text generation. Returns raw text; cleanup happens in the caller.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;

    /// Name for logging.
    fn name(&self) -> &str;
}
