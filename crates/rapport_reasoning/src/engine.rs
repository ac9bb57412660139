//! Orchestrator: one utterance in, one decision out.
//!
//! Inbound fragments pass through the debounce buffer; each completed
//! utterance is classified, recorded and gated under its conversation's
//! lock, so decisions for one conversation are strictly ordered while
//! different conversations proceed independently. A background task flushes
//! stale buffers, rotates privileged-sender topics and drops conversations
//! that have gone quiet.

use crate::gate::{EngagementGate, GateInput};
use crate::llm::{GenerationRequest, Generator};
use crate::targeting::{
    address_reason, is_farewell, is_greeting, is_targeted_elsewhere, TargetingContext,
};
use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rapport_core::{
    FailurePolicy, HistoryEntry, InboundMessage, PersonaProfile, RapportConfig, RapportError,
    RelationshipMetrics, RelationshipStore, ReplyContext, ResponseDecision, ResponseMode,
    Utterance,
};
use rapport_expression::{Humanizer, LifecycleAnnouncement, TopicLifecycle};
use rapport_limbic::{ConversationTracker, PersonaScheduler, MAX_HISTORY};
use rapport_memory::{DebounceBuffer, Flushed};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// A decision plus what the caller needs to act on it.
#[derive(Debug, Clone)]
pub struct DecisionOutcome {
    pub decision: ResponseDecision,
    /// Topic lines volunteered to a privileged sender alongside the decision.
    pub announcement: Option<LifecycleAnnouncement>,
    /// Context bundle for the generator; set only when responding.
    pub request: Option<GenerationRequest>,
}

impl DecisionOutcome {
    pub fn should_respond(&self) -> bool {
        self.decision.should_respond
    }
}

/// Produced by the background task for the transport to deliver.
#[derive(Debug, Clone)]
pub enum OutboundEvent {
    /// Decision for an utterance completed by the flush timer.
    Decision(DecisionOutcome),
    Announcement(LifecycleAnnouncement),
}

pub struct Orchestrator {
    persona: Arc<PersonaProfile>,
    config: RapportConfig,
    debounce: Mutex<DebounceBuffer>,
    tracker: ConversationTracker,
    scheduler: PersonaScheduler,
    gate: EngagementGate,
    lifecycle: Mutex<TopicLifecycle>,
    humanizer: Humanizer,
    store: Arc<dyn RelationshipStore>,
    generator: Arc<dyn Generator>,
    privileged: HashMap<String, String>,
    rng: Mutex<StdRng>,
}

impl Orchestrator {
    pub fn new(
        config: RapportConfig,
        persona: Arc<PersonaProfile>,
        store: Arc<dyn RelationshipStore>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        let privileged = config.privileged_map();
        tracing::info!(
            "Orchestrator ready: persona {}, {} privileged sender(s), generator {}",
            persona.display_name,
            privileged.len(),
            generator.name()
        );
        Self {
            debounce: Mutex::new(DebounceBuffer::new(&config.debounce, &persona)),
            tracker: ConversationTracker::new(persona.clone()),
            scheduler: PersonaScheduler::new(persona.clone(), config.schedule.clone()),
            gate: EngagementGate::new(config.engagement.clone(), persona.clone()),
            lifecycle: Mutex::new(TopicLifecycle::new(
                persona.clone(),
                config.lifecycle.clone(),
                privileged.clone(),
            )),
            humanizer: Humanizer::new(persona.clone(), &config.schedule),
            store,
            generator,
            privileged,
            rng: Mutex::new(StdRng::from_entropy()),
            persona,
            config,
        }
    }

    /// Reseed the sampler for reproducible runs.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    pub fn config(&self) -> &RapportConfig {
        &self.config
    }

    pub fn persona(&self) -> &PersonaProfile {
        &self.persona
    }

    pub fn tracker(&self) -> &ConversationTracker {
        &self.tracker
    }

    pub fn scheduler(&self) -> &PersonaScheduler {
        &self.scheduler
    }

    pub fn humanizer(&self) -> &Humanizer {
        &self.humanizer
    }

    // ========================================================================
    // Decisions
    // ========================================================================

    /// Feed one raw fragment. Returns a decision once the sender's utterance
    /// is complete, `None` while it is still buffering.
    pub async fn ingest(&self, message: InboundMessage) -> Option<DecisionOutcome> {
        if let Some(name) = &message.sender_name {
            self.tracker
                .register_participant(&message.conversation_id, &message.sender_id, name)
                .await;
        }

        let completion = self.debounce.lock().await.append_with_reply(
            &message.conversation_id,
            &message.sender_id,
            &message.text,
            message.reply_context,
            message.received_at,
        );
        let Flushed { utterance, reply_context } = completion.into_flushed()?;
        Some(self.decide(utterance, reply_context).await)
    }

    /// Relationship metrics for a sender, with store failures typed.
    pub async fn relationship(&self, sender_id: &str) -> Result<Option<RelationshipMetrics>, RapportError> {
        self.store
            .get_relationship(sender_id)
            .await
            .map_err(|e| RapportError::Store(format!("{:#}", e)))
    }

    async fn mark_farewell(&self, sender_id: &str, at: DateTime<Utc>) -> Result<(), RapportError> {
        self.store
            .put_farewell_marker(sender_id, at)
            .await
            .map_err(|e| RapportError::Store(format!("{:#}", e)))
    }

    /// Decide for a complete utterance. Never fails: store errors fall back
    /// to baseline metrics.
    pub async fn decide(&self, utterance: Utterance, reply: Option<ReplyContext>) -> DecisionOutcome {
        let now = utterance.received_at;
        let sender = utterance.sender_id.as_str();
        let privileged = self.privileged.contains_key(sender);
        let engagement = self.gate.config();

        let metrics = match self.relationship(sender).await {
            Ok(metrics) => metrics,
            Err(e) => {
                tracing::warn!("Relationship lookup failed for {}: {}", sender, e);
                None
            }
        };
        let profile = self.scheduler.profile(now, privileged);
        let persona_state = self.scheduler.sleep_state(now, privileged);

        let handle = self.tracker.conversation(&utterance.conversation_id).await;
        let mut record = handle.lock().await;

        let previous = record.last_entry().cloned();
        let participants = record.participants();
        let targeted_elsewhere = is_targeted_elsewhere(&TargetingContext {
            utterance: &utterance,
            participants: &participants,
            previous: previous.as_ref(),
            persona: &self.persona,
            window: Duration::seconds(engagement.targeting_window_secs),
        });
        let address = address_reason(&utterance.text, reply.as_ref(), &self.persona, engagement.addressing);
        let conversation_active = record.is_active(now, Duration::seconds(engagement.active_window_secs));
        let someone_else_replied = previous.as_ref().is_some_and(|p| {
            !p.is_agent
                && p.sender_id != utterance.sender_id
                && now - p.timestamp <= Duration::seconds(engagement.interrupt_window_secs)
        });

        record.push(HistoryEntry::from(&utterance), &self.persona);
        let mood = record.mood();
        let topic = record.topic().clone();

        let input = GateInput {
            utterance: &utterance,
            address,
            targeted_elsewhere,
            is_farewell: is_farewell(&utterance.text, &self.persona),
            is_greeting: is_greeting(&utterance.text, &self.persona),
            is_night: self.scheduler.is_night(now),
            persona_state: &persona_state,
            profile: &profile,
            metrics: metrics.as_ref(),
            topic: &topic,
            conversation_active,
            someone_else_replied,
            now,
        };
        let verdict = {
            let mut rng = self.rng.lock().await;
            self.gate.decide_with_rng(&input, &mut *rng)
        };
        let history = record.recent(MAX_HISTORY);
        drop(record);

        tracing::info!(
            "Decision {}/{}: respond={} mode={:?} reason={:?} mood={} topic={}",
            utterance.conversation_id,
            sender,
            verdict.decision.should_respond,
            verdict.decision.mode,
            verdict.decision.reason,
            mood,
            topic
        );

        if verdict.record_farewell {
            if let Err(e) = self.mark_farewell(sender, now).await {
                tracing::warn!("Failed to store farewell marker for {}: {}", sender, e);
            }
        }

        let announcement = {
            let mut lifecycle = self.lifecycle.lock().await;
            let mut rng = self.rng.lock().await;
            lifecycle.observe(sender, &utterance.conversation_id, &utterance.text, now, &mut *rng)
        };

        let request = verdict.decision.should_respond.then(|| GenerationRequest {
            persona_name: self.persona.display_name.clone(),
            mode: verdict.decision.mode,
            utterance: utterance.clone(),
            history,
            mood,
            topic,
            profile,
            metrics: metrics.unwrap_or_default(),
            privileged,
        });

        DecisionOutcome {
            decision: verdict.decision,
            announcement,
            request,
        }
    }

    // ========================================================================
    // Responses
    // ========================================================================

    /// Produce the reply text for a positive decision.
    ///
    /// Sleepy mode answers with a canned line. Otherwise the generator is
    /// called under the configured timeout and its output cleaned. Only a
    /// reply that is actually produced enters the conversation history.
    pub async fn respond(&self, outcome: &DecisionOutcome) -> Result<Option<String>, RapportError> {
        let Some(request) = &outcome.request else {
            return Ok(None);
        };
        let conversation_id = &request.utterance.conversation_id;
        let at = request.utterance.received_at;

        if request.mode == ResponseMode::Sleepy {
            let line = {
                let mut rng = self.rng.lock().await;
                self.humanizer.sleepy_line(&mut *rng)
            };
            self.tracker.record_agent_reply(conversation_id, &line, at).await;
            return Ok(Some(line));
        }

        let timeout = std::time::Duration::from_secs(self.config.generation.timeout_secs);
        let raw = match tokio::time::timeout(timeout, self.generator.generate(request)).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => return Err(RapportError::Generation(format!("{:#}", e))),
            Err(_) => return Err(RapportError::GenerationTimeout(timeout)),
        };

        let text = self.humanizer.clean(&raw);
        if text.is_empty() {
            return Err(RapportError::Generation("empty reply after cleanup".into()));
        }
        self.tracker.record_agent_reply(conversation_id, &text, at).await;
        Ok(Some(text))
    }

    /// `respond`, with generation failures handled by the failure policy.
    /// Filler lines are not recorded as agent history.
    pub async fn respond_or_fallback(&self, outcome: &DecisionOutcome) -> Option<String> {
        let error = match self.respond(outcome).await {
            Ok(reply) => return reply,
            Err(e) => e,
        };
        if !error.is_degradable() {
            tracing::error!("Response failed: {}", error);
            return None;
        }
        tracing::warn!("Response failed, applying {:?} policy: {}", self.config.generation.failure_policy, error);

        match self.config.generation.failure_policy {
            FailurePolicy::Silent => None,
            FailurePolicy::Filler => {
                let at = outcome.request.as_ref()?.utterance.received_at;
                let at_night = self.scheduler.is_night(at);
                let mut rng = self.rng.lock().await;
                Some(self.humanizer.filler_line(at_night, &mut *rng))
            }
        }
    }

    // ========================================================================
    // Background work
    // ========================================================================

    /// Decide for every buffer whose completion delay has lapsed.
    pub async fn flush_tick(&self, now: DateTime<Utc>) -> Vec<OutboundEvent> {
        let flushed = self.debounce.lock().await.flush_due(now);
        let mut events = Vec::with_capacity(flushed.len());
        for Flushed { utterance, reply_context } in flushed {
            tracing::debug!("Timer flush for {}/{}", utterance.conversation_id, utterance.sender_id);
            events.push(OutboundEvent::Decision(self.decide(utterance, reply_context).await));
        }
        events
    }

    /// Rotate privileged-sender topics that have run their course and drop
    /// conversations idle past the eviction window.
    pub async fn lifecycle_tick(&self, now: DateTime<Utc>) -> Vec<OutboundEvent> {
        let max_idle = Duration::seconds(self.config.tracker.idle_eviction_secs);
        self.tracker.evict_idle(now, max_idle).await;

        let mut lifecycle = self.lifecycle.lock().await;
        let mut rng = self.rng.lock().await;
        lifecycle
            .tick(now, &mut *rng)
            .into_iter()
            .map(OutboundEvent::Announcement)
            .collect()
    }

    /// Both periodic duties at once.
    pub async fn tick(&self, now: DateTime<Utc>) -> Vec<OutboundEvent> {
        let mut events = self.flush_tick(now).await;
        events.extend(self.lifecycle_tick(now).await);
        events
    }

    /// Run the periodic duties until the receiver is dropped.
    pub fn spawn_background(self: Arc<Self>, tx: mpsc::Sender<OutboundEvent>) -> tokio::task::JoinHandle<()> {
        let flush_every = std::time::Duration::from_millis(self.config.debounce.tick_interval_ms.max(1));
        let rotate_every = std::time::Duration::from_secs(self.config.lifecycle.tick_interval_secs.max(1));

        tokio::spawn(async move {
            let mut flush = tokio::time::interval(flush_every);
            let mut rotate = tokio::time::interval(rotate_every);

            loop {
                let events = tokio::select! {
                    _ = flush.tick() => self.flush_tick(Utc::now()).await,
                    _ = rotate.tick() => self.lifecycle_tick(Utc::now()).await,
                };
                for event in events {
                    if tx.send(event).await.is_err() {
                        tracing::info!("Orchestrator: receiver dropped, stopping background task");
                        return;
                    }
                }
            }
        })
    }
}
