use crate::RapportError;
use anyhow::{Context, Result};
use chrono::{FixedOffset, Offset, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Number of `CHATTER_ID{n}` / `CHATTER_NAME{n}` slots read from the environment.
const PRIVILEGED_ENV_SLOTS: usize = 5;

// ============================================================================
// Top-level config
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RapportConfig {
    pub debounce: DebounceConfig,
    pub schedule: ScheduleConfig,
    pub engagement: EngagementConfig,
    pub lifecycle: LifecycleConfig,
    pub tracker: TrackerConfig,
    pub generation: GenerationConfig,
    pub store: StoreConfig,
    /// Persona TOML; the built-in persona is used when absent.
    pub persona_path: Option<PathBuf>,
    pub privileged: Vec<PrivilegedSender>,
}

impl RapportConfig {
    /// Load config from a TOML file, falling back to defaults for missing fields.
    /// After loading, env var overrides are applied.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let mut config: RapportConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML config")?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Try to load from path; if file doesn't exist, return defaults with env overrides.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::info!("Config file not found or invalid ({}), using defaults", e);
                let mut cfg = Self::default();
                cfg.apply_env_overrides();
                cfg
            }
        }
    }

    /// Apply environment variable overrides on top of file-based config.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("RAPPORT_UTC_OFFSET_MINUTES") {
            if let Ok(n) = v.parse() {
                self.schedule.utc_offset_minutes = n;
            }
        }
        if let Ok(v) = std::env::var("RAPPORT_DB_PATH") {
            self.store.db_path = Some(PathBuf::from(v));
        }
        if let Ok(v) = std::env::var("RAPPORT_PERSONA_PATH") {
            self.persona_path = Some(PathBuf::from(v));
        }
        if let Ok(v) = std::env::var("LLM_PROVIDER") {
            self.generation.provider = v;
        }
        if let Ok(v) = std::env::var("LLM_MODEL") {
            self.generation.model = v;
        }
        if let Ok(v) = std::env::var("LLM_BASE_URL") {
            self.generation.base_url = Some(v);
        }
        for slot in 1..=PRIVILEGED_ENV_SLOTS {
            let Ok(id) = std::env::var(format!("CHATTER_ID{slot}")) else {
                continue;
            };
            let id = id.trim().to_string();
            if id.is_empty() || self.privileged.iter().any(|p| p.id == id) {
                continue;
            }
            let name = std::env::var(format!("CHATTER_NAME{slot}")).unwrap_or_else(|_| id.clone());
            self.privileged.push(PrivilegedSender { id, name });
        }
    }

    pub fn validate(&self) -> Result<(), RapportError> {
        let e = &self.engagement;
        if !(0.0..=1.0).contains(&e.min_probability)
            || !(0.0..=1.0).contains(&e.max_probability)
            || e.min_probability > e.max_probability
        {
            return Err(RapportError::Config(format!(
                "probability band [{}, {}] is not inside [0, 1]",
                e.min_probability, e.max_probability
            )));
        }
        let s = &self.schedule;
        for hour in [s.sleep_start_hour, s.sleep_end_hour, s.night_start_hour, s.night_end_hour] {
            if hour > 23 {
                return Err(RapportError::Config(format!("hour {hour} out of range")));
            }
        }
        let chance = self.lifecycle.random_rotation_chance;
        if !(0.0..=1.0).contains(&chance) {
            return Err(RapportError::Config(format!(
                "random rotation chance {chance} is not inside [0, 1]"
            )));
        }
        Ok(())
    }

    /// Privileged sender id to display name.
    pub fn privileged_map(&self) -> HashMap<String, String> {
        self.privileged
            .iter()
            .map(|p| (p.id.clone(), p.name.clone()))
            .collect()
    }
}

// ============================================================================
// Sub-configs
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DebounceConfig {
    /// Gap after which a fragment run counts as complete.
    pub completion_delay_ms: u64,
    /// Background flush check cadence.
    pub tick_interval_ms: u64,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            completion_delay_ms: 2_000,
            tick_interval_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Local clock offset. Default IST (+05:30).
    pub utc_offset_minutes: i32,
    pub sleep_start_hour: u32,
    pub sleep_end_hour: u32,
    pub night_start_hour: u32,
    pub night_end_hour: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: 330,
            sleep_start_hour: 2,
            sleep_end_hour: 6,
            night_start_hour: 22,
            night_end_hour: 6,
        }
    }
}

impl ScheduleConfig {
    pub fn utc_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).unwrap_or_else(|| {
            tracing::warn!("Invalid UTC offset {} min, using UTC", self.utc_offset_minutes);
            Utc.fix()
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressingMode {
    /// Reply, mention or name only.
    #[default]
    Strict,
    /// Also greeting and question words.
    Loose,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngagementConfig {
    pub base_probability: f64,
    /// Added per relationship level above 1.
    pub relationship_step: f64,
    /// Added per trust level above 1.
    pub trust_step: f64,
    pub happy_threshold: u8,
    pub unhappy_threshold: u8,
    pub happiness_adjustment: f64,
    pub interest_bonus: f64,
    pub active_bonus: f64,
    pub greeting_bonus: f64,
    /// Greetings from senders above this relationship level always get a reply.
    pub trusted_greeting_level: u8,
    pub interrupt_penalty: f64,
    pub min_probability: f64,
    pub max_probability: f64,
    pub farewell_cooldown_secs: i64,
    /// The agent spoke within this window: the conversation is active.
    pub active_window_secs: i64,
    /// Another sender spoke within this window: the agent would interrupt.
    pub interrupt_window_secs: i64,
    /// Back-to-back window for continuation detection.
    pub targeting_window_secs: i64,
    pub addressing: AddressingMode,
}

impl Default for EngagementConfig {
    fn default() -> Self {
        Self {
            base_probability: 0.2,
            relationship_step: 0.1,
            trust_step: 0.05,
            happy_threshold: 7,
            unhappy_threshold: 3,
            happiness_adjustment: 0.1,
            interest_bonus: 0.3,
            active_bonus: 0.3,
            greeting_bonus: 0.2,
            trusted_greeting_level: 3,
            interrupt_penalty: 0.2,
            min_probability: 0.1,
            max_probability: 0.9,
            farewell_cooldown_secs: 12 * 3600,
            active_window_secs: 300,
            interrupt_window_secs: 30,
            targeting_window_secs: 5,
            addressing: AddressingMode::Strict,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    pub rotation_secs: i64,
    pub max_messages_per_topic: u32,
    pub tick_interval_secs: u64,
    /// Consecutive dry replies ("haan", "idk") that end the session.
    pub dry_limit: u32,
    /// Short replies start counting as staleness after this many messages.
    pub stale_after_messages: u32,
    /// Short replies past `stale_after_messages` that force a rotation.
    pub stale_short_limit: u32,
    /// Random rotation is only rolled past this many messages.
    pub random_rotation_after: u32,
    pub random_rotation_chance: f64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            rotation_secs: 600,
            max_messages_per_topic: 15,
            tick_interval_secs: 30,
            dry_limit: 3,
            stale_after_messages: 5,
            stale_short_limit: 2,
            random_rotation_after: 8,
            random_rotation_chance: 0.2,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Conversations silent for this long are dropped from memory.
    pub idle_eviction_secs: i64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            idle_eviction_secs: 24 * 3600,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Send a canned acknowledgement.
    #[default]
    Filler,
    Silent,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    pub timeout_secs: u64,
    pub temperature: f32,
    pub max_tokens: u32,
    pub failure_policy: FailurePolicy,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: "mock".to_string(),
            model: "gpt-4o-mini".to_string(),
            base_url: None,
            timeout_secs: 20,
            temperature: 0.9,
            max_tokens: 150,
            failure_policy: FailurePolicy::Filler,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite file; in-memory store when absent.
    pub db_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PrivilegedSender {
    pub id: String,
    pub name: String,
}
