//! # Rapport Limbic Layer
//!
//! Fast, rule-driven conversation state that every decision reads:
//!
//! - **Mood**: room mood from marker counts over recent messages
//! - **Topic**: first keyword-table match over the message and recent context
//! - **Tracker**: bounded per-conversation history, serialized per conversation
//! - **Circadian**: time-of-day behavior profile and the nightly sleep window
//!
//! Nothing here performs I/O. Every classifier is total.

mod circadian;
mod mood;
mod topic;
mod tracker;

pub use circadian::PersonaScheduler;
pub use mood::analyze_mood;
pub use topic::detect_topic;
pub use tracker::{ConversationRecord, ConversationTracker, MAX_HISTORY};
