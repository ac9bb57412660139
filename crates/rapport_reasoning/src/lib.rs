pub mod engine;
pub mod gate;
pub mod llm;
pub mod prompts;
pub mod providers;
pub mod retry;
pub mod targeting;

pub use engine::{DecisionOutcome, Orchestrator, OutboundEvent};
pub use gate::{EngagementGate, GateInput, GateVerdict};
pub use llm::{GenerationRequest, Generator};
