use std::time::Duration;
use thiserror::Error;

/// Errors surfaced at the orchestrator boundary.
///
/// Classifiers never fail; these only come from collaborators and config.
#[derive(Debug, Error)]
pub enum RapportError {
    #[error("generation failed: {0}")]
    Generation(String),

    #[error("generation timed out after {0:?}")]
    GenerationTimeout(Duration),

    #[error("relationship store error: {0}")]
    Store(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl RapportError {
    /// Whether a canned fallback may stand in for the failed call.
    pub fn is_degradable(&self) -> bool {
        !matches!(self, RapportError::Config(_))
    }
}
