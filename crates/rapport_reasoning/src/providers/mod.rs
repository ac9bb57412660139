pub mod mock;
pub mod openai;

pub use mock::MockGenerator;
pub use openai::OpenAiGenerator;

use crate::llm::Generator;
use anyhow::Result;
use rapport_core::GenerationConfig;
use std::sync::Arc;

/// Build the generator named in config.
pub fn from_config(config: &GenerationConfig) -> Result<Arc<dyn Generator>> {
    match config.provider.as_str() {
        "mock" => Ok(Arc::new(MockGenerator::new(&config.model))),
        "openai" => Ok(Arc::new(OpenAiGenerator::new(config)?)),
        other => anyhow::bail!("Unknown generation provider: {}", other),
    }
}
