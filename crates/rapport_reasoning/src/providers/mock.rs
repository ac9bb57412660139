//! Mock generator: deterministic replies for tests and offline runs.

use crate::llm::{GenerationRequest, Generator};
use anyhow::Result;
use rapport_core::ResponseMode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Default)]
pub struct MockGenerator {
    model: String,
    reply: Option<String>,
    delay: Duration,
    failure: Option<String>,
    calls: AtomicUsize,
}

impl MockGenerator {
    pub fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
            ..Default::default()
        }
    }

    /// Always answer with `reply`.
    pub fn with_reply(mut self, reply: &str) -> Self {
        self.reply = Some(reply.to_string());
        self
    }

    /// Wait this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail every call with `message`.
    pub fn failing(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Generator for MockGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(message) = &self.failure {
            anyhow::bail!("{}", message);
        }
        if let Some(reply) = &self.reply {
            return Ok(reply.clone());
        }
        let text = match request.mode {
            ResponseMode::Farewell => "chal bye, kal milte".to_string(),
            ResponseMode::Sleepy => "zzz".to_string(),
            ResponseMode::Normal => format!("(mock {}) haan, {} pe baat karte", self.model, request.topic),
        };
        Ok(text)
    }

    fn name(&self) -> &str {
        "mock"
    }
}
