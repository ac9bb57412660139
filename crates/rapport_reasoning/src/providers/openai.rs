//! OpenAI-compatible chat completions.

use crate::llm::{GenerationRequest, Generator};
use crate::prompts::PromptAssembler;
use crate::retry::{with_retry, RetryConfig};
use anyhow::{Context, Result};
use rapport_core::GenerationConfig;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::env;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone)]
pub struct OpenAiGenerator {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    retry: RetryConfig,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl OpenAiGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = env::var("OPENAI_API_KEY").context("OPENAI_API_KEY is not set")?;
        let base_url = config
            .base_url
            .clone()
            .or_else(|| env::var("OPENAI_BASE_URL").ok())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            client: Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs.max(1)))
                .build()?,
            api_key,
            base_url,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            retry: RetryConfig::default(),
        })
    }

    fn payload(&self, request: &GenerationRequest) -> serde_json::Value {
        json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": PromptAssembler::system_prompt(request) },
                { "role": "user", "content": PromptAssembler::transcript(request) },
            ],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        })
    }
}

#[async_trait::async_trait]
impl Generator for OpenAiGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let payload = self.payload(request);

        let response = with_retry(&self.retry, "OpenAI", || async {
            self.client
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&payload)
                .send()
                .await
                .context("Failed to send request to OpenAI")
        })
        .await?;

        let body: ChatResponse = response
            .json()
            .await
            .context("Failed to parse OpenAI response")?;
        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|t| !t.trim().is_empty())
            .context("OpenAI returned no text")
    }

    fn name(&self) -> &str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rapport_core::{BehaviorProfile, Mood, RelationshipMetrics, ResponseMode, Topic, Utterance};

    #[test]
    fn test_payload_shape() {
        let generator = OpenAiGenerator {
            client: Client::new(),
            api_key: "test".into(),
            base_url: DEFAULT_BASE_URL.into(),
            model: "gpt-4o-mini".into(),
            temperature: 0.9,
            max_tokens: 150,
            retry: RetryConfig::default(),
        };
        let utterance = Utterance {
            conversation_id: "g1".into(),
            sender_id: "u1".into(),
            text: "kya scene".into(),
            received_at: Utc::now(),
        };
        let request = GenerationRequest {
            persona_name: "Avinash".into(),
            mode: ResponseMode::Normal,
            history: vec![(&utterance).into()],
            utterance,
            mood: Mood::Neutral,
            topic: Topic::General,
            profile: BehaviorProfile::default(),
            metrics: RelationshipMetrics::default(),
            privileged: false,
        };
        let payload = generator.payload(&request);
        assert_eq!(payload["model"], "gpt-4o-mini");
        assert_eq!(payload["max_tokens"], 150);
        assert_eq!(payload["messages"][0]["role"], "system");
        assert_eq!(payload["messages"][1]["content"], "u1: kya scene");
    }
}
