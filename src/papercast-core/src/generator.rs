//! Conversation generation against an OpenAI-compatible chat API.
//!
//! The model is asked for JSON but frequently wraps it in prose, so the reply
//! is scanned for the first complete object and retried a fixed number of
//! times when nothing usable comes back.

use std::future::Future;
use std::time::Duration;

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestUserMessage,
    CreateChatCompletionRequestArgs,
};

use crate::config::ModelConfig;
use crate::conversation::{Conversation, parse_reply};
use crate::error::PodcastError;
use crate::feed::PaperItem;
use crate::prompt::build_prompt;

/// Something that turns a single user prompt into a text reply.
pub trait CompletionBackend {
    fn complete(&self, prompt: &str) -> impl Future<Output = Result<String, PodcastError>>;
}

/// Chat completion client for any OpenAI-compatible endpoint.
pub struct OpenAiCompletion {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiCompletion {
    pub fn new(settings: &ModelConfig, api_key: &str) -> Result<Self, PodcastError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                PodcastError::ConfigError(format!("Failed to create HTTP client: {}", e))
            })?;

        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(&settings.api_base);

        Ok(Self {
            client: Client::with_config(config).with_http_client(http_client),
            model: settings.name.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        })
    }
}

impl CompletionBackend for OpenAiCompletion {
    async fn complete(&self, prompt: &str) -> Result<String, PodcastError> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .temperature(self.temperature)
            .max_completion_tokens(self.max_tokens)
            .messages(vec![ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessage {
                    content: prompt.to_string().into(),
                    name: None,
                },
            )])
            .build()?;

        let response = self.client.chat().create(request).await?;

        Ok(response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default())
    }
}

/// Fixed-count, fixed-delay retry bound for conversation generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Total completion calls, never zero.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(2))
    }
}

impl From<&ModelConfig> for RetryPolicy {
    fn from(settings: &ModelConfig) -> Self {
        Self::new(settings.max_attempts, settings.retry_delay())
    }
}

/// Ask the model for a two-host dialogue about `items`.
///
/// Every failure inside an attempt (transport error, empty reply, missing or
/// malformed JSON) is retried after `policy.delay()` until `policy.max_attempts()`
/// calls have been made.
pub async fn generate_conversation<C: CompletionBackend>(
    backend: &C,
    items: &[PaperItem],
    policy: RetryPolicy,
) -> Result<Conversation, PodcastError> {
    let prompt = build_prompt(items);
    let mut last_error = String::new();

    for attempt in 1..=policy.max_attempts() {
        tracing::info!(
            attempt,
            max_attempts = policy.max_attempts(),
            "Requesting conversation"
        );

        let outcome = match backend.complete(&prompt).await {
            Ok(reply) => parse_reply(&strip_reasoning(&reply)).map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };

        match outcome {
            Ok(conversation) => {
                tracing::info!(attempt, lines = conversation.len(), "Conversation generated");
                return Ok(conversation);
            }
            Err(reason) => {
                tracing::warn!(attempt, error = %reason, "Conversation attempt failed");
                last_error = reason;
                if attempt < policy.max_attempts() {
                    tokio::time::sleep(policy.delay()).await;
                }
            }
        }
    }

    Err(PodcastError::GenerationExhausted {
        attempts: policy.max_attempts(),
        last_error,
    })
}

/// Strip reasoning blocks some models emit before their answer.
///
/// These can contain braces that would otherwise be mistaken for the payload.
fn strip_reasoning(reply: &str) -> String {
    let mut result = reply.to_string();
    for tag in ["think", "thinking", "reasoning", "reflection", "scratchpad"] {
        let pattern = format!(r"(?is)<{tag}[^>]*>.*?</{tag}>", tag = tag);
        if let Ok(re) = regex::Regex::new(&pattern) {
            result = re.replace_all(&result, "").to_string();
        }
    }
    result
}
