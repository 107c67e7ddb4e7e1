//! Reply generation backends

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::engine::{Capability, Generator};
use crate::session::{Message, Role};
use crate::{Error, Result};

/// Tokens generated per reply by the local pipeline
const MAX_NEW_TOKENS: u32 = 128;

/// Sampling temperature for the local pipeline
const TEMPERATURE: f32 = 0.7;

/// Chat-completion service speaking the Ollama `/api/chat` protocol
pub struct ChatService {
    client: reqwest::Client,
    url: String,
    model: String,
}

impl ChatService {
    const VARIANT: &'static str = "local-chat-service";

    #[must_use]
    pub fn new(url: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
            model,
        }
    }

    #[must_use]
    pub fn from_config(config: &LlmConfig) -> Self {
        Self::new(config.chat_url.clone(), config.chat_model.clone())
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
}

#[derive(Default, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    message: Option<ChatMessage>,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: String,
}

#[async_trait]
impl Generator for ChatService {
    async fn generate(&self, messages: &[Message]) -> Result<String> {
        tracing::debug!(model = %self.model, messages = messages.len(), "chat request");

        let request = ChatRequest {
            model: &self.model,
            messages,
            stream: false,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "chat service request failed");
                Error::unreachable(Capability::Generation, Self::VARIANT, e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "chat service error");
            return Err(Error::Generation(format!("chat service error {status}: {body}")));
        }

        let result: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Generation(format!("malformed chat response: {e}")))?;

        let reply = result
            .message
            .map(|m| m.content.trim().to_string())
            .unwrap_or_default();
        non_empty(reply)
    }
}

/// Local text-generation pipeline driven by a rendered dialogue prompt
///
/// Speaks the text-generation-inference `/generate` protocol.
pub struct LocalPipeline {
    client: reqwest::Client,
    url: String,
    model: String,
}

impl LocalPipeline {
    const VARIANT: &'static str = "local-pipeline";

    #[must_use]
    pub fn new(url: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
            model,
        }
    }

    #[must_use]
    pub fn from_config(config: &LlmConfig) -> Self {
        Self::new(config.pipeline_url.clone(), config.pipeline_model.clone())
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    inputs: &'a str,
    parameters: GenerateParameters<'a>,
}

#[derive(Serialize)]
struct GenerateParameters<'a> {
    model: &'a str,
    max_new_tokens: u32,
    do_sample: bool,
    temperature: f32,
    return_full_text: bool,
}

/// Servers answer with either a single object or a one-element list
#[derive(Deserialize)]
#[serde(untagged)]
enum GenerateResponse {
    Single(Generated),
    Batch(Vec<Generated>),
}

#[derive(Deserialize)]
struct Generated {
    #[serde(default)]
    generated_text: String,
}

impl GenerateResponse {
    fn into_text(self) -> String {
        match self {
            Self::Single(g) => g.generated_text,
            Self::Batch(batch) => batch
                .into_iter()
                .next()
                .map(|g| g.generated_text)
                .unwrap_or_default(),
        }
    }
}

/// Render the snapshot as a `User:` / `Assistant:` transcript
///
/// System entries are dropped; the prompt ends with an open `Assistant: ` turn.
#[must_use]
pub fn render_prompt(messages: &[Message]) -> String {
    let mut prompt = String::new();
    for message in messages {
        let prefix = match message.role() {
            Role::System => continue,
            Role::User => "User",
            Role::Assistant => "Assistant",
        };
        prompt.push_str(prefix);
        prompt.push_str(": ");
        prompt.push_str(message.content());
        prompt.push('\n');
    }
    prompt.push_str("Assistant: ");
    prompt
}

/// Pull the assistant's reply out of raw generated text
///
/// Keeps what follows the first `Assistant:` marker (if the server echoed
/// one) and stops where the model starts writing the next `User:` turn.
#[must_use]
pub fn extract_reply(generated: &str) -> String {
    let reply = generated
        .split_once("Assistant:")
        .map_or(generated, |(_, rest)| rest);

    let reply = reply
        .lines()
        .take_while(|line| !line.trim_start().starts_with("User:"))
        .collect::<Vec<_>>()
        .join("\n");

    reply.trim().to_string()
}

#[async_trait]
impl Generator for LocalPipeline {
    async fn generate(&self, messages: &[Message]) -> Result<String> {
        let prompt = render_prompt(messages);
        tracing::debug!(model = %self.model, prompt_chars = prompt.len(), "pipeline request");

        let request = GenerateRequest {
            inputs: &prompt,
            parameters: GenerateParameters {
                model: &self.model,
                max_new_tokens: MAX_NEW_TOKENS,
                do_sample: true,
                temperature: TEMPERATURE,
                return_full_text: false,
            },
        };

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "pipeline request failed");
                Error::unreachable(Capability::Generation, Self::VARIANT, e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "pipeline error");
            return Err(Error::Generation(format!("pipeline error {status}: {body}")));
        }

        let result: GenerateResponse = response
            .json()
            .await
            .map_err(|e| Error::Generation(format!("malformed pipeline response: {e}")))?;

        non_empty(extract_reply(&result.into_text()))
    }
}

fn non_empty(reply: String) -> Result<String> {
    if reply.is_empty() {
        return Err(Error::Generation("backend returned no content".to_string()));
    }
    Ok(reply)
}
