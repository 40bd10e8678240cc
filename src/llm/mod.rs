//! Answer synthesis over retrieved context

use crate::config::OpenAiConfig;
use crate::index::DocumentChunk;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Default chat model
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

/// Default timeout for completion requests (120 seconds)
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Prompt with `{input}` and `{context}` placeholders
pub const PROMPT_TEMPLATE: &str = "You are an assistant for question-answering tasks. \
Use the following pieces of retrieved context to answer the question. \
If you don't know the answer, just say that you don't know. \
Use three sentences maximum and keep the answer concise.\n\
Question: {input}\n\
Context: {context}\n\
Answer:";

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Completion request failed: {0}")]
    Request(String),

    #[error("Completion service returned status {0}")]
    Status(u16),

    #[error("Completion response had no content")]
    EmptyResponse,
}

/// Join chunk contents into one context block
pub fn format_context(chunks: &[DocumentChunk]) -> String {
    chunks
        .iter()
        .map(|c| c.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn render_prompt(question: &str, chunks: &[DocumentChunk]) -> String {
    let context = format_context(chunks);
    let mut prompt = String::with_capacity(PROMPT_TEMPLATE.len() + question.len() + context.len());

    // Placeholders are filled in one pass, so braces inside the question or a
    // chunk are never expanded.
    let mut rest = PROMPT_TEMPLATE;
    while let Some(start) = rest.find('{') {
        prompt.push_str(&rest[..start]);
        let tail = &rest[start..];
        if let Some(after) = tail.strip_prefix("{input}") {
            prompt.push_str(question);
            rest = after;
        } else if let Some(after) = tail.strip_prefix("{context}") {
            prompt.push_str(&context);
            rest = after;
        } else {
            prompt.push('{');
            rest = &tail[1..];
        }
    }
    prompt.push_str(rest);
    prompt
}

/// Produces a natural-language answer from a question and its context
#[async_trait]
pub trait AnswerSynthesizer: Send + Sync {
    async fn answer(&self, question: &str, context: &[DocumentChunk]) -> Result<String, LlmError>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// OpenAI `/chat/completions` client
pub struct OpenAiChat {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiChat {
    pub fn new(config: &OpenAiConfig, model: impl Into<String>) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| LlmError::Request(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.expose().to_string(),
            model: model.into(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl AnswerSynthesizer for OpenAiChat {
    async fn answer(&self, question: &str, context: &[DocumentChunk]) -> Result<String, LlmError> {
        let prompt = render_prompt(question, context);
        debug!(model = %self.model, chunks = context.len(), "Requesting completion");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&ChatRequest {
                model: &self.model,
                messages: vec![ChatMessage {
                    role: "user",
                    content: &prompt,
                }],
            })
            .send()
            .await
            .map_err(|e| LlmError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(LlmError::Status(response.status().as_u16()));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Request(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(LlmError::EmptyResponse)
    }
}
