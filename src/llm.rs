//! LLM client contract consumed by collaborator nodes.
//!
//! The engine itself never talks to a provider; LLM-bearing nodes hold an
//! `Arc<dyn LlmClient>` and translate between workflow state and these
//! request/response records. Streaming responses are lazy chunk streams.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::message::{Message, ToolCall};

/// Tool a model may call, described to the provider.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON schema of the tool's arguments.
    pub parameters: Value,
}

/// A generation request.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmRequest {
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub tools: Option<Vec<ToolSpec>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub system_prompt: Option<String>,
}

impl LlmRequest {
    #[must_use]
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    #[must_use]
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    #[must_use]
    pub fn with_tools(mut self, tools: Vec<ToolSpec>) -> Self {
        self.tools = Some(tools);
        self
    }
}

/// A completed generation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmResponse {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub model: Option<String>,
    pub tokens_used: u32,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub finish_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub tool_calls: Option<Vec<ToolCall>>,
}

/// Provider-side failures.
#[derive(Debug, Error, Diagnostic)]
pub enum LlmError {
    #[error("provider error ({provider}): {message}")]
    #[diagnostic(code(filament::llm::provider))]
    Provider {
        provider: &'static str,
        message: String,
    },

    #[error("rate limited by provider: {0}")]
    #[diagnostic(code(filament::llm::rate_limited))]
    RateLimited(String),

    #[error(transparent)]
    #[diagnostic(code(filament::llm::serde_json))]
    Serde(#[from] serde_json::Error),
}

/// Lazy sequence of response chunks from a streaming generation.
pub type LlmChunkStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

/// Provider-agnostic generation interface.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// One-shot generation.
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse, LlmError>;

    /// Streaming generation; chunks arrive as the provider produces them.
    async fn generate_streaming(&self, request: LlmRequest) -> Result<LlmChunkStream, LlmError>;
}
