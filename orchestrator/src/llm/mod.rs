//! Language-model capability.
//!
//! Agents only see the [`LanguageModel`] trait. Structured calls go through
//! [`generate_structured`], which derives a JSON schema from the target type
//! and deserializes the model's JSON reply into it.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::LlmError;

pub mod gemini;
#[cfg(test)]
pub mod scripted;

pub use gemini::GeminiClient;

/// A system instruction plus the user turn.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Provider name for logs.
    fn name(&self) -> &str;

    /// Free-text generation.
    async fn generate(&self, prompt: &Prompt) -> Result<String, LlmError>;

    /// Generation constrained to a JSON value matching `schema`.
    async fn generate_json(&self, prompt: &Prompt, schema: &Value) -> Result<Value, LlmError>;
}

/// Runs a structured call and deserializes the reply into `T`.
pub async fn generate_structured<T>(llm: &dyn LanguageModel, prompt: &Prompt) -> Result<T, LlmError>
where
    T: DeserializeOwned + JsonSchema,
{
    let schema = serde_json::to_value(schemars::schema_for!(T))
        .map_err(|e| LlmError::Parse(e.to_string()))?;
    let value = llm.generate_json(prompt, &schema).await?;
    serde_json::from_value(value).map_err(|e| LlmError::Parse(e.to_string()))
}

/// Parses model output as JSON, tolerating a surrounding markdown fence.
pub fn parse_json_reply(text: &str) -> Result<Value, LlmError> {
    let trimmed = strip_code_fence(text);
    serde_json::from_str(trimmed).map_err(|e| {
        let preview: String = trimmed.chars().take(120).collect();
        LlmError::Parse(format!("{} in {:?}", e, preview))
    })
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // drop an optional language tag on the opening fence line
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}
