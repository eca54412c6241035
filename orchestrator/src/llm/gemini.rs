//! Gemini Provider
//!
//! `LanguageModel` over the Gemini `generateContent` REST endpoint.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use super::{parse_json_reply, LanguageModel, Prompt};
use crate::error::LlmError;

pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

impl GeminiClient {
    pub fn new(base_url: &str, model: &str, api_key: Option<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    fn build_request_body(&self, prompt: &Prompt, schema: Option<&Value>) -> Value {
        let mut system = prompt.system.clone();
        let mut generation_config = json!({ "temperature": 0 });

        if let Some(schema) = schema {
            system.push_str("\n\n반드시 다음 JSON 스키마를 따르는 JSON 객체 하나만 출력하세요:\n");
            system.push_str(&schema.to_string());
            generation_config["responseMimeType"] = json!("application/json");
        }

        json!({
            "systemInstruction": { "parts": [{ "text": system }] },
            "contents": [{ "role": "user", "parts": [{ "text": prompt.user }] }],
            "generationConfig": generation_config,
        })
    }

    async fn call(&self, body: Value) -> Result<String, LlmError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| LlmError::AuthenticationFailed("GOOGLE_API_KEY is not configured".to_string()))?;

        let resp = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let error_text = resp.text().await.unwrap_or_default();
            return Err(LlmError::from_status(status.as_u16(), &error_text));
        }

        let parsed: GenerateResponse = resp.json().await?;
        let text = extract_text(parsed);
        if text.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        debug!("Gemini: {} chars from {}", text.len(), self.model);
        Ok(text)
    }
}

fn extract_text(response: GenerateResponse) -> String {
    response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default()
}

#[async_trait]
impl LanguageModel for GeminiClient {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &Prompt) -> Result<String, LlmError> {
        let body = self.build_request_body(prompt, None);
        self.call(body).await
    }

    async fn generate_json(&self, prompt: &Prompt, schema: &Value) -> Result<Value, LlmError> {
        let body = self.build_request_body(prompt, Some(schema));
        let text = self.call(body).await?;
        parse_json_reply(&text)
    }
}
