//! Fine-tuned FAQ model endpoint.
//!
//! Status-driven retry policy: timeouts, network failures and 5xx responses
//! are retried immediately up to `max_retries` attempts in total; 400 and any
//! other unexpected status are returned on the first attempt.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

use super::FinetunedModel;
use crate::error::FinetunedError;
use crate::metrics;

pub const NO_ANSWER: &str = "답변을 생성할 수 없습니다.";

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GenerationParams {
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub repetition_penalty: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: 100,
            temperature: 0.3,
            top_k: 50,
            top_p: 0.95,
            repetition_penalty: 1.2,
        }
    }
}

#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    question: &'a str,
    #[serde(flatten)]
    params: GenerationParams,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    #[serde(default)]
    answer: Option<String>,
}

pub struct FinetunedClient {
    client: reqwest::Client,
    endpoint: String,
    max_retries: u32,
}

impl FinetunedClient {
    pub fn new(endpoint: &str, timeout: Duration, max_retries: u32) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            endpoint: endpoint.to_string(),
            max_retries: max_retries.max(1),
        }
    }

    pub async fn predict(&self, question: &str, params: &GenerationParams) -> Result<String, FinetunedError> {
        let payload = PredictRequest {
            question,
            params: *params,
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            let last_attempt = attempt >= self.max_retries;
            info!("Finetuned: calling model (attempt {}/{})", attempt, self.max_retries);

            let result = self.client.post(&self.endpoint).json(&payload).send().await;
            let retryable = match result {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    match status {
                        200 => {
                            metrics::record_finetuned_attempt("success");
                            let body: PredictResponse =
                                resp.json().await.map_err(|e| FinetunedError::Malformed {
                                    attempts: attempt,
                                    detail: truncate(&e.to_string(), 50),
                                })?;
                            return Ok(body.answer.unwrap_or_else(|| NO_ANSWER.to_string()));
                        }
                        400 => {
                            metrics::record_finetuned_attempt("client_error");
                            warn!("Finetuned: request rejected with 400, not retrying");
                            return Err(FinetunedError::ClientError { attempts: attempt });
                        }
                        500..=599 => {
                            metrics::record_finetuned_attempt("server_error");
                            warn!("Finetuned: server error {} (attempt {}/{})", status, attempt, self.max_retries);
                            FinetunedError::ServerError {
                                attempts: attempt,
                                status,
                            }
                        }
                        _ => {
                            metrics::record_finetuned_attempt("unexpected_status");
                            warn!("Finetuned: unexpected status {}", status);
                            return Err(FinetunedError::UnexpectedStatus {
                                attempts: attempt,
                                status,
                            });
                        }
                    }
                }
                Err(e) if e.is_timeout() => {
                    metrics::record_finetuned_attempt("timeout");
                    warn!("Finetuned: request timed out (attempt {}/{})", attempt, self.max_retries);
                    FinetunedError::Timeout { attempts: attempt }
                }
                Err(e) => {
                    metrics::record_finetuned_attempt("network_error");
                    warn!("Finetuned: network error: {}", truncate(&e.to_string(), 100));
                    FinetunedError::Network {
                        attempts: attempt,
                        detail: truncate(&e.to_string(), 50),
                    }
                }
            };

            if last_attempt {
                return Err(retryable);
            }
        }
    }
}

#[async_trait]
impl FinetunedModel for FinetunedClient {
    async fn answer(&self, question: &str) -> Result<String, FinetunedError> {
        self.predict(question, &GenerationParams::default()).await
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
