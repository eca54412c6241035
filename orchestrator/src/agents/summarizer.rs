// Summarizer Agent: merges per-source answers into one cited reply

use std::sync::Arc;
use tracing::info;

use super::prompts;
use crate::error::{AgentError, LlmError};
use crate::llm::{LanguageModel, Prompt};
use crate::models::QuestionContext;

pub struct SummarizerAgent {
    llm: Arc<dyn LanguageModel>,
}

impl SummarizerAgent {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }

    /// `documents` are the labeled loop answers in source order.
    pub async fn summarize(&self, ctx: &QuestionContext, documents: &[String]) -> Result<String, AgentError> {
        info!("Summarizer: merging {} source answers", documents.len());

        let prompt = Prompt::new(
            prompts::SUMMARIZER_SYSTEM,
            format!(
                "다음 문서를 사용하여 질문에 답변하세요:\n\n[문서]\n{}\n\n[질문]\n{}",
                documents.join("\n\n"),
                ctx.enriched_question()
            ),
        );

        let answer = self.llm.generate(&prompt).await?;
        let answer = answer.trim();
        if answer.is_empty() {
            return Err(LlmError::EmptyResponse.into());
        }
        Ok(answer.to_string())
    }
}
