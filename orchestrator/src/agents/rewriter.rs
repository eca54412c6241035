// Rewriter Agent: proposes a better search query when evidence is missing

use std::sync::Arc;
use tracing::info;

use super::sources::EvidenceSource;
use crate::error::LlmError;
use crate::llm::{generate_structured, LanguageModel, Prompt};
use crate::models::{EvidenceFragment, RefinedQuestion};

pub struct RewriterAgent {
    llm: Arc<dyn LanguageModel>,
}

impl RewriterAgent {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }

    pub async fn rewrite(
        &self,
        source: &dyn EvidenceSource,
        question: &str,
        evidence: &[EvidenceFragment],
    ) -> Result<String, LlmError> {
        let info = evidence
            .iter()
            .map(|f| f.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = Prompt::new(
            source.rewrite_system(),
            format!("질문: {}\n\n추출된 정보:\n{}", question, info),
        );

        let refined: RefinedQuestion = generate_structured(self.llm.as_ref(), &prompt).await?;
        let query = refined.question_refined.trim().to_string();
        if query.is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        info!("Rewriter[{}]: new query {:?}", source.tag(), query);
        Ok(query)
    }
}
