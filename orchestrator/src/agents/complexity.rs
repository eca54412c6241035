// Complexity Gate: decides whether the fine-tuned endpoint may answer alone

use std::sync::Arc;
use tracing::{info, warn};

use super::prompts;
use crate::llm::{generate_structured, LanguageModel, Prompt};
use crate::models::{Complexity, QuestionComplexity};

pub struct ComplexityGate {
    llm: Arc<dyn LanguageModel>,
}

impl ComplexityGate {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }

    /// Any classification failure resolves to `Complex`.
    pub async fn classify(&self, question: &str, verbose: bool) -> Complexity {
        let prompt = Prompt::new(
            prompts::COMPLEXITY_SYSTEM,
            format!("다음 질문을 분류하세요:\n\n{}", question),
        );

        match generate_structured::<QuestionComplexity>(self.llm.as_ref(), &prompt).await {
            Ok(result) => {
                info!("Complexity: {:?}", result.complexity);
                detail!(verbose, "Complexity: reason = {}", result.reason);
                result.complexity
            }
            Err(e) => {
                warn!("Complexity: classification failed, defaulting to complex: {}", e);
                Complexity::Complex
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::scripted::ScriptedLlm;

    const NEEDLE: &str = "복잡도를 분류하는 분류기";

    #[tokio::test]
    async fn generic_study_question_is_simple() {
        let llm = Arc::new(ScriptedLlm::new().reply(NEEDLE, r#"{"complexity": "simple", "reason": "일반 학습 조언"}"#));
        let gate = ComplexityGate::new(llm.clone());
        assert_eq!(gate.classify("수학 공부는 어떻게 해야 할까요?", true).await, Complexity::Simple);
        assert_eq!(llm.hits(NEEDLE), 1);
        assert!(llm.prompts()[0].user.contains("수학 공부는"));
    }

    #[tokio::test]
    async fn llm_failure_defaults_to_complex() {
        let gate = ComplexityGate::new(Arc::new(ScriptedLlm::new().fail(NEEDLE)));
        assert_eq!(gate.classify("수학 공부는 어떻게 해야 할까요?", false).await, Complexity::Complex);
    }

    #[tokio::test]
    async fn malformed_output_defaults_to_complex() {
        let gate = ComplexityGate::new(Arc::new(ScriptedLlm::new().reply(NEEDLE, "simple!")));
        assert_eq!(gate.classify("q", false).await, Complexity::Complex);
    }
}
