// Quick Answer Agent: polishes and grades fine-tuned model answers

use std::sync::Arc;
use tracing::{info, warn};

use super::prompts;
use crate::llm::{generate_structured, LanguageModel, Prompt};
use crate::models::AnswerQuality;

/// Minimum evaluation score (1-10) for a quick answer to be accepted.
pub const PASS_SCORE: u8 = 6;
const SCORE_RANGE: std::ops::RangeInclusive<u8> = 1..=10;

pub struct QuickAnswerAgent {
    llm: Arc<dyn LanguageModel>,
}

impl QuickAnswerAgent {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }

    /// Rewrites the raw answer into a short, concrete reply. Falls back to
    /// the raw answer on any failure.
    pub async fn refine(&self, question: &str, raw_answer: &str, verbose: bool) -> String {
        let prompt = Prompt::new(
            prompts::REFINE_SYSTEM,
            format!(
                "다음 질문과 파인튜닝 모델의 답변을 바탕으로 개선된 답변을 작성해주세요:\n\n[질문]\n{}\n\n[파인튜닝 모델 답변]\n{}\n\n[개선된 답변]",
                question, raw_answer
            ),
        );

        match self.llm.generate(&prompt).await {
            Ok(text) => {
                let refined = clean_refined(&text);
                if refined.is_empty() {
                    warn!("QuickAnswer: refinement came back empty, keeping raw answer");
                    return raw_answer.to_string();
                }
                info!("QuickAnswer: refined answer ({} chars)", refined.chars().count());
                detail!(verbose, "QuickAnswer: raw = {}", preview(raw_answer, 100));
                refined
            }
            Err(e) => {
                warn!("QuickAnswer: refinement failed, keeping raw answer: {}", e);
                raw_answer.to_string()
            }
        }
    }

    /// True when the answer scores at least [`PASS_SCORE`]. Failures count
    /// as a poor answer.
    pub async fn evaluate(&self, question: &str, answer: &str, verbose: bool) -> bool {
        let prompt = Prompt::new(
            prompts::EVALUATE_SYSTEM,
            format!("다음 질문과 답변을 평가하세요:\n\n[질문]\n{}\n\n[답변]\n{}", question, answer),
        );

        match generate_structured::<AnswerQuality>(self.llm.as_ref(), &prompt).await {
            Ok(result) if !SCORE_RANGE.contains(&result.score) => {
                warn!("QuickAnswer: score {} outside 1-10, treating answer as poor", result.score);
                false
            }
            Ok(result) => {
                info!("QuickAnswer: quality score {}/10", result.score);
                detail!(verbose, "QuickAnswer: quality = {}, reason = {}", result.quality, result.reason);
                result.score >= PASS_SCORE
            }
            Err(e) => {
                warn!("QuickAnswer: evaluation failed, treating answer as poor: {}", e);
                false
            }
        }
    }
}

/// Strips wrapper artifacts some models leave around plain-text answers.
pub fn clean_refined(text: &str) -> String {
    let text = text.replace("content=", "");
    let text = text.trim();
    let unquoted = [('\'', '\''), ('"', '"')]
        .iter()
        .find_map(|(open, close)| {
            (text.len() >= 2 && text.starts_with(*open) && text.ends_with(*close))
                .then(|| &text[1..text.len() - 1])
        })
        .unwrap_or(text);
    unquoted.trim().to_string()
}

fn preview(text: &str, max_chars: usize) -> String {
    let mut out: String = text.chars().take(max_chars).collect();
    if text.chars().count() > max_chars {
        out.push_str("...");
    }
    out
}
