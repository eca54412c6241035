// Extractor Agent: pulls scored evidence fragments out of retrieved documents

use std::sync::Arc;
use tracing::{info, warn};

use super::sources::{EvidenceSource, RetrievedDocument};
use crate::error::LlmError;
use crate::llm::{generate_structured, LanguageModel, Prompt};
use crate::models::{is_unit_score, EvidenceFragment, ExtractedInformation};

/// Documents examined per iteration.
pub const MAX_DOCUMENTS: usize = 3;
/// Document text handed to the model is cut to this many characters.
pub const MAX_DOC_CHARS: usize = 3000;

pub struct ExtractorAgent {
    llm: Arc<dyn LanguageModel>,
}

impl ExtractorAgent {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }

    /// Accepted fragments from the first [`MAX_DOCUMENTS`] documents. A
    /// document whose extraction fails contributes nothing.
    pub async fn extract_all(
        &self,
        source: &dyn EvidenceSource,
        question: &str,
        documents: &[RetrievedDocument],
        threshold: f64,
    ) -> Vec<EvidenceFragment> {
        let mut accepted = Vec::new();
        for (i, document) in documents.iter().take(MAX_DOCUMENTS).enumerate() {
            match self.extract(source, question, document, threshold).await {
                Ok(fragments) => {
                    info!(
                        "Extractor[{}]: document {} yielded {} accepted fragments",
                        source.tag(),
                        i + 1,
                        fragments.len()
                    );
                    accepted.extend(fragments);
                }
                Err(e) => warn!("Extractor[{}]: document {} skipped: {}", source.tag(), i + 1, e),
            }
        }
        accepted
    }

    pub async fn extract(
        &self,
        source: &dyn EvidenceSource,
        question: &str,
        document: &RetrievedDocument,
        threshold: f64,
    ) -> Result<Vec<EvidenceFragment>, LlmError> {
        let content: String = document.content.chars().take(MAX_DOC_CHARS).collect();
        let prompt = Prompt::new(
            source.extraction_system(),
            format!("[질문]\n{}\n\n[문서]\n{}", question, content),
        );

        let extracted: ExtractedInformation = generate_structured(self.llm.as_ref(), &prompt).await?;

        match extracted.query_relevance {
            Some(relevance) if !is_unit_score(relevance) => {
                return Err(LlmError::Parse(format!("query_relevance {} outside [0, 1]", relevance)));
            }
            Some(relevance) if relevance < threshold => {
                info!("Extractor[{}]: document relevance {:.2} below threshold", source.tag(), relevance);
                return Ok(Vec::new());
            }
            None if source.requires_document_relevance() => {
                return Err(LlmError::Parse("missing query_relevance".to_string()));
            }
            _ => {}
        }

        let (graded, malformed): (Vec<_>, Vec<_>) = extracted
            .strips
            .into_iter()
            .map(|strip| EvidenceFragment {
                content: strip.content,
                relevance: strip.relevance_score,
                faithfulness: strip.faithfulness_score,
                source: document.source.clone(),
            })
            .partition(EvidenceFragment::scores_valid);
        if !malformed.is_empty() {
            warn!(
                "Extractor[{}]: dropped {} strips scored outside [0, 1]",
                source.tag(),
                malformed.len()
            );
        }

        Ok(graded.into_iter().filter(|fragment| fragment.passes(threshold)).collect())
    }
}
