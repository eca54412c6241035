//! Evidence sources bound to a retrieval loop.
//!
//! A source couples an adapter with its extraction schema and the prompts its
//! loop uses; the loop itself is identical for every source.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use super::prompts;
use crate::adapters::{GuidelineSearch, WebSearch, GUIDELINE_TOP_K, WEB_TOP_K};
use crate::error::AdapterError;
use crate::llm::Prompt;
use crate::models::{EvidenceFragment, SourceTag};

pub const NO_INFORMATION: &str = "관련 정보를 찾을 수 없습니다.";

/// Web results actually handed to extraction.
pub const WEB_CONSUMED: usize = 2;
/// Web snippets are trimmed to this many characters.
pub const WEB_SNIPPET_CHARS: usize = 400;

/// A document ready for extraction, with the identifier fragments inherit.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedDocument {
    pub content: String,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Retrieved {
    pub documents: Vec<RetrievedDocument>,
    pub citations: Vec<String>,
}

impl Retrieved {
    /// Stand-in for an empty result so extraction always sees a document.
    pub fn placeholder(source: &str) -> Self {
        Self {
            documents: vec![RetrievedDocument {
                content: NO_INFORMATION.to_string(),
                source: source.to_string(),
            }],
            citations: Vec::new(),
        }
    }
}

#[async_trait]
pub trait EvidenceSource: Send + Sync {
    fn tag(&self) -> SourceTag;

    /// Heading put in front of the loop's answer for the summarizer.
    fn label(&self) -> &'static str;

    /// Answer used when the loop produced nothing.
    fn not_found_answer(&self) -> &'static str;

    /// Answer used when the loop failed.
    fn failure_answer(&self) -> &'static str;

    async fn retrieve(&self, query: &str) -> Result<Retrieved, AdapterError>;

    fn extraction_system(&self) -> &'static str;

    /// Whether extraction must report a document-level relevance score.
    fn requires_document_relevance(&self) -> bool;

    fn rewrite_system(&self) -> &'static str;

    fn answer_prompt(&self, question: &str, evidence: &[EvidenceFragment], citations: &[String]) -> Prompt;
}

pub struct GuidelineSource {
    index: Arc<dyn GuidelineSearch>,
}

impl GuidelineSource {
    pub fn new(index: Arc<dyn GuidelineSearch>) -> Self {
        Self { index }
    }
}

#[async_trait]
impl EvidenceSource for GuidelineSource {
    fn tag(&self) -> SourceTag {
        SourceTag::Guideline
    }

    fn label(&self) -> &'static str {
        "[GuidelineDB 검색 결과]"
    }

    fn not_found_answer(&self) -> &'static str {
        "GuidelineDB에서 관련 정보를 찾을 수 없습니다."
    }

    fn failure_answer(&self) -> &'static str {
        "GuidelineDB 검색 중 오류가 발생했습니다."
    }

    async fn retrieve(&self, query: &str) -> Result<Retrieved, AdapterError> {
        let docs = self.index.search(query, GUIDELINE_TOP_K).await?;
        if docs.is_empty() {
            info!("Retriever[guideline]: no documents for {:?}", query);
            return Ok(Retrieved::placeholder("guidelineDB"));
        }

        let citations = docs
            .iter()
            .map(|d| format!("GuidelineDB ({})", d.source_detail))
            .collect();
        let documents = docs
            .into_iter()
            .map(|d| RetrievedDocument {
                content: format!("Q: {}\nA: {}", d.question.trim(), d.answer.trim()),
                source: d.source_detail,
            })
            .collect();
        Ok(Retrieved { documents, citations })
    }

    fn extraction_system(&self) -> &'static str {
        prompts::GUIDELINE_EXTRACT_SYSTEM
    }

    fn requires_document_relevance(&self) -> bool {
        false
    }

    fn rewrite_system(&self) -> &'static str {
        prompts::GUIDELINE_REWRITE_SYSTEM
    }

    fn answer_prompt(&self, question: &str, evidence: &[EvidenceFragment], citations: &[String]) -> Prompt {
        let info = evidence
            .iter()
            .map(|f| format!("- {} (출처: {})", f.content, f.source))
            .collect::<Vec<_>>()
            .join("\n");
        let sources = citations
            .iter()
            .map(|c| format!("- {}", c))
            .collect::<Vec<_>>()
            .join("\n");
        Prompt::new(
            prompts::GUIDELINE_ANSWER_SYSTEM,
            format!("질문: {}\n\n관련 정보:\n{}\n\n참고 출처:\n{}", question, info, sources),
        )
    }
}

pub struct WebSource {
    search: Arc<dyn WebSearch>,
}

impl WebSource {
    pub fn new(search: Arc<dyn WebSearch>) -> Self {
        Self { search }
    }
}

#[async_trait]
impl EvidenceSource for WebSource {
    fn tag(&self) -> SourceTag {
        SourceTag::Web
    }

    fn label(&self) -> &'static str {
        "[웹 검색 결과]"
    }

    fn not_found_answer(&self) -> &'static str {
        "웹 검색에서 관련 정보를 찾을 수 없습니다."
    }

    fn failure_answer(&self) -> &'static str {
        "웹 검색 중 오류가 발생했습니다."
    }

    async fn retrieve(&self, query: &str) -> Result<Retrieved, AdapterError> {
        let mut docs = self.search.search(query, WEB_TOP_K).await?;
        docs.truncate(WEB_CONSUMED);
        if docs.is_empty() {
            info!("Retriever[web]: no documents for {:?}", query);
            return Ok(Retrieved::placeholder("web search"));
        }

        let citations = docs.iter().map(|d| format!("{} ({})", d.title, d.url)).collect();
        let documents = docs
            .into_iter()
            .map(|d| {
                let snippet: String = d.snippet.chars().take(WEB_SNIPPET_CHARS).collect();
                RetrievedDocument {
                    content: format!("제목: {}\n출처 URL: {}\n내용 요약: {}", d.title, d.url, snippet),
                    source: d.url,
                }
            })
            .collect();
        Ok(Retrieved { documents, citations })
    }

    fn extraction_system(&self) -> &'static str {
        prompts::WEB_EXTRACT_SYSTEM
    }

    fn requires_document_relevance(&self) -> bool {
        true
    }

    fn rewrite_system(&self) -> &'static str {
        prompts::WEB_REWRITE_SYSTEM
    }

    fn answer_prompt(&self, question: &str, evidence: &[EvidenceFragment], _citations: &[String]) -> Prompt {
        let info = evidence
            .iter()
            .map(|f| {
                format!(
                    "- {} (출처: {}, 관련성: {:.2}, 충실성: {:.2})",
                    f.content, f.source, f.relevance, f.faithfulness
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
        Prompt::new(
            prompts::WEB_ANSWER_SYSTEM,
            format!("질문: {}\n\n추출된 정보:\n{}", question, info),
        )
    }
}
