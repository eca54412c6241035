//! Bounded retrieve, extract, rewrite cycle shared by every evidence source.
//!
//! The loop is a small state machine. Each step produces a [`LoopDelta`] that
//! is folded into [`LoopState`]; after extraction [`decide`] picks between a
//! rewrite and the terminal synthesis. Every executed step is charged to the
//! graph-wide [`StepBudget`].

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use super::extractor::ExtractorAgent;
use super::graph::StepBudget;
use super::rewriter::RewriterAgent;
use super::sources::{EvidenceSource, Retrieved, RetrievedDocument};
use crate::config::LoopLimits;
use crate::error::AgentError;
use crate::llm::LanguageModel;
use crate::metrics;
use crate::models::{EvidenceFragment, SourceTag};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopStep {
    Retrieve,
    ExtractAndScore,
    Rewrite,
    Synthesize,
    Done,
}

impl LoopStep {
    pub fn name(self) -> &'static str {
        match self {
            LoopStep::Retrieve => "retrieve",
            LoopStep::ExtractAndScore => "extract_and_score",
            LoopStep::Rewrite => "rewrite",
            LoopStep::Synthesize => "synthesize",
            LoopStep::Done => "done",
        }
    }

    /// Allowed transitions out of this step.
    pub fn successors(self) -> &'static [LoopStep] {
        match self {
            LoopStep::Retrieve => &[LoopStep::ExtractAndScore],
            LoopStep::ExtractAndScore => &[LoopStep::Rewrite, LoopStep::Synthesize],
            LoopStep::Rewrite => &[LoopStep::Retrieve],
            LoopStep::Synthesize => &[LoopStep::Done],
            LoopStep::Done => &[],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Continue,
    Stop,
}

/// Stop once the generation ceiling is reached or any evidence was accepted.
pub fn decide(state: &LoopState, limits: &LoopLimits) -> Decision {
    if state.generation >= limits.max_generations || !state.fragments.is_empty() {
        Decision::Stop
    } else {
        Decision::Continue
    }
}

/// State owned by one loop run.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopState {
    pub question: String,
    pub query: String,
    pub documents: Vec<RetrievedDocument>,
    pub fragments: Vec<EvidenceFragment>,
    pub generation: u32,
    pub citations: Vec<String>,
    pub answer: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoopDelta {
    Retrieved(Retrieved),
    Extracted(Vec<EvidenceFragment>),
    Rewritten(String),
    Synthesized(String),
}

impl LoopState {
    pub fn new(question: &str) -> Self {
        Self {
            question: question.to_string(),
            query: question.to_string(),
            documents: Vec::new(),
            fragments: Vec::new(),
            generation: 0,
            citations: Vec::new(),
            answer: None,
        }
    }

    pub fn apply(&mut self, delta: LoopDelta) {
        match delta {
            LoopDelta::Retrieved(retrieved) => {
                self.documents = retrieved.documents;
                for citation in retrieved.citations {
                    if !self.citations.contains(&citation) {
                        self.citations.push(citation);
                    }
                }
            }
            LoopDelta::Extracted(fragments) => {
                self.fragments.extend(fragments);
                self.generation += 1;
            }
            LoopDelta::Rewritten(query) => self.query = query,
            LoopDelta::Synthesized(answer) => self.answer = Some(answer),
        }
    }
}

/// Terminal output of one loop run. An empty `answer` means the loop found
/// nothing worth reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopOutput {
    pub tag: SourceTag,
    pub answer: String,
    pub citations: Vec<String>,
    pub generations: u32,
    pub accepted: usize,
}

/// A search agent as seen by the graph.
#[async_trait]
pub trait SearchAgent: Send + Sync {
    fn tag(&self) -> SourceTag;
    fn label(&self) -> &'static str;
    fn not_found_answer(&self) -> &'static str;
    fn failure_answer(&self) -> &'static str;
    async fn run(&self, question: &str, budget: &StepBudget) -> Result<LoopOutput, AgentError>;
}

pub struct RetrievalLoop<S> {
    source: S,
    llm: Arc<dyn LanguageModel>,
    extractor: ExtractorAgent,
    rewriter: RewriterAgent,
    limits: LoopLimits,
}

impl<S: EvidenceSource> RetrievalLoop<S> {
    pub fn new(source: S, llm: Arc<dyn LanguageModel>, limits: LoopLimits) -> Self {
        Self {
            source,
            extractor: ExtractorAgent::new(llm.clone()),
            rewriter: RewriterAgent::new(llm.clone()),
            llm,
            limits,
        }
    }

    async fn synthesize(&self, state: &LoopState) -> Result<String, AgentError> {
        let prompt = self
            .source
            .answer_prompt(&state.question, &state.fragments, &state.citations);
        let answer = self.llm.generate(&prompt).await?;
        let answer = answer.trim();
        if answer.is_empty() {
            warn!("Loop[{}]: synthesis returned nothing", self.source.tag());
        }
        Ok(answer.to_string())
    }
}

#[async_trait]
impl<S: EvidenceSource> SearchAgent for RetrievalLoop<S> {
    fn tag(&self) -> SourceTag {
        self.source.tag()
    }

    fn label(&self) -> &'static str {
        self.source.label()
    }

    fn not_found_answer(&self) -> &'static str {
        self.source.not_found_answer()
    }

    fn failure_answer(&self) -> &'static str {
        self.source.failure_answer()
    }

    async fn run(&self, question: &str, budget: &StepBudget) -> Result<LoopOutput, AgentError> {
        let tag = self.source.tag();
        let mut state = LoopState::new(question);
        let mut step = LoopStep::Retrieve;

        while step != LoopStep::Done {
            budget.charge(&format!("{}.{}", tag, step.name()))?;

            let next = match step {
                LoopStep::Retrieve => {
                    let retrieved = self.source.retrieve(&state.query).await?;
                    info!("Loop[{}]: retrieved {} documents", tag, retrieved.documents.len());
                    state.apply(LoopDelta::Retrieved(retrieved));
                    LoopStep::ExtractAndScore
                }
                LoopStep::ExtractAndScore => {
                    let fragments = self
                        .extractor
                        .extract_all(
                            &self.source,
                            &state.question,
                            &state.documents,
                            self.limits.acceptance_threshold,
                        )
                        .await;
                    state.apply(LoopDelta::Extracted(fragments));
                    let decision = decide(&state, &self.limits);
                    info!(
                        "Loop[{}]: generation {} holds {} fragments, {:?}",
                        tag,
                        state.generation,
                        state.fragments.len(),
                        decision
                    );
                    match decision {
                        Decision::Continue => LoopStep::Rewrite,
                        Decision::Stop => LoopStep::Synthesize,
                    }
                }
                LoopStep::Rewrite => {
                    let query = self
                        .rewriter
                        .rewrite(&self.source, &state.question, &state.fragments)
                        .await?;
                    state.apply(LoopDelta::Rewritten(query));
                    LoopStep::Retrieve
                }
                LoopStep::Synthesize => {
                    let answer = self.synthesize(&state).await?;
                    state.apply(LoopDelta::Synthesized(answer));
                    LoopStep::Done
                }
                LoopStep::Done => LoopStep::Done,
            };
            debug_assert!(step.successors().contains(&next));
            step = next;
        }

        metrics::record_loop_run(tag.as_str(), state.generation, state.fragments.len());
        Ok(LoopOutput {
            tag,
            answer: state.answer.unwrap_or_default(),
            citations: state.citations,
            generations: state.generation,
            accepted: state.fragments.len(),
        })
    }
}
