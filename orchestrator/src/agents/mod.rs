//! Agents of the answer pipeline.
//!
//! `complexity` and `quick_answer` serve the fine-tuned path; the remaining
//! modules make up the agent graph: router, one retrieval loop per evidence
//! source, and the summarizer.

/// Per-stage diagnostics: `info` when the caller asked for verbose output,
/// `debug` otherwise.
macro_rules! detail {
    ($verbose:expr, $($arg:tt)+) => {
        if $verbose {
            tracing::info!($($arg)+)
        } else {
            tracing::debug!($($arg)+)
        }
    };
}
pub(crate) use detail;

pub mod complexity;
pub mod extractor;
pub mod graph;
pub mod prompts;
pub mod quick_answer;
pub mod retrieval_loop;
pub mod rewriter;
pub mod router;
pub mod sources;
pub mod summarizer;

pub use complexity::ComplexityGate;
pub use graph::AgentGraph;
pub use quick_answer::QuickAnswerAgent;
pub use retrieval_loop::RetrievalLoop;
pub use router::RouterAgent;
pub use sources::{GuidelineSource, WebSource};
pub use summarizer::SummarizerAgent;

// Graph node names used in logs and step accounting
pub const PREPARE_CONTEXT_NODE: &str = "prepare_context";
pub const ANALYZE_QUESTION_NODE: &str = "analyze_question";
pub const GENERATE_ANSWER_NODE: &str = "generate_answer";
