//! Agent graph: prepare context, route, fan out to the selected retrieval
//! loops, then merge their answers.
//!
//! The whole invocation runs under a step ceiling shared by every node,
//! including the nodes of each loop, and a wall-clock timeout. Each selected
//! loop runs on its own task; results are merged in tag order.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn, Instrument};

use super::retrieval_loop::{LoopOutput, SearchAgent};
use super::{RouterAgent, SummarizerAgent, ANALYZE_QUESTION_NODE, GENERATE_ANSWER_NODE, PREPARE_CONTEXT_NODE};
use crate::config::GraphBudget;
use crate::error::AgentError;
use crate::models::QuestionContext;

/// Shared step counter for one graph invocation.
#[derive(Debug)]
pub struct StepBudget {
    limit: usize,
    used: AtomicUsize,
}

impl StepBudget {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            used: AtomicUsize::new(0),
        }
    }

    /// Records one executed node; fails once the limit is exceeded.
    pub fn charge(&self, node: &str) -> Result<(), AgentError> {
        let used = self.used.fetch_add(1, Ordering::SeqCst) + 1;
        if used > self.limit {
            warn!("Graph: step limit {} exceeded at {}", self.limit, node);
            return Err(AgentError::StepLimitExceeded { limit: self.limit });
        }
        debug!("Graph: step {} -> {}", used, node);
        Ok(())
    }

    pub fn used(&self) -> usize {
        self.used.load(Ordering::SeqCst).min(self.limit + 1)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphOutcome {
    pub final_answer: String,
    pub context: String,
    pub datasources: Vec<String>,
}

pub struct AgentGraph {
    router: RouterAgent,
    agents: Vec<Arc<dyn SearchAgent>>,
    summarizer: SummarizerAgent,
    budget: GraphBudget,
}

impl AgentGraph {
    pub fn new(
        router: RouterAgent,
        guideline: Arc<dyn SearchAgent>,
        web: Arc<dyn SearchAgent>,
        summarizer: SummarizerAgent,
        budget: GraphBudget,
    ) -> Self {
        Self {
            router,
            agents: vec![guideline, web],
            summarizer,
            budget,
        }
    }

    pub async fn run(&self, ctx: &QuestionContext, verbose: bool) -> Result<GraphOutcome, AgentError> {
        match tokio::time::timeout(self.budget.timeout, self.execute(ctx, verbose)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Graph: timed out after {:?}", self.budget.timeout);
                Err(AgentError::Timeout {
                    secs: self.budget.timeout.as_secs(),
                })
            }
        }
    }

    async fn execute(&self, ctx: &QuestionContext, verbose: bool) -> Result<GraphOutcome, AgentError> {
        let steps = Arc::new(StepBudget::new(self.budget.step_limit));

        steps.charge(PREPARE_CONTEXT_NODE)?;
        detail!(verbose, "Graph: context = {}", ctx.context());

        steps.charge(ANALYZE_QUESTION_NODE)?;
        let decision = self.router.route(ctx, verbose).await;

        let selected: Vec<Arc<dyn SearchAgent>> = decision
            .sources()
            .iter()
            .filter_map(|tag| self.agents.iter().find(|agent| agent.tag() == *tag).cloned())
            .collect();

        let runs = self.fan_out(&selected, ctx.enriched_question(), &steps).await;

        let mut documents = Vec::with_capacity(runs.len());
        for (agent, run) in selected.iter().zip(runs) {
            let answer = match run {
                None => agent.failure_answer().to_string(),
                Some(Ok(output)) if output.answer.is_empty() => agent.not_found_answer().to_string(),
                Some(Ok(output)) => {
                    info!(
                        "Graph: {} finished after {} generations with {} fragments",
                        output.tag, output.generations, output.accepted
                    );
                    format!("{}\n{}", agent.label(), output.answer)
                }
                Some(Err(e)) if e.is_budget() => return Err(e),
                Some(Err(e)) => {
                    warn!("Graph: {} failed: {}", agent.tag(), e);
                    agent.failure_answer().to_string()
                }
            };
            documents.push(answer);
        }

        steps.charge(GENERATE_ANSWER_NODE)?;
        let final_answer = self.summarizer.summarize(ctx, &documents).await?;
        info!("Graph: finished in {} steps", steps.used());

        Ok(GraphOutcome {
            final_answer,
            context: ctx.context().to_string(),
            datasources: decision.labels(),
        })
    }

    /// Runs every selected loop on its own task. Slot `i` holds the result of
    /// `agents[i]`; `None` means the task was cancelled. A panicking loop
    /// resumes its panic here.
    async fn fan_out(
        &self,
        agents: &[Arc<dyn SearchAgent>],
        question: String,
        steps: &Arc<StepBudget>,
    ) -> Vec<Option<Result<LoopOutput, AgentError>>> {
        let mut tasks = JoinSet::new();
        for (slot, agent) in agents.iter().enumerate() {
            let agent = Arc::clone(agent);
            let question = question.clone();
            let steps = Arc::clone(steps);
            tasks.spawn(
                async move { (slot, agent.run(&question, &steps).await) }.instrument(tracing::Span::current()),
            );
        }

        let mut runs: Vec<Option<Result<LoopOutput, AgentError>>> = agents.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((slot, run)) => runs[slot] = Some(run),
                Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                Err(e) => warn!("Graph: search task cancelled: {}", e),
            }
        }
        runs
    }
}
