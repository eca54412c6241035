// Router Agent: selects which evidence sources a question needs

use std::sync::Arc;
use tracing::{info, warn};

use super::prompts;
use crate::llm::{generate_structured, LanguageModel, Prompt};
use crate::models::{QuestionContext, RoutingDecision, ToolSelectors};

pub struct RouterAgent {
    llm: Arc<dyn LanguageModel>,
}

impl RouterAgent {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }

    /// Classifier failures, unknown labels and empty selections all route
    /// to both sources.
    pub async fn route(&self, ctx: &QuestionContext, verbose: bool) -> RoutingDecision {
        let prompt = Prompt::new(prompts::ROUTER_SYSTEM, ctx.enriched_question());

        let decision = match generate_structured::<ToolSelectors>(self.llm.as_ref(), &prompt).await {
            Ok(selectors) => {
                detail!(verbose, "Router: raw selection {:?}", selectors.tools);
                RoutingDecision::from_labels(&selectors.tools)
            }
            Err(e) => {
                warn!("Router: classification failed, querying every source: {}", e);
                RoutingDecision::both()
            }
        };
        info!("Router: selected {:?}", decision.labels());
        decision
    }
}
