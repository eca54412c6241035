//! Top-level entry point: complexity gate, fine-tuned quick path with
//! quality-gated fallback, agent graph, response envelope.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::adapters::{FinetunedModel, GuidelineSearch, WebSearch};
use crate::agents::{
    detail, AgentGraph, ComplexityGate, GuidelineSource, QuickAnswerAgent, RetrievalLoop, RouterAgent,
    SummarizerAgent, WebSource,
};
use crate::config::{GraphBudget, LoopLimits};
use crate::error::AgentError;
use crate::llm::LanguageModel;
use crate::metrics;
use crate::models::{ChatRequest, Complexity, Dialogue, Envelope, ModelPath, QuestionContext, StudentProfile};

pub const ERROR_ANSWER: &str = "오류로 인해 답변을 생성하지 못했습니다.";
/// Error details in an envelope are cut to this many characters.
pub const MAX_ERROR_CHARS: usize = 200;

/// Data sources reported for an accepted quick answer.
const QUICK_PATH_SOURCES: [&str; 2] = ["finetuned_model", "llm_refinement"];

#[derive(Debug, Clone, Default)]
pub struct AnswerRequest {
    pub question: String,
    pub profile: StudentProfile,
    pub dialogues: Vec<Dialogue>,
    pub verbose: bool,
    pub force_mode: Option<Complexity>,
}

impl AnswerRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            ..Self::default()
        }
    }
}

impl From<ChatRequest> for AnswerRequest {
    fn from(req: ChatRequest) -> Self {
        Self {
            question: req.question,
            profile: req.student_profile.unwrap_or_default(),
            dialogues: req.recent_dialogues.unwrap_or_default(),
            verbose: req.verbose,
            force_mode: req.force_mode,
        }
    }
}

pub struct Orchestrator {
    gate: ComplexityGate,
    finetuned: Arc<dyn FinetunedModel>,
    quick: QuickAnswerAgent,
    graph: AgentGraph,
}

impl Orchestrator {
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        finetuned: Arc<dyn FinetunedModel>,
        guidelines: Arc<dyn GuidelineSearch>,
        web: Arc<dyn WebSearch>,
        limits: LoopLimits,
        budget: GraphBudget,
    ) -> Self {
        let guideline_loop = RetrievalLoop::new(GuidelineSource::new(guidelines), llm.clone(), limits);
        let web_loop = RetrievalLoop::new(WebSource::new(web), llm.clone(), limits);
        let graph = AgentGraph::new(
            RouterAgent::new(llm.clone()),
            Arc::new(guideline_loop),
            Arc::new(web_loop),
            SummarizerAgent::new(llm.clone()),
            budget,
        );

        Self {
            gate: ComplexityGate::new(llm.clone()),
            finetuned,
            quick: QuickAnswerAgent::new(llm),
            graph,
        }
    }

    /// Always returns an envelope; every fault ends up in `error`.
    pub async fn answer(&self, req: AnswerRequest) -> Envelope {
        let request_id = Uuid::new_v4();
        let span = info_span!("request", request_id = %request_id);

        async move {
            info!("Orchestrator: question received ({} chars)", req.question.chars().count());
            let ctx = QuestionContext::new(req.question.clone(), req.profile.clone(), req.dialogues.clone());

            let envelope = match AssertUnwindSafe(self.run(&ctx, &req)).catch_unwind().await {
                Ok(Ok(envelope)) => envelope,
                Ok(Err(e)) => {
                    error!("Orchestrator: pipeline failed: {}", e);
                    error_envelope(&ctx, &e.to_string())
                }
                Err(panic) => {
                    let message = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    error!("Orchestrator: pipeline panicked: {}", message);
                    error_envelope(&ctx, &message)
                }
            };

            metrics::record_request(envelope.model_used.as_str());
            info!("Orchestrator: answered via {}", envelope.model_used.as_str());
            envelope
        }
        .instrument(span)
        .await
    }

    async fn run(&self, ctx: &QuestionContext, req: &AnswerRequest) -> Result<Envelope, AgentError> {
        let mode = match req.force_mode {
            Some(mode) => {
                info!("Orchestrator: mode forced to {:?}", mode);
                mode
            }
            None => self.gate.classify(&ctx.question, req.verbose).await,
        };

        let path = match mode {
            Complexity::Simple => {
                if let Some(answer) = self.quick_answer(ctx, req.verbose).await {
                    return Ok(Envelope {
                        question: ctx.question.clone(),
                        final_answer: answer,
                        model_used: ModelPath::FinetunedRefined,
                        context: String::new(),
                        datasources: QUICK_PATH_SOURCES.iter().map(|s| s.to_string()).collect(),
                        success: true,
                        error: None,
                    });
                }
                info!("Orchestrator: falling back to the agent graph");
                ModelPath::AgentFallback
            }
            Complexity::Complex => ModelPath::Agent,
        };

        let outcome = self.graph.run(ctx, req.verbose).await?;
        Ok(Envelope {
            question: ctx.question.clone(),
            final_answer: outcome.final_answer,
            model_used: path,
            context: outcome.context,
            datasources: outcome.datasources,
            success: true,
            error: None,
        })
    }

    /// Call, refine, evaluate. `None` means the graph has to answer.
    async fn quick_answer(&self, ctx: &QuestionContext, verbose: bool) -> Option<String> {
        let raw = match self.finetuned.answer(&ctx.question).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Orchestrator: fine-tuned model gave up after {} attempts: {}", e.attempts(), e);
                return None;
            }
        };
        detail!(verbose, "Orchestrator: fine-tuned raw answer received");

        let refined = self.quick.refine(&ctx.question, &raw, verbose).await;
        if self.quick.evaluate(&ctx.question, &refined, verbose).await {
            Some(refined)
        } else {
            info!("Orchestrator: quick answer rejected by evaluation");
            None
        }
    }
}

fn error_envelope(ctx: &QuestionContext, detail: &str) -> Envelope {
    Envelope {
        question: ctx.question.clone(),
        final_answer: ERROR_ANSWER.to_string(),
        model_used: ModelPath::Error,
        context: ctx.context().to_string(),
        datasources: Vec::new(),
        success: false,
        error: Some(detail.chars().take(MAX_ERROR_CHARS).collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{FinetunedClient, GuidelineDoc, WebDoc};
    use crate::error::{AdapterError, FinetunedError};
    use crate::llm::scripted::ScriptedLlm;
    use async_trait::async_trait;
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use warp::Filter;

    const COMPLEXITY: &str = "복잡도를 분류하는 분류기";
    const REFINE: &str = "다듬어 주세요";
    const EVALUATE: &str = "품질을 평가합니다";
    const ROUTER: &str = "질문 라우터";
    const EXTRACT: &str = "Q/A 문서에서";
    const WEB_EXTRACT: &str = "주어진 문서에서";
    const WEB_ANSWER: &str = "추출된 정보만으로";
    const REWRITE: &str = "GuidelineDB 검색에 쓸";
    const ANSWER: &str = "모집요강 전문 상담가";
    const SUMMARY: &str = "제공된 문서만 사용해";

    const SIMPLE: &str = r#"{"complexity": "simple", "reason": "일반 학습 조언"}"#;
    const COMPLEX: &str = r#"{"complexity": "complex", "reason": "대학명 포함"}"#;
    const GUIDELINE_ONLY: &str = r#"{"tools": ["search_guideline"]}"#;
    const GOOD_STRIP: &str = r#"{"strips": [{"content": "이과는 수학 시험만 응시", "relevance_score": 0.9, "faithfulness_score": 0.95}]}"#;
    const WEAK_STRIP: &str = r#"{"strips": [{"content": "관련 없음", "relevance_score": 0.4, "faithfulness_score": 0.5}]}"#;

    struct FixedFinetuned(&'static str);

    #[async_trait]
    impl FinetunedModel for FixedFinetuned {
        async fn answer(&self, _question: &str) -> Result<String, FinetunedError> {
            Ok(self.0.to_string())
        }
    }

    struct PanickingFinetuned;

    #[async_trait]
    impl FinetunedModel for PanickingFinetuned {
        async fn answer(&self, _question: &str) -> Result<String, FinetunedError> {
            panic!("model handle poisoned")
        }
    }

    #[derive(Default)]
    struct CountingGuidelines {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl GuidelineSearch for CountingGuidelines {
        async fn search(&self, _query: &str, _k: usize) -> Result<Vec<GuidelineDoc>, AdapterError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![GuidelineDoc {
                question: "중앙대학교 이과 편입 시험 과목은?".to_string(),
                answer: "이과는 수학 시험만 응시합니다.".to_string(),
                category: "시험과목".to_string(),
                source_detail: "cau2025-page7".to_string(),
            }])
        }
    }

    struct NoWeb;

    #[async_trait]
    impl WebSearch for NoWeb {
        async fn search(&self, _query: &str, _k: usize) -> Result<Vec<WebDoc>, AdapterError> {
            Ok(vec![])
        }
    }

    #[derive(Default)]
    struct CountingWeb {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl WebSearch for CountingWeb {
        async fn search(&self, _query: &str, k: usize) -> Result<Vec<WebDoc>, AdapterError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok((1..=k.min(4))
                .map(|i| WebDoc {
                    title: format!("편입 일정 {}", i),
                    url: format!("https://transfer.example/{}", i),
                    snippet: "2025학년도 편입 원서 접수는 1월 초입니다.".to_string(),
                })
                .collect())
        }
    }

    fn orchestrator(
        llm: Arc<ScriptedLlm>,
        finetuned: Arc<dyn FinetunedModel>,
        guidelines: Arc<CountingGuidelines>,
    ) -> Orchestrator {
        Orchestrator::new(
            llm,
            finetuned,
            guidelines,
            Arc::new(NoWeb),
            LoopLimits::default(),
            GraphBudget::default(),
        )
    }

    fn failing_endpoint() -> (SocketAddr, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let route = warp::path("predict").and(warp::post()).map(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            warp::reply::with_status("boom", warp::http::StatusCode::INTERNAL_SERVER_ERROR)
        });
        let (addr, server) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);
        (addr, hits)
    }

    #[tokio::test]
    async fn generic_question_is_answered_by_the_quick_path() {
        let llm = Arc::new(
            ScriptedLlm::new()
                .reply(COMPLEXITY, SIMPLE)
                .reply(REFINE, "content='개념 정리 후 매일 기출 문제를 풀어보세요.'")
                .reply(EVALUATE, r#"{"quality": "good", "score": 8, "reason": "구체적"}"#),
        );
        let guidelines = Arc::new(CountingGuidelines::default());
        let orch = orchestrator(llm.clone(), Arc::new(FixedFinetuned("기출을 푸세요")), guidelines.clone());

        let envelope = orch.answer(AnswerRequest::new("수학 공부는 어떻게 해야 할까요?")).await;
        assert!(envelope.success);
        assert_eq!(envelope.model_used, ModelPath::FinetunedRefined);
        assert_eq!(envelope.final_answer, "개념 정리 후 매일 기출 문제를 풀어보세요.");
        assert_eq!(envelope.datasources, vec!["finetuned_model", "llm_refinement"]);
        assert_eq!(envelope.context, "");
        assert_eq!(llm.hits(ROUTER), 0);
        assert_eq!(guidelines.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn institution_question_goes_through_the_guideline_loop() {
        let llm = Arc::new(
            ScriptedLlm::new()
                .reply(COMPLEXITY, COMPLEX)
                .reply(ROUTER, GUIDELINE_ONLY)
                .reply(EXTRACT, GOOD_STRIP)
                .reply(ANSWER, "## 핵심 요약\n이과는 수학 시험만 응시합니다. (GuidelineDB (cau2025-page7))")
                .reply(SUMMARY, "중앙대학교 이과 편입은 수학 시험만 응시합니다 (GuidelineDB (cau2025-page7))."),
        );
        let guidelines = Arc::new(CountingGuidelines::default());
        let orch = orchestrator(llm.clone(), Arc::new(FixedFinetuned("unused")), guidelines.clone());

        let mut req = AnswerRequest::new("중앙대학교 이과 편입은 어떤 과목을 준비해야 하나요?");
        req.profile = StudentProfile {
            target_university: "중앙대학교".to_string(),
            track: "이과".to_string(),
        };
        let envelope = orch.answer(req).await;

        assert!(envelope.success);
        assert_eq!(envelope.model_used, ModelPath::Agent);
        assert_eq!(envelope.datasources, vec!["search_guideline"]);
        assert!(envelope.final_answer.contains("cau2025-page7"));
        assert!(envelope.context.contains("목표 대학: 중앙대학교, 계열: 이과"));
        // generation 1: a single retrieval, no rewrite
        assert_eq!(guidelines.calls.load(Ordering::SeqCst), 1);
        assert_eq!(llm.hits(REWRITE), 0);
        assert_eq!(llm.hits(REFINE), 0);
    }

    #[tokio::test]
    async fn both_sources_are_searched_and_merged_in_tag_order() {
        let llm = Arc::new(
            ScriptedLlm::new()
                .reply(COMPLEXITY, COMPLEX)
                .reply(ROUTER, r#"{"tools": ["search_web", "search_guideline"]}"#)
                .reply(EXTRACT, GOOD_STRIP)
                .reply(
                    WEB_EXTRACT,
                    r#"{"strips": [{"content": "원서 접수는 1월 초", "relevance_score": 0.85, "faithfulness_score": 0.9}], "query_relevance": 0.9}"#,
                )
                .reply(ANSWER, "이과는 수학 시험만 응시합니다.")
                .reply(WEB_ANSWER, "원서 접수는 1월 초입니다. (편입 일정 1, https://transfer.example/1)")
                .reply(SUMMARY, "수학 시험을 준비하고 1월 초 원서 접수를 챙기세요."),
        );
        let guidelines = Arc::new(CountingGuidelines::default());
        let web = Arc::new(CountingWeb::default());
        let orch = Orchestrator::new(
            llm.clone(),
            Arc::new(FixedFinetuned("unused")),
            guidelines.clone(),
            web.clone(),
            LoopLimits::default(),
            GraphBudget::default(),
        );

        let envelope = orch.answer(AnswerRequest::new("중앙대 이과 편입 과목과 원서 접수 일정은?")).await;
        assert!(envelope.success);
        assert_eq!(envelope.model_used, ModelPath::Agent);
        assert_eq!(envelope.datasources, vec!["search_guideline", "search_web"]);
        assert_eq!(guidelines.calls.load(Ordering::SeqCst), 1);
        assert_eq!(web.calls.load(Ordering::SeqCst), 1);
        // only the first two web results reach extraction
        assert_eq!(llm.hits(WEB_EXTRACT), 2);
        assert_eq!(llm.hits(EXTRACT), 1);

        let summary = llm.prompts().into_iter().find(|p| p.system.contains(SUMMARY)).unwrap();
        assert!(summary.user.contains(
            "[GuidelineDB 검색 결과]\n이과는 수학 시험만 응시합니다.\n\n[웹 검색 결과]\n원서 접수는 1월 초입니다."
        ));
        let web_answer = llm.prompts().into_iter().find(|p| p.system.contains(WEB_ANSWER)).unwrap();
        assert!(web_answer.user.contains("https://transfer.example/1"));
        assert!(!web_answer.user.contains("https://transfer.example/3"));
    }

    #[tokio::test]
    async fn failing_endpoint_falls_back_after_three_attempts() {
        let (addr, hits) = failing_endpoint();
        let finetuned = Arc::new(FinetunedClient::new(
            &format!("http://{}/predict", addr),
            Duration::from_secs(5),
            3,
        ));
        let llm = Arc::new(
            ScriptedLlm::new()
                .reply(COMPLEXITY, SIMPLE)
                .reply(ROUTER, GUIDELINE_ONLY)
                .reply(EXTRACT, GOOD_STRIP)
                .reply(ANSWER, "이과는 수학 시험만 응시합니다.")
                .reply(SUMMARY, "수학 시험만 준비하면 됩니다 (GuidelineDB (cau2025-page7))."),
        );
        let orch = orchestrator(llm.clone(), finetuned, Arc::new(CountingGuidelines::default()));

        let envelope = orch.answer(AnswerRequest::new("편입 수학은 어떻게 준비하나요?")).await;
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert!(envelope.success);
        assert_eq!(envelope.model_used, ModelPath::AgentFallback);
        assert_eq!(llm.hits(REFINE), 0);
        assert_eq!(llm.hits(EVALUATE), 0);
    }

    #[tokio::test]
    async fn weak_evidence_stops_at_the_ceiling_and_still_answers() {
        let llm = Arc::new(
            ScriptedLlm::new()
                .reply(COMPLEXITY, COMPLEX)
                .reply(ROUTER, GUIDELINE_ONLY)
                .reply(EXTRACT, WEAK_STRIP)
                .reply(REWRITE, r#"{"question_refined": "중앙대 2025 일반편입 이과 시험 과목", "reason": "구체화"}"#)
                .reply(ANSWER, "관련 정보를 찾지 못했습니다.")
                .reply(SUMMARY, "제공된 정보로는 충분한 답변을 할 수 없습니다."),
        );
        let guidelines = Arc::new(CountingGuidelines::default());
        let orch = orchestrator(llm.clone(), Arc::new(FixedFinetuned("unused")), guidelines.clone());

        let envelope = orch.answer(AnswerRequest::new("중앙대 편입 과목?")).await;
        assert!(envelope.success);
        assert_eq!(envelope.model_used, ModelPath::Agent);
        assert_eq!(guidelines.calls.load(Ordering::SeqCst), 2);
        assert_eq!(llm.hits(EXTRACT), 2);
        assert_eq!(llm.hits(REWRITE), 1);
        assert_eq!(llm.hits(ANSWER), 1);
        assert!(envelope.final_answer.contains("충분한 답변을 할 수 없습니다"));
    }

    #[tokio::test]
    async fn poor_quick_answer_falls_back() {
        let llm = Arc::new(
            ScriptedLlm::new()
                .reply(COMPLEXITY, SIMPLE)
                .reply(REFINE, "확인해보세요.")
                .reply(EVALUATE, r#"{"quality": "poor", "score": 3, "reason": "모호"}"#)
                .reply(ROUTER, GUIDELINE_ONLY)
                .reply(EXTRACT, GOOD_STRIP)
                .reply(ANSWER, "수학")
                .reply(SUMMARY, "수학 시험을 준비하세요."),
        );
        let orch = orchestrator(llm, Arc::new(FixedFinetuned("확인해보세요")), Arc::new(CountingGuidelines::default()));
        let envelope = orch.answer(AnswerRequest::new("q")).await;
        assert_eq!(envelope.model_used, ModelPath::AgentFallback);
        assert_eq!(envelope.final_answer, "수학 시험을 준비하세요.");
    }

    #[tokio::test]
    async fn forced_mode_skips_the_gate() {
        let llm = Arc::new(
            ScriptedLlm::new()
                .reply(REFINE, "매일 복습하세요.")
                .reply(EVALUATE, r#"{"quality": "good", "score": 7}"#),
        );
        let orch = orchestrator(llm.clone(), Arc::new(FixedFinetuned("복습")), Arc::new(CountingGuidelines::default()));
        let mut req = AnswerRequest::new("중앙대 편입 일정?");
        req.force_mode = Some(Complexity::Simple);

        let envelope = orch.answer(req).await;
        assert_eq!(envelope.model_used, ModelPath::FinetunedRefined);
        assert_eq!(llm.hits(COMPLEXITY), 0);
    }

    #[tokio::test]
    async fn pipeline_errors_become_an_error_envelope() {
        let llm = Arc::new(
            ScriptedLlm::new()
                .reply(COMPLEXITY, COMPLEX)
                .reply(ROUTER, GUIDELINE_ONLY)
                .reply(EXTRACT, GOOD_STRIP)
                .reply(ANSWER, "수학")
                .fail(SUMMARY),
        );
        let orch = orchestrator(llm, Arc::new(FixedFinetuned("unused")), Arc::new(CountingGuidelines::default()));
        let envelope = orch.answer(AnswerRequest::new("중앙대 과목?")).await;

        assert!(!envelope.success);
        assert_eq!(envelope.model_used, ModelPath::Error);
        assert_eq!(envelope.final_answer, ERROR_ANSWER);
        let detail = envelope.error.unwrap();
        assert!(detail.chars().count() <= MAX_ERROR_CHARS);
        assert!(detail.starts_with("LLM call failed"));
    }

    #[tokio::test]
    async fn panics_become_an_error_envelope() {
        let llm = Arc::new(ScriptedLlm::new().reply(COMPLEXITY, SIMPLE));
        let orch = orchestrator(llm, Arc::new(PanickingFinetuned), Arc::new(CountingGuidelines::default()));
        let envelope = orch.answer(AnswerRequest::new("q")).await;
        assert!(!envelope.success);
        assert_eq!(envelope.error.as_deref(), Some("model handle poisoned"));
    }

    #[test]
    fn long_errors_are_truncated() {
        let ctx = QuestionContext::new("q", StudentProfile::default(), vec![]);
        let envelope = error_envelope(&ctx, &"오".repeat(500));
        assert_eq!(envelope.error.unwrap().chars().count(), MAX_ERROR_CHARS);
    }

    #[test]
    fn chat_request_defaults_fill_the_profile() {
        let req: ChatRequest = serde_json::from_str(r#"{"question": "q", "force_mode": "complex"}"#).unwrap();
        let req = AnswerRequest::from(req);
        assert_eq!(req.profile, StudentProfile::default());
        assert_eq!(req.force_mode, Some(Complexity::Complex));
        assert!(req.dialogues.is_empty());
    }
}
