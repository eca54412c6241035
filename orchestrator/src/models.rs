use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_TARGET_UNIVERSITY: &str = "미지정";
pub const DEFAULT_TRACK: &str = "계열 미지정";

/// Only this many trailing dialogue turns are folded into the context string.
pub const DIALOGUE_WINDOW: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentProfile {
    #[serde(default = "default_target_university")]
    pub target_university: String,
    #[serde(default = "default_track", alias = "major_category")]
    pub track: String,
}

fn default_target_university() -> String {
    DEFAULT_TARGET_UNIVERSITY.to_string()
}

fn default_track() -> String {
    DEFAULT_TRACK.to_string()
}

impl Default for StudentProfile {
    fn default() -> Self {
        Self {
            target_university: default_target_university(),
            track: default_track(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dialogue {
    pub role: String,
    pub message: String,
}

/// Immutable per-request input plus the derived context string.
#[derive(Debug, Clone)]
pub struct QuestionContext {
    pub question: String,
    pub profile: StudentProfile,
    pub dialogues: Vec<Dialogue>,
    context: String,
}

impl QuestionContext {
    pub fn new(question: impl Into<String>, profile: StudentProfile, dialogues: Vec<Dialogue>) -> Self {
        let question = question.into();
        let context = build_context_string(&question, &profile, &dialogues);
        Self {
            question,
            profile,
            dialogues,
            context,
        }
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    /// The question prefixed by the context string, as handed to the router,
    /// the retrieval loops and the summarizer.
    pub fn enriched_question(&self) -> String {
        if self.context.is_empty() {
            self.question.clone()
        } else {
            format!("{}\n\n질문: {}", self.context, self.question)
        }
    }
}

/// Profile, last five dialogue turns and question, concatenated
/// deterministically.
pub fn build_context_string(question: &str, profile: &StudentProfile, dialogues: &[Dialogue]) -> String {
    let start = dialogues.len().saturating_sub(DIALOGUE_WINDOW);
    let dialogue_summary = dialogues[start..]
        .iter()
        .map(|d| format!("{}: {}", d.role, d.message))
        .collect::<Vec<_>>()
        .join(" ");

    format!(
        "[학생 프로필] 목표 대학: {}, 계열: {}\n[최근 대화 요약] {}\n[학생 질문] {}",
        profile.target_university, profile.track, dialogue_summary, question
    )
}

/// One scored, attributed nugget of evidence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvidenceFragment {
    pub content: String,
    pub relevance: f64,
    pub faithfulness: f64,
    pub source: String,
}

/// Scores are probabilities; anything outside [0, 1] (or NaN) is a
/// malformed grade.
pub fn is_unit_score(score: f64) -> bool {
    (0.0..=1.0).contains(&score)
}

impl EvidenceFragment {
    pub fn scores_valid(&self) -> bool {
        is_unit_score(self.relevance) && is_unit_score(self.faithfulness)
    }

    pub fn passes(&self, threshold: f64) -> bool {
        self.scores_valid() && self.relevance >= threshold && self.faithfulness >= threshold
    }
}

/// Evidence source selectable by the router. Ordering is the fan-in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
pub enum SourceTag {
    #[serde(rename = "search_guideline")]
    Guideline,
    #[serde(rename = "search_web")]
    Web,
}

impl SourceTag {
    pub const ALL: [SourceTag; 2] = [SourceTag::Guideline, SourceTag::Web];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceTag::Guideline => "search_guideline",
            SourceTag::Web => "search_web",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "search_guideline" => Some(SourceTag::Guideline),
            "search_web" => Some(SourceTag::Web),
            _ => None,
        }
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Non-empty, sorted, de-duplicated set of selected evidence sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingDecision {
    sources: Vec<SourceTag>,
}

impl RoutingDecision {
    pub fn both() -> Self {
        Self {
            sources: SourceTag::ALL.to_vec(),
        }
    }

    /// Accepts raw classifier labels. Any unknown label, or no label at all,
    /// selects both sources.
    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut sources = Vec::new();
        for label in labels {
            match SourceTag::parse(label.as_ref()) {
                Some(tag) => sources.push(tag),
                None => return Self::both(),
            }
        }
        if sources.is_empty() {
            return Self::both();
        }
        sources.sort();
        sources.dedup();
        Self { sources }
    }

    pub fn sources(&self) -> &[SourceTag] {
        &self.sources
    }

    pub fn labels(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.as_str().to_string()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    Complex,
}

/// Which pipeline produced the final answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelPath {
    #[serde(rename = "finetuned_refined")]
    FinetunedRefined,
    #[serde(rename = "langgraph_fallback")]
    AgentFallback,
    #[serde(rename = "langgraph")]
    Agent,
    #[serde(rename = "error")]
    Error,
}

impl ModelPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelPath::FinetunedRefined => "finetuned_refined",
            ModelPath::AgentFallback => "langgraph_fallback",
            ModelPath::Agent => "langgraph",
            ModelPath::Error => "error",
        }
    }
}

/// The final structured response. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    pub question: String,
    pub final_answer: String,
    pub model_used: ModelPath,
    pub context: String,
    pub datasources: Vec<String>,
    pub success: bool,
    pub error: Option<String>,
}

// API Request/Response models
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub question: String,
    #[serde(default)]
    pub student_profile: Option<StudentProfile>,
    #[serde(default)]
    pub recent_dialogues: Option<Vec<Dialogue>>,
    #[serde(default)]
    pub verbose: bool,
    #[serde(default)]
    pub force_mode: Option<Complexity>,
}

#[derive(Debug, Serialize)]
pub struct ServiceStatus {
    pub service: &'static str,
    pub version: &'static str,
    pub status: &'static str,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub endpoints: serde_json::Value,
}

// Structured LLM outputs
#[derive(Debug, Deserialize, JsonSchema)]
pub struct QuestionComplexity {
    pub complexity: Complexity,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AnswerQuality {
    /// "good" or "poor"
    #[serde(default)]
    pub quality: String,
    /// 1-10
    pub score: u8,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct InformationStrip {
    pub content: String,
    pub relevance_score: f64,
    pub faithfulness_score: f64,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ExtractedInformation {
    pub strips: Vec<InformationStrip>,
    /// Relevance of the document as a whole, 0-1.
    #[serde(default)]
    pub query_relevance: Option<f64>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RefinedQuestion {
    pub question_refined: String,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ToolSelectors {
    /// One or more of "search_guideline", "search_web".
    pub tools: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dialogues(n: usize) -> Vec<Dialogue> {
        (0..n)
            .map(|i| Dialogue {
                role: if i % 2 == 0 { "student" } else { "assistant" }.to_string(),
                message: format!("m{}", i),
            })
            .collect()
    }

    #[test]
    fn context_string_uses_last_five_turns() {
        let context = build_context_string("질문", &StudentProfile::default(), &dialogues(7));
        assert!(!context.contains("m0"));
        assert!(!context.contains("m1"));
        assert!(context.contains("student: m2 assistant: m3 student: m4 assistant: m5 student: m6"));
        assert!(context.starts_with("[학생 프로필] 목표 대학: 미지정, 계열: 계열 미지정\n"));
        assert!(context.ends_with("[학생 질문] 질문"));
    }

    #[test]
    fn context_string_is_deterministic() {
        let profile = StudentProfile {
            target_university: "중앙대학교".to_string(),
            track: "이과".to_string(),
        };
        let a = QuestionContext::new("q", profile.clone(), dialogues(6));
        let b = QuestionContext::new("q", profile, dialogues(6));
        assert_eq!(a.context().as_bytes(), b.context().as_bytes());
    }

    #[test]
    fn profile_defaults_and_alias() {
        let profile: StudentProfile =
            serde_json::from_str(r#"{"major_category": "문과"}"#).unwrap();
        assert_eq!(profile.target_university, DEFAULT_TARGET_UNIVERSITY);
        assert_eq!(profile.track, "문과");
    }

    #[test]
    fn routing_decision_is_never_empty() {
        assert_eq!(
            RoutingDecision::from_labels(Vec::<String>::new()),
            RoutingDecision::both()
        );
        assert_eq!(
            RoutingDecision::from_labels(["search_guideline", "search_db"]),
            RoutingDecision::both()
        );
        let web_only = RoutingDecision::from_labels(["search_web", "search_web"]);
        assert_eq!(web_only.sources(), &[SourceTag::Web]);
        let both = RoutingDecision::from_labels(["search_web", "search_guideline"]);
        assert_eq!(both.labels(), vec!["search_guideline", "search_web"]);
    }

    #[test]
    fn envelope_serializes_wire_names() {
        let envelope = Envelope {
            question: "q".to_string(),
            final_answer: "a".to_string(),
            model_used: ModelPath::AgentFallback,
            context: String::new(),
            datasources: vec![],
            success: true,
            error: None,
        };
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["model_used"], "langgraph_fallback");
        assert!(json["error"].is_null());
    }

    #[test]
    fn fragment_threshold_is_inclusive_on_both_axes() {
        let fragment = EvidenceFragment {
            content: "c".to_string(),
            relevance: 0.7,
            faithfulness: 0.69,
            source: "s".to_string(),
        };
        assert!(!fragment.passes(0.7));
        assert!(EvidenceFragment { faithfulness: 0.7, ..fragment }.passes(0.7));
    }

    #[test]
    fn fragment_scores_outside_unit_range_never_pass() {
        let fragment = EvidenceFragment {
            content: "c".to_string(),
            relevance: 8.0,
            faithfulness: 9.0,
            source: "s".to_string(),
        };
        assert!(!fragment.scores_valid());
        assert!(!fragment.passes(0.7));
        assert!(!EvidenceFragment { relevance: f64::NAN, faithfulness: 1.0, ..fragment.clone() }.passes(0.0));
        assert!(!EvidenceFragment { relevance: -0.1, faithfulness: 1.0, ..fragment }.passes(0.0));
        assert!(is_unit_score(0.0) && is_unit_score(1.0));
    }
}
