use thiserror::Error;
use warp::{http::StatusCode, reject::Reject, Rejection, Reply};

/// Failures of the language-model capability.
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    #[error("HTTP {status}: {message}")]
    UnexpectedStatus { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Model returned no text")]
    EmptyResponse,

    #[error("Unparsable structured output: {0}")]
    Parse(String),
}

impl LlmError {
    /// Classifies a non-success HTTP status from a model provider.
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            401 | 403 => LlmError::AuthenticationFailed(body.to_string()),
            400 | 404 => LlmError::InvalidRequest(body.to_string()),
            429 => LlmError::RateLimited(body.to_string()),
            500..=599 => LlmError::ServerError {
                status,
                message: body.to_string(),
            },
            _ => LlmError::UnexpectedStatus {
                status,
                message: body.to_string(),
            },
        }
    }
}

/// Failures of the evidence adapters (guideline index, embeddings, web search).
#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} returned HTTP {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("Malformed response from {service}: {detail}")]
    Malformed {
        service: &'static str,
        detail: String,
    },

    #[error("Index error: {0}")]
    Index(String),
}

/// Failures of the fine-tuned model endpoint. `Display` is the sentinel text
/// handed back to callers instead of a raised fault.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FinetunedError {
    #[error("오류: 잘못된 요청입니다. 파라미터를 확인해주세요.")]
    ClientError { attempts: u32 },

    #[error("오류: 서버 오류가 발생했습니다. 잠시 후 다시 시도해주세요.")]
    ServerError { attempts: u32, status: u16 },

    #[error("오류: 요청 시간이 초과되었습니다.")]
    Timeout { attempts: u32 },

    #[error("오류: 네트워크 오류 ({detail})")]
    Network { attempts: u32, detail: String },

    #[error("오류: 예상치 못한 오류 (상태 코드: {status})")]
    UnexpectedStatus { attempts: u32, status: u16 },

    #[error("오류: 응답 형식이 올바르지 않습니다 ({detail})")]
    Malformed { attempts: u32, detail: String },
}

impl FinetunedError {
    pub fn attempts(&self) -> u32 {
        match self {
            FinetunedError::ClientError { attempts }
            | FinetunedError::ServerError { attempts, .. }
            | FinetunedError::Timeout { attempts }
            | FinetunedError::Network { attempts, .. }
            | FinetunedError::UnexpectedStatus { attempts, .. }
            | FinetunedError::Malformed { attempts, .. } => *attempts,
        }
    }
}

/// Faults that escape an agent step and reach the orchestrator boundary.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("LLM call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("Evidence adapter failed: {0}")]
    Adapter(#[from] AdapterError),

    #[error("Agent graph exceeded its step limit of {limit}")]
    StepLimitExceeded { limit: usize },

    #[error("Agent graph timed out after {secs}s")]
    Timeout { secs: u64 },
}

impl AgentError {
    /// Budget violations abort the whole graph; everything else may be
    /// degraded locally.
    pub fn is_budget(&self) -> bool {
        matches!(
            self,
            AgentError::StepLimitExceeded { .. } | AgentError::Timeout { .. }
        )
    }
}

/// Errors surfaced by the HTTP layer.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl Reject for ApiError {}

pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Rejection> {
    let (code, message, details) = if let Some(api_err) = err.find::<ApiError>() {
        match api_err {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "Bad request", api_err.to_string()),
        }
    } else if let Some(body_err) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, "Bad request", body_err.to_string())
    } else if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Resource not found", String::new())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            "Method not allowed",
            String::new(),
        )
    } else {
        return Err(err);
    };

    let json = warp::reply::json(&serde_json::json!({
        "error": message,
        "details": details,
    }));

    Ok(warp::reply::with_status(json, code))
}
