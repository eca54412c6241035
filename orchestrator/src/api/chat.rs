use std::sync::Arc;
use tracing::info;
use warp::{Rejection, Reply};

use crate::error::ApiError;
use crate::models::ChatRequest;
use crate::orchestrator::Orchestrator;

pub async fn handle_chat(request: ChatRequest, orchestrator: Arc<Orchestrator>) -> Result<impl Reply, Rejection> {
    if request.question.trim().is_empty() {
        return Err(warp::reject::custom(ApiError::BadRequest(
            "question must not be empty".to_string(),
        )));
    }
    info!(
        "Chat: question received (verbose={}, force_mode={:?})",
        request.verbose, request.force_mode
    );

    let envelope = orchestrator.answer(request.into()).await;
    Ok(warp::reply::json(&envelope))
}
