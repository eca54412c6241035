use chrono::{DateTime, Utc};
use std::sync::Arc;
use warp::{Filter, Rejection, Reply};

use crate::orchestrator::Orchestrator;

mod chat;
mod status;

pub use status::SERVICE_NAME;

/// Request bodies larger than this are rejected before parsing.
const MAX_BODY_BYTES: u64 = 64 * 1024;

pub fn routes(
    orchestrator: Arc<Orchestrator>,
    started_at: DateTime<Utc>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let api = warp::path("api");

    let chat_route = api
        .and(warp::path("chat"))
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with_orchestrator(orchestrator))
        .and_then(chat::handle_chat);

    let status_route = api
        .and(warp::path("status"))
        .and(warp::path::end())
        .and(warp::get())
        .and(warp::any().map(move || started_at))
        .and_then(status::handle_status);

    chat_route.or(status_route)
}

fn with_orchestrator(
    orchestrator: Arc<Orchestrator>,
) -> impl Filter<Extract = (Arc<Orchestrator>,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || orchestrator.clone())
}
