use chrono::{DateTime, Utc};
use serde_json::json;
use warp::{Rejection, Reply};

use crate::models::ServiceStatus;

pub const SERVICE_NAME: &str = "CSmart transfer advisor";

pub async fn handle_status(started_at: DateTime<Utc>) -> Result<impl Reply, Rejection> {
    let status = ServiceStatus {
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        status: "running",
        started_at,
        endpoints: json!({
            "chat": "POST /api/chat",
            "status": "GET /api/status",
            "health": "GET /health",
            "metrics": "GET /metrics",
        }),
    };
    Ok(warp::reply::json(&status))
}
