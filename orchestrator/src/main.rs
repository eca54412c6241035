use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use anyhow::Context;
use tracing::{info, warn};
use warp::Filter;

mod adapters;
mod agents;
mod api;
mod config;
mod error;
mod llm;
mod metrics;
mod middleware;
mod models;
mod orchestrator;

use adapters::{EmbeddingServiceClient, Embedder, FinetunedClient, GuidelineIndex, TavilyClient};
use llm::{GeminiClient, LanguageModel};
use orchestrator::Orchestrator;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration (also reads .env)
    let config = config::Config::from_env()?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .json()
        .init();

    info!("Starting CSmart transfer advisor");
    metrics::init();

    if config.google_api_key.is_none() {
        warn!("GOOGLE_API_KEY is not set; language-model calls will fail");
    }
    if config.tavily_api_key.is_none() {
        warn!("TAVILY_API_KEY is not set; web search will fail");
    }

    let llm = Arc::new(GeminiClient::new(
        &config.llm_base_url,
        &config.llm_model,
        config.google_api_key.clone(),
        config.llm_timeout,
    ));
    info!("Language model: {} ({})", llm.name(), config.llm_model);

    let embedder: Arc<dyn Embedder> = Arc::new(EmbeddingServiceClient::new(&config.embedding_service_url));
    let guidelines = match GuidelineIndex::load(&config.guideline_index_path, Some(embedder.clone())) {
        Ok(index) if index.is_empty() => {
            warn!("Guideline index at {} has no entries", config.guideline_index_path);
            index
        }
        Ok(index) => {
            info!("Guideline index loaded: {} entries", index.len());
            index
        }
        Err(e) => {
            warn!("Guideline index unavailable, starting empty: {}", e);
            GuidelineIndex::new(Vec::new(), Some(embedder))
        }
    };

    let web = TavilyClient::new(&config.web_search_url, config.tavily_api_key.clone());
    let finetuned = FinetunedClient::new(
        &config.finetuned_endpoint_url,
        config.finetuned_timeout,
        config.finetuned_max_retries,
    );

    let orchestrator = Arc::new(Orchestrator::new(
        llm,
        Arc::new(finetuned),
        Arc::new(guidelines),
        Arc::new(web),
        config.loop_limits,
        config.graph_budget,
    ));
    info!("Orchestrator ready");

    // Build API routes
    let started_at = chrono::Utc::now();
    let api_routes = api::routes(orchestrator, started_at);

    let root = warp::path::end().and(warp::get()).map(|| {
        warp::reply::json(&serde_json::json!({
            "service": api::SERVICE_NAME,
            "version": env!("CARGO_PKG_VERSION"),
            "docs": "POST /api/chat",
        }))
    });

    // Health check route
    let health = warp::path("health")
        .and(warp::get())
        .map(|| warp::reply::json(&serde_json::json!({"status": "healthy"})));

    // Metrics route
    let metrics = warp::path("metrics").and(warp::get()).map(|| {
        let (buffer, content_type) = metrics::render();
        warp::reply::with_header(buffer, "Content-Type", content_type)
    });

    let routes = root
        .or(health)
        .or(metrics)
        .or(api_routes)
        .recover(error::handle_rejection)
        .with(warp::log("api"))
        .with(middleware::cors());

    // Start server
    let host: IpAddr = config
        .host
        .parse()
        .with_context(|| format!("invalid HOST {:?}", config.host))?;
    let addr = SocketAddr::new(host, config.port);
    info!("Server listening on {}", addr);

    warp::serve(routes).run(addr).await;

    Ok(())
}
