use anyhow::{Context, Result};
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;

/// Business rules of the retrieval loops.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct LoopLimits {
    /// Minimum relevance and faithfulness an evidence fragment needs to be kept.
    pub acceptance_threshold: f64,
    /// Hard ceiling on extract iterations per loop run.
    pub max_generations: u32,
}

impl Default for LoopLimits {
    fn default() -> Self {
        Self {
            acceptance_threshold: 0.7,
            max_generations: 2,
        }
    }
}

/// Budgets applied to one whole agent-graph invocation.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct GraphBudget {
    pub step_limit: usize,
    pub timeout: Duration,
}

impl Default for GraphBudget {
    fn default() -> Self {
        Self {
            step_limit: 25,
            timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub google_api_key: Option<String>,
    pub llm_model: String,
    pub llm_base_url: String,
    pub llm_timeout: Duration,
    pub finetuned_endpoint_url: String,
    pub finetuned_timeout: Duration,
    pub finetuned_max_retries: u32,
    pub tavily_api_key: Option<String>,
    pub web_search_url: String,
    pub embedding_service_url: String,
    pub guideline_index_path: String,
    pub loop_limits: LoopLimits,
    pub graph_budget: GraphBudget,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let secret = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Config {
            host: text("HOST", "0.0.0.0"),
            port: parse_or(&lookup, "PORT", 8000)?,
            log_level: text("LOG_LEVEL", "info"),
            google_api_key: secret("GOOGLE_API_KEY"),
            llm_model: text("LLM_MODEL", "gemini-2.5-flash"),
            llm_base_url: text(
                "LLM_BASE_URL",
                "https://generativelanguage.googleapis.com/v1beta",
            ),
            llm_timeout: Duration::from_secs(parse_or(&lookup, "LLM_TIMEOUT_SECS", 60)?),
            finetuned_endpoint_url: text(
                "FINETUNED_ENDPOINT_URL",
                "https://csmart-ai-faq-finetuning.hf.space/predict",
            ),
            finetuned_timeout: Duration::from_secs(parse_or(
                &lookup,
                "FINETUNED_TIMEOUT_SECS",
                120,
            )?),
            finetuned_max_retries: parse_or(&lookup, "FINETUNED_MAX_RETRIES", 3)?,
            tavily_api_key: secret("TAVILY_API_KEY"),
            web_search_url: text("WEB_SEARCH_URL", "https://api.tavily.com/search"),
            embedding_service_url: text("EMBEDDING_SERVICE_URL", "http://localhost:8002"),
            guideline_index_path: text("GUIDELINE_INDEX_PATH", "./guideline_index.json"),
            loop_limits: LoopLimits {
                acceptance_threshold: parse_or(&lookup, "ACCEPTANCE_THRESHOLD", 0.7)?,
                max_generations: parse_or(&lookup, "MAX_GENERATIONS", 2)?,
            },
            graph_budget: GraphBudget {
                step_limit: parse_or(&lookup, "GRAPH_STEP_LIMIT", 25)?,
                timeout: Duration::from_secs(parse_or(&lookup, "GRAPH_TIMEOUT_SECS", 120)?),
            },
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {}: {:?}", key, raw)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = Config::from_lookup(|_| None).unwrap();
        assert_eq!(config.port, 8000);
        assert_eq!(config.finetuned_max_retries, 3);
        assert_eq!(config.loop_limits, LoopLimits::default());
        assert_eq!(config.graph_budget.step_limit, 25);
        assert_eq!(config.graph_budget.timeout, Duration::from_secs(120));
        assert!(config.google_api_key.is_none());
    }

    #[test]
    fn overrides_are_parsed() {
        let config = Config::from_lookup(lookup_from(&[
            ("PORT", "9090"),
            ("ACCEPTANCE_THRESHOLD", "0.8"),
            ("MAX_GENERATIONS", "3"),
            ("GOOGLE_API_KEY", "key"),
            ("TAVILY_API_KEY", "  "),
        ]))
        .unwrap();
        assert_eq!(config.port, 9090);
        assert_eq!(config.loop_limits.acceptance_threshold, 0.8);
        assert_eq!(config.loop_limits.max_generations, 3);
        assert_eq!(config.google_api_key.as_deref(), Some("key"));
        assert!(config.tavily_api_key.is_none());
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let err = Config::from_lookup(lookup_from(&[("PORT", "eighty")])).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }
}
