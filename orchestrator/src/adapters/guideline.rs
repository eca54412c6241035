//! GuidelineDB: admission-guideline Q&A pairs with hybrid retrieval.
//!
//! The index is built elsewhere and loaded read-only at startup. Search ranks
//! entries by keyword hits on the stored question, then tops the result up
//! with embedding nearest neighbours when keyword matching alone cannot fill
//! `k` slots.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use super::{Embedder, GuidelineSearch};
use crate::error::AdapterError;

pub const UNKNOWN_SOURCE_DETAIL: &str = "출처 미기재";

/// Keyword candidates kept before truncating to `k`.
const KEYWORD_CANDIDATES: usize = 50;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GuidelineEntry {
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub category: String,
    #[serde(default = "unknown_source_detail")]
    pub source_detail: String,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
}

fn unknown_source_detail() -> String {
    UNKNOWN_SOURCE_DETAIL.to_string()
}

/// One retrieved Q&A pair.
#[derive(Debug, Clone, PartialEq)]
pub struct GuidelineDoc {
    pub question: String,
    pub answer: String,
    pub category: String,
    pub source_detail: String,
}

impl From<&GuidelineEntry> for GuidelineDoc {
    fn from(entry: &GuidelineEntry) -> Self {
        Self {
            question: entry.question.clone(),
            answer: entry.answer.clone(),
            category: entry.category.clone(),
            source_detail: entry.source_detail.clone(),
        }
    }
}

pub struct GuidelineIndex {
    entries: Vec<GuidelineEntry>,
    embedder: Option<Arc<dyn Embedder>>,
}

impl GuidelineIndex {
    pub fn new(entries: Vec<GuidelineEntry>, embedder: Option<Arc<dyn Embedder>>) -> Self {
        Self { entries, embedder }
    }

    /// Loads a JSON array of entries.
    pub fn load(path: impl AsRef<Path>, embedder: Option<Arc<dyn Embedder>>) -> Result<Self, AdapterError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| AdapterError::Index(format!("{}: {}", path.display(), e)))?;
        let entries: Vec<GuidelineEntry> = serde_json::from_str(&raw)
            .map_err(|e| AdapterError::Index(format!("{}: {}", path.display(), e)))?;
        let with_vectors = entries.iter().filter(|e| e.embedding.is_some()).count();
        info!(
            "GuidelineDB: loaded {} entries ({} with embeddings) from {}",
            entries.len(),
            with_vectors,
            path.display()
        );
        Ok(Self::new(entries, embedder))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry indices ranked by keyword hits, best first.
    fn keyword_matches(&self, query: &str) -> Vec<usize> {
        let keywords: Vec<String> = query
            .split_whitespace()
            .filter(|w| w.chars().count() >= 2)
            .map(|w| w.to_lowercase())
            .collect();
        if keywords.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(usize, usize)> = self
            .entries
            .iter()
            .enumerate()
            .filter_map(|(i, entry)| {
                let content = entry.question.to_lowercase();
                let score = keywords.iter().filter(|kw| content.contains(kw.as_str())).count();
                (score > 0).then_some((i, score))
            })
            .collect();

        scored.sort_by(|a, b| b.1.cmp(&a.1));
        scored.truncate(KEYWORD_CANDIDATES);
        scored.into_iter().map(|(i, _)| i).collect()
    }

    async fn vector_matches(&self, query: &str, exclude: &[usize], k: usize) -> Result<Vec<usize>, AdapterError> {
        let Some(embedder) = &self.embedder else {
            return Ok(Vec::new());
        };
        if k == 0 || !self.entries.iter().any(|e| e.embedding.is_some()) {
            return Ok(Vec::new());
        }

        let query_vector = embedder
            .embed(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AdapterError::Malformed {
                service: "embedding-service",
                detail: "no vector for query".to_string(),
            })?;

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(i, _)| !exclude.contains(i))
            .filter_map(|(i, e)| e.embedding.as_ref().map(|v| (i, cosine_similarity(&query_vector, v))))
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        Ok(scored.into_iter().take(k).map(|(i, _)| i).collect())
    }
}

#[async_trait]
impl GuidelineSearch for GuidelineIndex {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<GuidelineDoc>, AdapterError> {
        let mut selected = self.keyword_matches(query);
        selected.truncate(k);
        info!("GuidelineDB: {} keyword hits for {:?}", selected.len(), query);

        if selected.len() < k {
            match self.vector_matches(query, &selected, k - selected.len()).await {
                Ok(extra) => selected.extend(extra),
                Err(e) => warn!("GuidelineDB: vector search unavailable, keyword results only: {}", e),
            }
        }

        Ok(selected.into_iter().map(|i| GuidelineDoc::from(&self.entries[i])).collect())
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
