//! Read-only collaborators: the guideline index, the embedding service, the
//! web search provider and the fine-tuned answer endpoint.

use async_trait::async_trait;

use crate::error::{AdapterError, FinetunedError};

pub mod embedding;
pub mod finetuned;
pub mod guideline;
pub mod web;

pub use embedding::{Embedder, EmbeddingServiceClient};
pub use finetuned::FinetunedClient;
pub use guideline::{GuidelineDoc, GuidelineIndex};
pub use web::{TavilyClient, WebDoc};

/// Default number of documents pulled from the guideline index.
pub const GUIDELINE_TOP_K: usize = 2;
/// Number of results requested from the web provider.
pub const WEB_TOP_K: usize = 10;

#[async_trait]
pub trait GuidelineSearch: Send + Sync {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<GuidelineDoc>, AdapterError>;
}

#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<WebDoc>, AdapterError>;
}

/// The hosted fine-tuned FAQ model. Errors display as the sentinel string
/// shown to users.
#[async_trait]
pub trait FinetunedModel: Send + Sync {
    async fn answer(&self, question: &str) -> Result<String, FinetunedError>;
}
