//! Retrieval index
//!
//! Similarity search over ingested chunks. [`MemoryVectorStore`] keeps every
//! embedding in memory and ranks by cosine similarity; it is rebuilt on each
//! run.

use async_trait::async_trait;
use thiserror::Error;

pub mod embeddings;
pub mod memory;

pub use embeddings::{Embedder, OpenAiEmbeddings};
pub use memory::MemoryVectorStore;

/// Index errors
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Embedding request failed: {0}")]
    Embedding(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// A piece of an ingested document with its similarity to the current query
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentChunk {
    pub content: String,
    pub source_path: String,
    /// Directory grouping assigned at ingestion; `None` for uncategorized content
    pub category: Option<String>,
    pub score: f32,
}

impl DocumentChunk {
    pub fn new(content: impl Into<String>, source_path: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            source_path: source_path.into(),
            category: None,
            score: 0.0,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_score(mut self, score: f32) -> Self {
        self.score = score;
        self
    }
}

/// Ranked candidate lookup
#[async_trait]
pub trait RetrievalIndex: Send + Sync {
    /// Candidates for `query`, best match first
    async fn search(&self, query: &str) -> Result<Vec<DocumentChunk>, IndexError>;
}

#[async_trait]
impl<I: RetrievalIndex + ?Sized> RetrievalIndex for std::sync::Arc<I> {
    async fn search(&self, query: &str) -> Result<Vec<DocumentChunk>, IndexError> {
        (**self).search(query).await
    }
}
