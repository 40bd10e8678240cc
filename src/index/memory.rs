//! In-memory vector store

use super::{DocumentChunk, Embedder, IndexError, RetrievalIndex};
use async_trait::async_trait;
use tracing::debug;

struct Entry {
    chunk: DocumentChunk,
    vector: Vec<f32>,
}

/// Brute-force cosine similarity search over embedded chunks
pub struct MemoryVectorStore<E> {
    embedder: E,
    entries: Vec<Entry>,
    k: usize,
}

impl<E: Embedder> MemoryVectorStore<E> {
    /// Create an empty store returning the top `k` matches per search
    pub fn new(embedder: E, k: usize) -> Self {
        Self {
            embedder,
            entries: Vec::new(),
            k,
        }
    }

    /// Embed and index `chunks` in one step
    pub async fn from_documents(
        chunks: Vec<DocumentChunk>,
        embedder: E,
        k: usize,
    ) -> Result<Self, IndexError> {
        let mut store = Self::new(embedder, k);
        store.add_documents(chunks).await?;
        Ok(store)
    }

    pub async fn add_documents(&mut self, chunks: Vec<DocumentChunk>) -> Result<(), IndexError> {
        if chunks.is_empty() {
            return Ok(());
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = self.embedder.embed_documents(&texts).await?;
        if vectors.len() != chunks.len() {
            return Err(IndexError::Embedding(format!(
                "expected {} embeddings, got {}",
                chunks.len(),
                vectors.len()
            )));
        }

        for (chunk, vector) in chunks.into_iter().zip(vectors) {
            if let Some(first) = self.entries.first() {
                if first.vector.len() != vector.len() {
                    return Err(IndexError::DimensionMismatch {
                        expected: first.vector.len(),
                        actual: vector.len(),
                    });
                }
            }
            self.entries.push(Entry { chunk, vector });
        }

        debug!(chunks = self.entries.len(), "Indexed document chunks");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Top `k` chunks by cosine similarity, highest first; ties keep insertion order
    pub async fn similarity_search(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<DocumentChunk>, IndexError> {
        if self.entries.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let query_vector = self.embedder.embed_query(query).await?;

        let mut scored = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            if entry.vector.len() != query_vector.len() {
                return Err(IndexError::DimensionMismatch {
                    expected: entry.vector.len(),
                    actual: query_vector.len(),
                });
            }
            let score = cosine_similarity(&entry.vector, &query_vector);
            scored.push(entry.chunk.clone().with_score(score));
        }

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(k);
        Ok(scored)
    }
}

#[async_trait]
impl<E: Embedder> RetrievalIndex for MemoryVectorStore<E> {
    async fn search(&self, query: &str) -> Result<Vec<DocumentChunk>, IndexError> {
        self.similarity_search(query, self.k).await
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
