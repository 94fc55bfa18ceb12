use crate::error::SearchError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 384;

/// Prepended to questions (never to indexed passages); retrieval-tuned
/// embedding models expect it on the query side.
pub const QUERY_INSTRUCTION: &str = "Represent this sentence for searching relevant passages: ";

#[async_trait]
pub trait Embedder: Send + Sync {
    fn dimensions(&self) -> usize;

    /// Returns an L2-normalized vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, SearchError>;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }

    async fn embed_query(&self, question: &str) -> Result<Vec<f32>, SearchError> {
        self.embed(&format!("{QUERY_INSTRUCTION}{question}")).await
    }
}

pub fn l2_normalize(vector: &mut [f32]) {
    let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
    if magnitude > 0.0 {
        for value in vector.iter_mut() {
            *value /= magnitude;
        }
    }
}

/// Offline embedder hashing character trigrams into a fixed number of buckets.
#[derive(Debug, Clone, Copy)]
pub struct CharacterNgramEmbedder {
    pub dimensions: usize,
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

impl CharacterNgramEmbedder {
    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions.max(1)];
        let chars: Vec<char> = text.to_lowercase().chars().collect();

        for window in chars.windows(3) {
            let mut hash = 1469598103934665603u64;
            for byte in window.iter().collect::<String>().bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(1099511628211);
            }
            let bucket = (hash % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        l2_normalize(&mut vector);
        vector
    }
}

#[async_trait]
impl Embedder for CharacterNgramEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions.max(1)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, SearchError> {
        Ok(self.vectorize(text))
    }
}

#[derive(Debug, Clone, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingsResponse {
    embedding: Vec<f32>,
}

/// Embedder backed by an Ollama-compatible `/api/embeddings` endpoint.
pub struct OllamaEmbedder {
    client: Client,
    endpoint: url::Url,
    model: String,
    dimensions: usize,
}

impl OllamaEmbedder {
    pub fn new(
        base_url: &str,
        model: impl Into<String>,
        dimensions: usize,
    ) -> Result<Self, SearchError> {
        let endpoint = url::Url::parse(base_url)?.join("api/embeddings")?;
        Ok(Self {
            client: Client::new(),
            endpoint,
            model: model.into(),
            dimensions,
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, SearchError> {
        debug!(model = %self.model, chars = text.len(), "requesting embedding");
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&EmbeddingsRequest {
                model: &self.model,
                prompt: text,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::Embedding(format!(
                "{} returned {}",
                self.endpoint,
                response.status()
            )));
        }

        let payload: EmbeddingsResponse = response.json().await?;
        checked_embedding(payload.embedding, self.dimensions)
    }
}

fn checked_embedding(mut embedding: Vec<f32>, dimensions: usize) -> Result<Vec<f32>, SearchError> {
    if embedding.is_empty() {
        return Err(SearchError::Embedding("embedding response was empty".to_string()));
    }
    if embedding.len() != dimensions {
        return Err(SearchError::Embedding(format!(
            "embedding dimension {} != {}",
            embedding.len(),
            dimensions
        )));
    }
    l2_normalize(&mut embedding);
    Ok(embedding)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn embedder_is_deterministic() -> Result<(), SearchError> {
        let embedder = CharacterNgramEmbedder::default();
        let first = embedder.embed("Warranty period and returns").await?;
        let second = embedder.embed("Warranty period and returns").await?;
        assert_eq!(first, second);
        Ok(())
    }

    #[tokio::test]
    async fn embedder_outputs_unit_vectors_of_expected_length() -> Result<(), SearchError> {
        let embedder = CharacterNgramEmbedder { dimensions: 32 };
        let vector = embedder.embed("abcdef").await?;
        assert_eq!(vector.len(), 32);
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
        Ok(())
    }

    #[tokio::test]
    async fn query_embedding_uses_instruction_prefix() -> Result<(), SearchError> {
        let embedder = CharacterNgramEmbedder::default();
        let query = embedder.embed_query("How long?").await?;
        let prefixed = embedder.embed(&format!("{QUERY_INSTRUCTION}How long?")).await?;
        let plain = embedder.embed("How long?").await?;
        assert_eq!(query, prefixed);
        assert_ne!(query, plain);
        Ok(())
    }

    #[tokio::test]
    async fn batch_matches_single_embeddings() -> Result<(), SearchError> {
        let embedder = CharacterNgramEmbedder { dimensions: 16 };
        let texts = vec!["first passage".to_string(), "second passage".to_string()];
        let batch = embedder.embed_batch(&texts).await?;
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[1], embedder.embed("second passage").await?);
        Ok(())
    }

    #[test]
    fn remote_embeddings_are_checked_and_normalized() {
        let normalized = checked_embedding(vec![3.0, 4.0], 2);
        assert!(normalized.is_ok_and(|vector| vector == vec![0.6, 0.8]));
        assert!(checked_embedding(Vec::new(), 2).is_err());
        assert!(checked_embedding(vec![1.0], 2).is_err());
    }

    #[test]
    fn ollama_endpoint_is_joined_onto_base() -> Result<(), SearchError> {
        let embedder = OllamaEmbedder::new("http://localhost:11434/", "nomic-embed-text", 768)?;
        assert_eq!(embedder.endpoint.as_str(), "http://localhost:11434/api/embeddings");
        Ok(())
    }
}
