use crate::models::{PassageMetadata, QueryResult, StoredPassage, TenantId};
use crate::traits::VectorStore;
use crate::SearchError;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Process-local store with exact cosine-distance search.
#[derive(Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<TenantId, Vec<StoredPassage>>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

pub fn cosine_distance(left: &[f32], right: &[f32]) -> f32 {
    let dot = left.iter().zip(right).map(|(a, b)| a * b).sum::<f32>();
    let left_norm = left.iter().map(|v| v * v).sum::<f32>().sqrt();
    let right_norm = right.iter().map(|v| v * v).sum::<f32>().sqrt();
    if left_norm == 0.0 || right_norm == 0.0 {
        return 1.0;
    }
    (1.0 - dot / (left_norm * right_norm)).max(0.0)
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn add(&self, tenant: &TenantId, passages: &[StoredPassage]) -> Result<(), SearchError> {
        let mut collections = self.collections.write().await;
        let collection = collections.entry(tenant.clone()).or_default();

        if let Some(expected) = collection.first().map(|stored| stored.embedding.len()) {
            if let Some(bad) = passages.iter().find(|p| p.embedding.len() != expected) {
                return Err(SearchError::Request(format!(
                    "embedding dimension {} != {} for {}",
                    bad.embedding.len(),
                    expected,
                    bad.id
                )));
            }
        }

        collection.extend_from_slice(passages);
        Ok(())
    }

    async fn query(
        &self,
        tenant: &TenantId,
        query_embedding: &[f32],
        n_results: usize,
        doc_id: Option<&str>,
    ) -> Result<QueryResult, SearchError> {
        let collections = self.collections.read().await;
        let Some(collection) = collections.get(tenant) else {
            return Ok(QueryResult::default());
        };

        let mut scored: Vec<(f32, &StoredPassage)> = collection
            .iter()
            .filter(|stored| doc_id.map_or(true, |id| stored.metadata.doc_id == id))
            .map(|stored| (cosine_distance(query_embedding, &stored.embedding), stored))
            .collect();
        scored.sort_by(|left, right| left.0.total_cmp(&right.0));
        scored.truncate(n_results);

        let mut result = QueryResult::default();
        for (distance, stored) in scored {
            result.documents.push(stored.document.clone());
            result.metadatas.push(stored.metadata.clone());
            result.distances.push(distance);
        }
        Ok(result)
    }

    async fn get(&self, tenant: &TenantId, limit: usize) -> Result<Vec<PassageMetadata>, SearchError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(tenant)
            .map(|collection| {
                collection
                    .iter()
                    .take(limit)
                    .map(|stored| stored.metadata.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn count(&self, tenant: &TenantId) -> Result<usize, SearchError> {
        Ok(self
            .collections
            .read()
            .await
            .get(tenant)
            .map_or(0, Vec::len))
    }

    async fn reset(&self) -> Result<(), SearchError> {
        self.collections.write().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(id: &str, doc_id: &str, page: u32, embedding: Vec<f32>) -> StoredPassage {
        StoredPassage {
            id: id.to_string(),
            document: format!("text of {id}"),
            metadata: PassageMetadata {
                doc_id: doc_id.to_string(),
                title: format!("{doc_id}.pdf"),
                page,
            },
            embedding,
        }
    }

    #[tokio::test]
    async fn query_orders_by_ascending_distance() -> Result<(), SearchError> {
        let store = InMemoryVectorStore::new();
        let tenant = TenantId::from("alice");
        store
            .add(
                &tenant,
                &[
                    stored("far", "a", 1, vec![0.0, 1.0]),
                    stored("near", "a", 2, vec![1.0, 0.1]),
                ],
            )
            .await?;

        let result = store.query(&tenant, &[1.0, 0.0], 10, None).await?;

        assert_eq!(result.documents, vec!["text of near", "text of far"]);
        assert_eq!(result.metadatas[0].page, 2);
        assert!(result.distances[0] < result.distances[1]);
        assert_eq!(result.documents.len(), result.distances.len());
        Ok(())
    }

    #[tokio::test]
    async fn tenants_and_doc_filters_are_isolated() -> Result<(), SearchError> {
        let store = InMemoryVectorStore::new();
        let alice = TenantId::from("alice");
        let bob = TenantId::from("bob");
        store
            .add(
                &alice,
                &[
                    stored("a1", "manual", 1, vec![1.0, 0.0]),
                    stored("a2", "policy", 1, vec![1.0, 0.0]),
                ],
            )
            .await?;

        assert_eq!(store.count(&alice).await?, 2);
        assert_eq!(store.count(&bob).await?, 0);
        assert!(store.query(&bob, &[1.0, 0.0], 5, None).await?.documents.is_empty());

        let filtered = store.query(&alice, &[1.0, 0.0], 5, Some("policy")).await?;
        assert_eq!(filtered.metadatas.len(), 1);
        assert_eq!(filtered.metadatas[0].doc_id, "policy");
        Ok(())
    }

    #[tokio::test]
    async fn get_limits_and_reset_clears() -> Result<(), SearchError> {
        let store = InMemoryVectorStore::new();
        let tenant = TenantId::from("alice");
        store
            .add(
                &tenant,
                &[
                    stored("1", "d", 1, vec![1.0]),
                    stored("2", "d", 2, vec![1.0]),
                    stored("3", "d", 3, vec![1.0]),
                ],
            )
            .await?;

        assert_eq!(store.get(&tenant, 2).await?.len(), 2);
        store.reset().await?;
        assert_eq!(store.count(&tenant).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn mismatched_dimensions_are_rejected() -> Result<(), SearchError> {
        let store = InMemoryVectorStore::new();
        let tenant = TenantId::from("alice");
        store.add(&tenant, &[stored("1", "d", 1, vec![1.0, 0.0])]).await?;

        let result = store.add(&tenant, &[stored("2", "d", 1, vec![1.0])]).await;
        assert!(matches!(result, Err(SearchError::Request(_))));
        Ok(())
    }

    #[test]
    fn cosine_distance_bounds() {
        assert!(cosine_distance(&[1.0, 0.0], &[1.0, 0.0]).abs() < 1e-6);
        assert!((cosine_distance(&[1.0, 0.0], &[0.0, 1.0]) - 1.0).abs() < 1e-6);
        assert!((cosine_distance(&[0.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
    }
}
