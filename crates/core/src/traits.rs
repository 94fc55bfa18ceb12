use crate::models::{PassageMetadata, QueryResult, StoredPassage, TenantId};
use crate::SearchError;
use async_trait::async_trait;

/// Tenant-keyed vector index. Distances must be monotonic: smaller means
/// more similar.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn add(&self, tenant: &TenantId, passages: &[StoredPassage]) -> Result<(), SearchError>;

    async fn query(
        &self,
        tenant: &TenantId,
        query_embedding: &[f32],
        n_results: usize,
        doc_id: Option<&str>,
    ) -> Result<QueryResult, SearchError>;

    async fn get(&self, tenant: &TenantId, limit: usize) -> Result<Vec<PassageMetadata>, SearchError>;

    async fn count(&self, tenant: &TenantId) -> Result<usize, SearchError>;

    /// Clears every tenant's collection.
    async fn reset(&self) -> Result<(), SearchError>;
}
