use crate::models::{PassageMetadata, QueryResult, StoredPassage, TenantId};
use crate::traits::VectorStore;
use crate::SearchError;
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, info};

const BACKEND: &str = "qdrant";
const TENANT_PREFIX: &str = "user_";

/// Qdrant over its REST API, one cosine collection per tenant.
pub struct QdrantStore {
    endpoint: String,
    client: Client,
    vector_size: usize,
}

impl QdrantStore {
    pub fn new(endpoint: impl Into<String>, vector_size: usize) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            client: Client::new(),
            vector_size,
        }
    }

    fn collection_url(&self, tenant: &TenantId) -> String {
        format!("{}/collections/{}", self.endpoint, tenant.collection_name())
    }

    pub async fn ensure_collection(&self, tenant: &TenantId) -> Result<(), SearchError> {
        let url = self.collection_url(tenant);
        let response = self.client.get(&url).send().await?;

        if response.status().is_success() {
            return Ok(());
        }
        if response.status() != StatusCode::NOT_FOUND {
            return Err(SearchError::backend(BACKEND, response.status().to_string()));
        }

        info!(collection = %tenant.collection_name(), size = self.vector_size, "creating collection");
        let response = self
            .client
            .put(&url)
            .json(&json!({
                "vectors": { "size": self.vector_size, "distance": "Cosine" }
            }))
            .send()
            .await?;
        expect_success(response).await?;
        Ok(())
    }

    /// POSTs to a collection sub-resource; `None` when the collection does
    /// not exist yet.
    async fn post_collection(
        &self,
        tenant: &TenantId,
        path: &str,
        body: Value,
    ) -> Result<Option<Value>, SearchError> {
        let response = self
            .client
            .post(format!("{}/{}", self.collection_url(tenant), path))
            .json(&body)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(expect_success(response).await?.json().await?))
    }
}

async fn expect_success(response: Response) -> Result<Response, SearchError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(SearchError::backend(BACKEND, format!("{status}: {body}")))
}

fn doc_filter(doc_id: Option<&str>) -> Option<Value> {
    doc_id.map(|id| {
        json!({
            "must": [{ "key": "doc_id", "match": { "value": id } }]
        })
    })
}

fn point_payload(passage: &StoredPassage) -> Value {
    json!({
        "passage_id": passage.id,
        "document": passage.document,
        "doc_id": passage.metadata.doc_id,
        "title": passage.metadata.title,
        "page": passage.metadata.page,
    })
}

fn metadata_from_payload(payload: &Value) -> Result<PassageMetadata, SearchError> {
    let text = |key: &str| {
        payload
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| SearchError::backend(BACKEND, format!("payload missing {key}")))
    };
    let page = payload
        .get("page")
        .and_then(Value::as_u64)
        .and_then(|page| u32::try_from(page).ok())
        .ok_or_else(|| SearchError::backend(BACKEND, "payload missing page"))?;

    Ok(PassageMetadata {
        doc_id: text("doc_id")?,
        title: text("title")?,
        page,
    })
}

fn parse_search_result(parsed: &Value) -> Result<QueryResult, SearchError> {
    let points = parsed
        .pointer("/result")
        .and_then(Value::as_array)
        .ok_or_else(|| SearchError::backend(BACKEND, "search response has no result array"))?;

    let mut result = QueryResult::default();
    for point in points {
        let payload = point.get("payload").unwrap_or(&Value::Null);
        let similarity = point
            .get("score")
            .and_then(Value::as_f64)
            .ok_or_else(|| SearchError::backend(BACKEND, "point without score"))?;

        result.metadatas.push(metadata_from_payload(payload)?);
        result.documents.push(
            payload
                .get("document")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        );
        // Cosine similarity to cosine distance.
        result.distances.push((1.0 - similarity as f32).max(0.0));
    }

    Ok(result)
}

fn parse_count(parsed: &Value) -> Result<usize, SearchError> {
    parsed
        .pointer("/result/count")
        .and_then(Value::as_u64)
        .and_then(|count| usize::try_from(count).ok())
        .ok_or_else(|| SearchError::backend(BACKEND, "count response has no result count"))
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn add(&self, tenant: &TenantId, passages: &[StoredPassage]) -> Result<(), SearchError> {
        if passages.is_empty() {
            return Ok(());
        }
        self.ensure_collection(tenant).await?;

        let points = passages
            .iter()
            .map(|passage| {
                if passage.embedding.len() != self.vector_size {
                    return Err(SearchError::Request(format!(
                        "embedding dimension {} != {}",
                        passage.embedding.len(),
                        self.vector_size
                    )));
                }

                Ok(json!({
                    "id": uuid::Uuid::new_v4().to_string(),
                    "vector": passage.embedding,
                    "payload": point_payload(passage),
                }))
            })
            .collect::<Result<Vec<_>, SearchError>>()?;

        debug!(collection = %tenant.collection_name(), points = points.len(), "upserting points");
        let response = self
            .client
            .put(format!("{}/points?wait=true", self.collection_url(tenant)))
            .json(&json!({ "points": points }))
            .send()
            .await?;
        expect_success(response).await?;
        Ok(())
    }

    async fn query(
        &self,
        tenant: &TenantId,
        query_embedding: &[f32],
        n_results: usize,
        doc_id: Option<&str>,
    ) -> Result<QueryResult, SearchError> {
        if query_embedding.len() != self.vector_size {
            return Err(SearchError::Request(format!(
                "query vector dim {} is not {}",
                query_embedding.len(),
                self.vector_size
            )));
        }

        let mut body = json!({
            "vector": query_embedding,
            "limit": n_results,
            "with_payload": true,
        });
        if let Some(filter) = doc_filter(doc_id) {
            body["filter"] = filter;
        }

        match self.post_collection(tenant, "points/search", body).await? {
            Some(parsed) => parse_search_result(&parsed),
            None => Ok(QueryResult::default()),
        }
    }

    async fn get(&self, tenant: &TenantId, limit: usize) -> Result<Vec<PassageMetadata>, SearchError> {
        let body = json!({ "limit": limit, "with_payload": true, "with_vector": false });
        let Some(parsed) = self.post_collection(tenant, "points/scroll", body).await? else {
            return Ok(Vec::new());
        };

        parsed
            .pointer("/result/points")
            .and_then(Value::as_array)
            .map(|points| {
                points
                    .iter()
                    .map(|point| metadata_from_payload(point.get("payload").unwrap_or(&Value::Null)))
                    .collect()
            })
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn count(&self, tenant: &TenantId) -> Result<usize, SearchError> {
        let parsed = self
            .post_collection(tenant, "points/count", json!({ "exact": true }))
            .await?;
        match parsed {
            Some(value) => parse_count(&value),
            None => Ok(0),
        }
    }

    async fn reset(&self) -> Result<(), SearchError> {
        let response = self
            .client
            .get(format!("{}/collections", self.endpoint))
            .send()
            .await?;
        let listed: Value = expect_success(response).await?.json().await?;

        let names = listed
            .pointer("/result/collections")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter_map(|collection| {
                collection
                    .get("name")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .filter(|name| name.starts_with(TENANT_PREFIX));

        for name in names {
            info!(collection = %name, "dropping collection");
            let response = self
                .client
                .delete(format!("{}/collections/{}", self.endpoint, name))
                .send()
                .await?;
            expect_success(response).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_scores_become_distances() -> Result<(), SearchError> {
        let response = json!({
            "result": [
                { "id": "a", "score": 0.9, "payload": {
                    "document": "The warranty period is 24 months.",
                    "doc_id": "manual", "title": "manual.pdf", "page": 3 } },
                { "id": "b", "score": 0.25, "payload": {
                    "document": "Contact support.",
                    "doc_id": "manual", "title": "manual.pdf", "page": 7 } }
            ]
        });

        let result = parse_search_result(&response)?;

        assert_eq!(result.documents.len(), 2);
        assert_eq!(result.metadatas[0].page, 3);
        assert!((result.distances[0] - 0.1).abs() < 1e-6);
        assert!((result.distances[1] - 0.75).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn malformed_payload_is_a_backend_error() {
        let response = json!({ "result": [ { "id": "a", "score": 0.5, "payload": { "doc_id": "x" } } ] });
        assert!(matches!(
            parse_search_result(&response),
            Err(SearchError::BackendResponse { .. })
        ));
        assert!(parse_search_result(&json!({ "status": "ok" })).is_err());
    }

    #[test]
    fn count_reads_result_count() -> Result<(), SearchError> {
        assert_eq!(parse_count(&json!({ "result": { "count": 12 } }))?, 12);
        Ok(())
    }

    #[test]
    fn malformed_count_is_a_backend_error() {
        assert!(matches!(
            parse_count(&json!({ "result": { "count": "many" } })),
            Err(SearchError::BackendResponse { .. })
        ));
        assert!(parse_count(&json!({ "status": "ok" })).is_err());
    }

    #[test]
    fn doc_filter_matches_on_doc_id() {
        assert!(doc_filter(None).is_none());
        let filter = doc_filter(Some("manual"));
        assert_eq!(
            filter.and_then(|value| value.pointer("/must/0/match/value").cloned()),
            Some(json!("manual"))
        );
    }

    #[test]
    fn payload_round_trips_metadata() -> Result<(), SearchError> {
        let passage = StoredPassage {
            id: "manual-p3-0-abcdef".to_string(),
            document: "text".to_string(),
            metadata: PassageMetadata {
                doc_id: "manual".to_string(),
                title: "manual.pdf".to_string(),
                page: 3,
            },
            embedding: vec![1.0],
        };

        let metadata = metadata_from_payload(&point_payload(&passage))?;
        assert_eq!(metadata, passage.metadata);
        Ok(())
    }

    #[test]
    fn endpoint_trailing_slash_is_trimmed() {
        let store = QdrantStore::new("http://localhost:6333/", 4);
        assert_eq!(
            store.collection_url(&TenantId::from("demo")),
            "http://localhost:6333/collections/user_demo"
        );
    }
}
