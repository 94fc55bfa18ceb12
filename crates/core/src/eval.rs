//! Hit@k evaluation of raw retrieval against pages known to hold the answer.

use crate::embeddings::Embedder;
use crate::models::TenantId;
use crate::traits::VectorStore;
use crate::SearchError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalCase {
    pub question: String,
    pub expected_pages: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalDetail {
    pub question: String,
    pub expected_pages: Vec<u32>,
    pub got_pages: Vec<u32>,
    pub hit: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalReport {
    pub k: usize,
    pub hits: usize,
    pub total: usize,
    pub hit_rate: f64,
    pub details: Vec<EvalDetail>,
}

pub async fn evaluate<E, S>(
    embedder: &E,
    store: &S,
    tenant: &TenantId,
    cases: &[EvalCase],
    k: usize,
) -> Result<EvalReport, SearchError>
where
    E: Embedder + ?Sized,
    S: VectorStore + ?Sized,
{
    let mut details = Vec::with_capacity(cases.len());

    for case in cases {
        let embedding = embedder.embed_query(&case.question).await?;
        let result = store.query(tenant, &embedding, k, None).await?;
        let got_pages = result
            .metadatas
            .iter()
            .map(|metadata| metadata.page)
            .collect::<Vec<_>>();
        let hit = got_pages.iter().any(|page| case.expected_pages.contains(page));

        details.push(EvalDetail {
            question: case.question.clone(),
            expected_pages: case.expected_pages.clone(),
            got_pages,
            hit,
        });
    }

    let hits = details.iter().filter(|detail| detail.hit).count();
    let total = details.len();
    Ok(EvalReport {
        k,
        hits,
        total,
        hit_rate: if total == 0 { 0.0 } else { hits as f64 / total as f64 },
        details,
    })
}
