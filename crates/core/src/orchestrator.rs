use crate::chunking::{build_passages, normalize, passage_id};
use crate::dedupe::dedupe_hits;
use crate::embeddings::Embedder;
use crate::eval::{evaluate, EvalCase, EvalReport};
use crate::extractor::{LopdfExtractor, PageText, PdfExtractor};
use crate::ingest::{digest_file, document_identity, has_pdf_extension, store_upload};
use crate::models::{
    AskRequest, AskResponse, DocumentSummary, Hit, IngestionOptions, QueryResult,
    RetrievalOptions, StoredPassage, TenantId, UploadReport,
};
use crate::report::analyze_pages;
use crate::synthesis::{OverlapScorer, SentenceScorer, Synthesizer};
use crate::traits::VectorStore;
use crate::{IngestError, SearchError};
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Upload and ask pipeline over an embedding provider and a tenant-keyed
/// vector store.
pub struct DocQuery<E, S, C = OverlapScorer> {
    embedder: E,
    store: S,
    extractor: Box<dyn PdfExtractor>,
    synthesizer: Synthesizer<C>,
    ingestion: IngestionOptions,
    retrieval: RetrievalOptions,
    storage_dir: Option<PathBuf>,
}

impl<E, S> DocQuery<E, S, OverlapScorer>
where
    E: Embedder,
    S: VectorStore,
{
    pub fn new(embedder: E, store: S) -> Self {
        Self {
            embedder,
            store,
            extractor: Box::new(LopdfExtractor),
            synthesizer: Synthesizer::default(),
            ingestion: IngestionOptions::default(),
            retrieval: RetrievalOptions::default(),
            storage_dir: None,
        }
    }
}

impl<E, S, C> DocQuery<E, S, C>
where
    E: Embedder,
    S: VectorStore,
    C: SentenceScorer,
{
    pub fn with_options(mut self, ingestion: IngestionOptions, retrieval: RetrievalOptions) -> Self {
        self.ingestion = ingestion;
        self.retrieval = retrieval;
        self
    }

    pub fn with_extractor(mut self, extractor: impl PdfExtractor + 'static) -> Self {
        self.extractor = Box::new(extractor);
        self
    }

    /// Uploads are copied here before indexing.
    pub fn with_storage_dir(mut self, storage_dir: impl Into<PathBuf>) -> Self {
        self.storage_dir = Some(storage_dir.into());
        self
    }

    pub fn with_scorer<C2: SentenceScorer>(self, scorer: C2) -> DocQuery<E, S, C2> {
        DocQuery {
            embedder: self.embedder,
            store: self.store,
            extractor: self.extractor,
            synthesizer: Synthesizer::new(scorer),
            ingestion: self.ingestion,
            retrieval: self.retrieval,
            storage_dir: self.storage_dir,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn upload(&self, tenant: &TenantId, path: &Path) -> Result<UploadReport, IngestError> {
        if !has_pdf_extension(path) {
            return Err(IngestError::InvalidArgument(
                "only PDF files are supported".to_string(),
            ));
        }

        let saved = match &self.storage_dir {
            Some(dir) => store_upload(path, dir).await?,
            None => path.to_path_buf(),
        };
        let (doc_id, title) = document_identity(&saved)?;
        let checksum = digest_file(&saved)?;

        let pages = self.extractor.extract_pages(&saved)?;
        let report = analyze_pages(&pages, &self.ingestion);
        debug!(%doc_id, pages = report.pages_total, flagged = report.flagged_pages.len(), "extracted pages");

        let indexed_chunks = self.index_pages(tenant, &doc_id, &title, &pages).await?;

        Ok(UploadReport {
            doc_id,
            title,
            saved_as: saved.display().to_string(),
            checksum,
            ingested_at: Utc::now(),
            report,
            indexed_chunks,
        })
    }

    /// Chunks, embeds and stores a document's pages. Fails when no page has
    /// text left after normalization.
    pub async fn index_pages(
        &self,
        tenant: &TenantId,
        doc_id: &str,
        title: &str,
        pages: &[PageText],
    ) -> Result<usize, IngestError> {
        let passages = build_passages(doc_id, title, pages, &self.ingestion);
        if passages.is_empty() {
            return Err(IngestError::NoExtractableText(title.to_string()));
        }

        let texts = passages
            .iter()
            .map(|passage| passage.text.clone())
            .collect::<Vec<_>>();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        if embeddings.len() != passages.len() {
            return Err(SearchError::Embedding(format!(
                "embedding count {} doesn't match passage count {}",
                embeddings.len(),
                passages.len()
            ))
            .into());
        }

        let stored = passages
            .into_iter()
            .zip(embeddings)
            .map(|(passage, embedding)| StoredPassage {
                id: passage_id(&passage),
                metadata: passage.metadata(),
                document: passage.text,
                embedding,
            })
            .collect::<Vec<_>>();

        self.store.add(tenant, &stored).await?;
        info!(%tenant, %doc_id, chunks = stored.len(), "indexed document");
        Ok(stored.len())
    }

    pub async fn ask(&self, tenant: &TenantId, request: &AskRequest) -> Result<AskResponse, SearchError> {
        let query_embedding = self.embedder.embed_query(&request.question).await?;
        let n_results = request.top_k.max(self.retrieval.min_fetch);

        let raw = self
            .store
            .query(tenant, &query_embedding, n_results, request.doc_id.as_deref())
            .await?;
        let mut hits = hits_from_result(raw, self.retrieval.snippet_chars)?;
        let fetched = hits.len();

        if let Some(max_distance) = request.max_distance {
            hits = filter_by_distance(hits, max_distance);
        }

        let mut hits = dedupe_hits(hits, self.retrieval.dedupe_head_len);
        hits.truncate(request.top_k);
        debug!(%tenant, fetched, kept = hits.len(), "retrieved hits");

        let synthesized =
            self.synthesizer
                .synthesize(&request.question, &hits, self.retrieval.max_sentences);

        Ok(AskResponse {
            question: request.question.clone(),
            answer: synthesized.answer,
            citations: synthesized.citations,
            results: hits,
        })
    }

    pub async fn list_documents(&self, tenant: &TenantId) -> Result<Vec<DocumentSummary>, SearchError> {
        let metadatas = self.store.get(tenant, self.retrieval.list_limit).await?;

        let mut counts = BTreeMap::<String, usize>::new();
        for metadata in metadatas.into_iter().filter(|m| !m.doc_id.is_empty()) {
            *counts.entry(metadata.doc_id).or_default() += 1;
        }

        Ok(counts
            .into_iter()
            .map(|(doc_id, chunks)| DocumentSummary { doc_id, chunks })
            .collect())
    }

    pub async fn count(&self, tenant: &TenantId) -> Result<usize, SearchError> {
        self.store.count(tenant).await
    }

    pub async fn reset(&self) -> Result<(), SearchError> {
        self.store.reset().await?;
        info!("vector store cleared");
        Ok(())
    }

    pub async fn evaluate(
        &self,
        tenant: &TenantId,
        cases: &[EvalCase],
        k: usize,
    ) -> Result<EvalReport, SearchError> {
        evaluate(&self.embedder, &self.store, tenant, cases, k).await
    }
}

pub fn hits_from_result(raw: QueryResult, snippet_chars: usize) -> Result<Vec<Hit>, SearchError> {
    if raw.documents.len() != raw.metadatas.len() || raw.documents.len() != raw.distances.len() {
        return Err(SearchError::BackendResponse {
            backend: "vector store".to_string(),
            details: format!(
                "parallel arrays differ: {} documents, {} metadatas, {} distances",
                raw.documents.len(),
                raw.metadatas.len(),
                raw.distances.len()
            ),
        });
    }

    Ok(raw
        .documents
        .into_iter()
        .zip(raw.metadatas)
        .zip(raw.distances)
        .map(|((document, metadata), distance)| Hit {
            snippet: normalize(&document).chars().take(snippet_chars).collect(),
            doc_id: metadata.doc_id,
            title: metadata.title,
            page: metadata.page,
            distance,
        })
        .collect())
}

pub fn filter_by_distance(hits: Vec<Hit>, max_distance: f32) -> Vec<Hit> {
    hits.into_iter()
        .filter(|hit| hit.distance <= max_distance)
        .collect()
}
