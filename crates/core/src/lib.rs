pub mod chunking;
pub mod dedupe;
pub mod embeddings;
pub mod error;
pub mod eval;
pub mod extractor;
pub mod ingest;
pub mod models;
pub mod orchestrator;
pub mod report;
pub mod sentences;
pub mod stores;
pub mod synthesis;
pub mod traits;

pub use chunking::{build_passages, chunk_text, normalize, WordWindows};
pub use dedupe::{dedupe_hits, DEFAULT_HEAD_LEN};
pub use embeddings::{
    CharacterNgramEmbedder, Embedder, OllamaEmbedder, DEFAULT_EMBEDDING_DIMENSIONS,
    QUERY_INSTRUCTION,
};
pub use error::{IngestError, SearchError};
pub use eval::{EvalCase, EvalDetail, EvalReport};
pub use extractor::{extract_page_texts, LopdfExtractor, PageText, PdfExtractor};
pub use ingest::{discover_pdf_files, digest_file};
pub use models::{
    AskRequest, AskResponse, CandidateSentence, Citation, DocumentSummary, Hit,
    IngestionOptions, Passage, PassageMetadata, QueryResult, RetrievalOptions, StoredPassage,
    SynthesizedAnswer, TenantId, UploadReport,
};
pub use orchestrator::DocQuery;
pub use report::{analyze_pages, PageReport, PdfReport};
pub use sentences::{split_sentences, word_tokens};
pub use stores::{InMemoryVectorStore, QdrantStore};
pub use synthesis::{synthesize, OverlapScorer, SentenceScore, SentenceScorer, Synthesizer};
pub use traits::VectorStore;
