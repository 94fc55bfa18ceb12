use async_trait::async_trait;
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use docquery_core::{
    analyze_pages, discover_pdf_files, extract_page_texts, AskRequest, CharacterNgramEmbedder,
    DocQuery, Embedder, EvalCase, IngestionOptions, OllamaEmbedder, QdrantStore,
    RetrievalOptions, SearchError, TenantId,
};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "docquery", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Qdrant base URL
    #[arg(long, env = "DOCQUERY_QDRANT_URL", default_value = "http://localhost:6333")]
    qdrant_url: String,

    /// Tenant whose collection is read and written
    #[arg(long, env = "DOCQUERY_TENANT", default_value = "demo-user")]
    tenant: String,

    /// Embedding backend
    #[arg(long, env = "DOCQUERY_EMBEDDER", value_enum, default_value_t = EmbedderKind::Ngram)]
    embedder: EmbedderKind,

    /// Ollama base URL for the ollama embedder
    #[arg(long, env = "DOCQUERY_OLLAMA_URL", default_value = "http://localhost:11434")]
    ollama_url: String,

    /// Embedding model served by Ollama
    #[arg(long, env = "DOCQUERY_OLLAMA_MODEL", default_value = "nomic-embed-text")]
    ollama_model: String,

    /// Vector dimensions produced by the embedder
    #[arg(long, env = "DOCQUERY_DIMENSIONS", default_value_t = docquery_core::DEFAULT_EMBEDDING_DIMENSIONS)]
    dimensions: usize,

    /// Directory uploads are copied into before indexing
    #[arg(long, env = "DOCQUERY_STORAGE_DIR", default_value = "./storage")]
    storage_dir: PathBuf,

    /// Words per indexed window
    #[arg(long, env = "DOCQUERY_MAX_WORDS", default_value_t = 220)]
    max_words: usize,

    /// Words shared between consecutive windows
    #[arg(long, env = "DOCQUERY_OVERLAP_WORDS", default_value_t = 60)]
    overlap_words: usize,

    /// Snippet characters compared when dropping near-duplicate hits
    #[arg(long, env = "DOCQUERY_DEDUPE_HEAD_LEN", default_value_t = 200)]
    dedupe_head_len: usize,

    /// Sentences in a synthesized answer
    #[arg(long, env = "DOCQUERY_MAX_SENTENCES", default_value_t = 3)]
    max_sentences: usize,
}

#[derive(Clone, Copy, ValueEnum)]
enum EmbedderKind {
    /// Offline hashed character trigrams.
    Ngram,
    /// Ollama `/api/embeddings`.
    Ollama,
}

#[derive(Subcommand)]
enum Command {
    /// Index a PDF, or every PDF below a folder.
    Upload {
        #[arg(long)]
        path: PathBuf,
    },
    /// Ask a question and print an extractive answer with citations.
    Ask {
        #[arg(long)]
        question: String,
        /// Number of hits to keep.
        #[arg(long, default_value = "5")]
        top_k: usize,
        /// Restrict retrieval to one document.
        #[arg(long)]
        doc_id: Option<String>,
        /// Drop hits above this distance, e.g. 0.85.
        #[arg(long)]
        max_distance: Option<f32>,
        /// Print the response as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// List indexed documents with their chunk counts.
    Docs,
    /// Drop every tenant collection.
    Reset,
    /// Report per-page extractable text without indexing.
    Analyze {
        #[arg(long)]
        path: PathBuf,
    },
    /// Hit@k over a JSON file of {question, expected_pages} cases.
    Eval {
        #[arg(long)]
        cases: PathBuf,
        #[arg(long, default_value = "5")]
        k: usize,
    },
}

enum AnyEmbedder {
    Ngram(CharacterNgramEmbedder),
    Ollama(OllamaEmbedder),
}

#[async_trait]
impl Embedder for AnyEmbedder {
    fn dimensions(&self) -> usize {
        match self {
            Self::Ngram(embedder) => embedder.dimensions(),
            Self::Ollama(embedder) => embedder.dimensions(),
        }
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, SearchError> {
        match self {
            Self::Ngram(embedder) => embedder.embed(text).await,
            Self::Ollama(embedder) => embedder.embed(text).await,
        }
    }
}

impl Cli {
    fn build_embedder(&self) -> Result<AnyEmbedder, SearchError> {
        Ok(match self.embedder {
            EmbedderKind::Ngram => AnyEmbedder::Ngram(CharacterNgramEmbedder {
                dimensions: self.dimensions,
            }),
            EmbedderKind::Ollama => AnyEmbedder::Ollama(OllamaEmbedder::new(
                &self.ollama_url,
                &self.ollama_model,
                self.dimensions,
            )?),
        })
    }

    fn ingestion_options(&self) -> IngestionOptions {
        IngestionOptions {
            max_words: self.max_words,
            overlap_words: self.overlap_words,
            ..IngestionOptions::default()
        }
    }

    fn retrieval_options(&self) -> RetrievalOptions {
        RetrievalOptions {
            dedupe_head_len: self.dedupe_head_len,
            max_sentences: self.max_sentences,
            ..RetrievalOptions::default()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let tenant = TenantId::new(cli.tenant.clone());
    let embedder = cli.build_embedder()?;
    let ingestion = cli.ingestion_options();
    let store = QdrantStore::new(&cli.qdrant_url, embedder.dimensions());
    let pipeline = DocQuery::new(embedder, store)
        .with_options(ingestion.clone(), cli.retrieval_options())
        .with_storage_dir(cli.storage_dir.clone());

    info!(
        version = env!("CARGO_PKG_VERSION"),
        %tenant,
        started_at = %Utc::now().to_rfc3339(),
        "docquery boot"
    );

    match cli.command {
        Command::Upload { path } => {
            let files = discover_pdf_files(&path)?;
            let mut failures = 0usize;
            for file in files {
                match pipeline.upload(&tenant, &file).await {
                    Ok(report) => println!("{}", serde_json::to_string_pretty(&report)?),
                    Err(error) => {
                        failures += 1;
                        warn!(path = %file.display(), %error, "upload failed");
                        eprintln!("{}: {error}", file.display());
                    }
                }
            }
            if failures > 0 {
                anyhow::bail!("{failures} upload(s) failed");
            }
        }
        Command::Ask {
            question,
            top_k,
            doc_id,
            max_distance,
            json,
        } => {
            let request = AskRequest {
                question,
                top_k,
                doc_id,
                max_distance,
            };
            let response = pipeline.ask(&tenant, &request).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
                return Ok(());
            }

            println!("question: {}", response.question);
            if response.answer.is_empty() {
                println!("No answer found. Try rephrasing your question.");
            } else {
                println!("answer: {}", response.answer);
                for citation in &response.citations {
                    println!("  [p. {} · {}]", citation.page, citation.title);
                }
            }
            for (rank, hit) in response.results.iter().enumerate() {
                println!(
                    "#{} page={} distance={:.4} doc_id={} title={}",
                    rank + 1,
                    hit.page,
                    hit.distance,
                    hit.doc_id,
                    hit.title
                );
                println!("  {}", hit.snippet);
            }
        }
        Command::Docs => {
            let documents = pipeline.list_documents(&tenant).await?;
            if documents.is_empty() {
                println!("no documents indexed for {tenant}");
            }
            for document in documents {
                println!("{} chunks={}", document.doc_id, document.chunks);
            }
        }
        Command::Reset => {
            pipeline.reset().await?;
            println!("vector store cleared");
        }
        Command::Analyze { path } => analyze(&path, &ingestion)?,
        Command::Eval { cases, k } => {
            let raw = tokio::fs::read_to_string(&cases).await?;
            let cases: Vec<EvalCase> = serde_json::from_str(&raw)?;
            let report = pipeline.evaluate(&tenant, &cases, k).await?;

            println!("Hit@{}: {}/{} = {:.2}", report.k, report.hits, report.total, report.hit_rate);
            for detail in report.details {
                println!(
                    "- Q: {}\n  expected: {:?}  got: {:?}  hit@{}: {}",
                    detail.question, detail.expected_pages, detail.got_pages, report.k, detail.hit
                );
            }
        }
    }

    Ok(())
}

fn analyze(path: &Path, options: &IngestionOptions) -> anyhow::Result<()> {
    let pages = extract_page_texts(path)?;
    let report = analyze_pages(&pages, options);

    println!("PDF: {}", path.display());
    println!("Total pages: {}", report.pages_total);
    println!(
        "Pages with sufficient text (>= {} chars): {}",
        options.min_page_chars, report.pages_with_text
    );
    if report.flagged_pages.is_empty() {
        println!("Flagged pages (low text): None");
    } else {
        println!("Flagged pages (low text): {:?}", report.flagged_pages);
    }

    println!("Page | chars | words | snippet");
    for page in report.preview {
        println!("{:>4} | {:>5} | {:>5} | {}", page.page, page.chars, page.words, page.snippet);
    }
    Ok(())
}
