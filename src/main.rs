//! # Nexus QA CLI (`nexus`)
//!
//! The `nexus` binary drives the document question-answering pipeline:
//! index initialization, PDF ingestion (local files or bucket
//! notification payloads), question answering, the document catalog, and
//! the HTTP API server.
//!
//! ## Usage
//!
//! ```bash
//! nexus --config ./config/nexus.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `nexus init` | Create the vector index with its kNN schema |
//! | `nexus ingest <file>...` | Extract, chunk, embed, and index local PDFs |
//! | `nexus ingest-event <file>` | Process a bucket notification payload (JSON) |
//! | `nexus ask "<question>"` | Answer a question over the indexed documents |
//! | `nexus documents` | List indexed documents |
//! | `nexus serve` | Start the HTTP API server |

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use nexus_qa::chat::OpenAiChat;
use nexus_qa::config::{self, Config};
use nexus_qa::embedding::OpenAiEmbedder;
use nexus_qa::index::{OpenSearchIndex, VectorIndex};
use nexus_qa::ingest::{IngestPipeline, StorageEvent};
use nexus_qa::query::QueryEngine;
use nexus_qa::server::{self, AppState};
use nexus_qa::storage::{ObjectStore, S3Store};
use nexus_qa::catalog;

/// Nexus QA — retrieval-augmented question answering over PDF documents.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/nexus.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "nexus",
    about = "Nexus QA — retrieval-augmented question answering over PDF documents",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/nexus.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Create the vector index with its kNN schema.
    ///
    /// Idempotent — running it against an existing index is safe.
    Init,

    /// Ingest one or more local PDF files.
    ///
    /// Each file is extracted page by page, chunked, embedded, and written
    /// to the vector index under its filename. Re-ingesting a filename
    /// replaces its previous chunks.
    Ingest {
        /// Paths to PDF files.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Process a bucket notification payload from a JSON file.
    ///
    /// Each record's object is fetched from storage and ingested. Requires
    /// the `[storage]` section to be configured.
    IngestEvent {
        /// Path to the notification JSON.
        file: PathBuf,
    },

    /// Answer a question over the indexed documents.
    Ask {
        /// The question to answer.
        question: String,

        /// Override the number of chunks retrieved for context.
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// List indexed documents with chunk and page counts.
    Documents,

    /// Start the HTTP API server.
    ///
    /// Binds to the address configured in `[server].bind` and serves
    /// `POST /query`, `GET /documents`, and `GET /health`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nexus_qa=info,nexus=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let index = OpenSearchIndex::new(cfg.index.clone())?;
            index.ensure_index().await?;
            println!("Index '{}' is ready.", cfg.index.name);
        }
        Commands::Ingest { files } => {
            run_ingest(&cfg, &files).await?;
        }
        Commands::IngestEvent { file } => {
            run_ingest_event(&cfg, &file).await?;
        }
        Commands::Ask { question, top_k } => {
            run_ask(&cfg, &question, top_k).await?;
        }
        Commands::Documents => {
            let index = OpenSearchIndex::new(cfg.index.clone())?;
            let documents = catalog::list_documents(&index).await?;
            if documents.is_empty() {
                println!("No documents indexed yet.");
            } else {
                for doc in &documents {
                    println!(
                        "{}  ({} chunks, {} pages)",
                        doc.filename, doc.chunk_count, doc.page_count
                    );
                }
                println!("{} document(s).", documents.len());
            }
        }
        Commands::Serve => {
            let state = build_state(&cfg)?;
            server::serve(&cfg.server.bind, state).await?;
        }
    }

    Ok(())
}

async fn run_ingest(cfg: &Config, files: &[PathBuf]) -> anyhow::Result<()> {
    let index = OpenSearchIndex::new(cfg.index.clone())?;
    let embedder = OpenAiEmbedder::new(cfg.embedding.clone(), cfg.index.dims);
    let pipeline = IngestPipeline::new(&index, &embedder, cfg.chunking.clone());

    for path in files {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| anyhow::anyhow!("not a file path: {}", path.display()))?;
        let bytes = std::fs::read(path)?;
        let report = pipeline.ingest_document(&filename, &bytes).await?;
        println!(
            "{}: indexed {} chunk(s), {} failed.",
            filename, report.indexed, report.failed
        );
    }
    Ok(())
}

async fn run_ingest_event(cfg: &Config, file: &PathBuf) -> anyhow::Result<()> {
    let storage_cfg = cfg
        .storage
        .clone()
        .ok_or_else(|| anyhow::anyhow!("[storage] must be configured for event ingestion"))?;
    let store = S3Store::new(storage_cfg)?;

    let index = OpenSearchIndex::new(cfg.index.clone())?;
    let embedder = OpenAiEmbedder::new(cfg.embedding.clone(), cfg.index.dims);
    let pipeline = IngestPipeline::new(&index, &embedder, cfg.chunking.clone());

    let payload = std::fs::read_to_string(file)?;
    let event: StorageEvent = serde_json::from_str(&payload)?;
    let report = pipeline.ingest_event(&event, &store).await?;
    println!(
        "Event processed: indexed {} chunk(s), {} failed.",
        report.indexed, report.failed
    );
    Ok(())
}

async fn run_ask(cfg: &Config, question: &str, top_k: Option<usize>) -> anyhow::Result<()> {
    if question.trim().is_empty() {
        anyhow::bail!("question must not be empty");
    }

    let mut cfg = cfg.clone();
    if let Some(k) = top_k {
        cfg.retrieval.top_k = k;
    }

    let engine = build_engine(&cfg)?;
    let answer = engine.ask(question.trim()).await?;

    println!("{}\n", answer.answer);
    if !answer.sources.is_empty() {
        println!("Sources:");
        for source in &answer.sources {
            match &source.url {
                Some(url) => println!("  - {}, page {} ({})", source.filename, source.page, url),
                None => println!("  - {}, page {}", source.filename, source.page),
            }
        }
    }
    Ok(())
}

fn build_engine(cfg: &Config) -> anyhow::Result<QueryEngine> {
    let embedder = Arc::new(OpenAiEmbedder::new(cfg.embedding.clone(), cfg.index.dims));
    let index = Arc::new(OpenSearchIndex::new(cfg.index.clone())?);
    let chat = Arc::new(OpenAiChat::new(cfg.chat.clone()));
    let store: Option<Arc<dyn ObjectStore>> = match cfg.storage.clone() {
        Some(storage_cfg) => Some(Arc::new(S3Store::new(storage_cfg)?)),
        None => None,
    };

    Ok(QueryEngine::new(
        embedder,
        index,
        chat,
        store,
        cfg.retrieval.clone(),
    ))
}

fn build_state(cfg: &Config) -> anyhow::Result<AppState> {
    let engine = build_engine(cfg)?;
    let index: Arc<dyn VectorIndex> = Arc::new(OpenSearchIndex::new(cfg.index.clone())?);
    Ok(AppState { engine, index })
}
