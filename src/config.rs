use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub index: IndexConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub storage: Option<StorageConfig>,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// Base URL of the vector search service, e.g. `https://xyz.us-east-1.aoss.amazonaws.com`.
    pub endpoint: String,
    #[serde(default = "default_index_name")]
    pub name: String,
    /// Embedding vector dimensionality; the index schema is created with it
    /// and every embedding response is validated against it.
    #[serde(default = "default_dims")]
    pub dims: usize,
    /// AWS region used when signing index requests.
    #[serde(default = "default_region")]
    pub region: String,
    /// SigV4 service name (`aoss` for serverless collections, `es` for
    /// managed domains). Requests go unsigned when no AWS credentials are
    /// present in the environment.
    #[serde(default = "default_index_service")]
    pub service: String,
    /// Timeout for query-path operations (search, aggregation).
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,
    /// Timeout for ingestion-path operations (schema creation, writes).
    #[serde(default = "default_ingest_timeout_secs")]
    pub ingest_timeout_secs: u64,
}

fn default_index_name() -> String {
    "nexus".to_string()
}
fn default_dims() -> usize {
    1536
}
fn default_region() -> String {
    "us-east-1".to_string()
}
fn default_index_service() -> String {
    "aoss".to_string()
}
fn default_query_timeout_secs() -> u64 {
    30
}
fn default_ingest_timeout_secs() -> u64 {
    300
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// Provider input ceiling in characters; longer text is truncated
    /// before the call rather than rejected.
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_embed_timeout_secs")]
    pub timeout_secs: u64,
    /// Override of the provider base URL (local gateways, tests).
    #[serde(default)]
    pub base_url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            max_input_chars: default_max_input_chars(),
            max_retries: default_max_retries(),
            timeout_secs: default_embed_timeout_secs(),
            base_url: None,
        }
    }
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_max_input_chars() -> usize {
    30_000
}
fn default_max_retries() -> u32 {
    5
}
fn default_embed_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    #[serde(default = "default_chat_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_chat_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub base_url: Option<String>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: default_chat_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_chat_timeout_secs(),
            base_url: None,
        }
    }
}

fn default_chat_model() -> String {
    "gpt-4o".to_string()
}
fn default_temperature() -> f64 {
    0.3
}
fn default_max_tokens() -> u32 {
    2000
}
fn default_chat_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_overlap() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// How many top results back citations when the model provides none.
    #[serde(default = "default_fallback_citations")]
    pub fallback_citations: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            fallback_citations: default_fallback_citations(),
        }
    }
}

fn default_top_k() -> usize {
    10
}
fn default_fallback_citations() -> usize {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Bucket holding the source PDFs (and target of presigned links).
    pub bucket: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint for S3-compatible services (MinIO, LocalStack).
    #[serde(default)]
    pub endpoint_url: Option<String>,
    /// Lifetime of generated access links, in seconds.
    #[serde(default = "default_presign_expiry_secs")]
    pub presign_expiry_secs: u64,
}

fn default_presign_expiry_secs() -> u64 {
    3600
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.index.endpoint.trim().is_empty() {
        anyhow::bail!("index.endpoint must not be empty");
    }
    if config.index.dims == 0 {
        anyhow::bail!("index.dims must be > 0");
    }
    match config.index.service.as_str() {
        "aoss" | "es" => {}
        other => anyhow::bail!(
            "Unknown index.service: '{}'. Must be 'aoss' or 'es'.",
            other
        ),
    }

    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.overlap >= config.chunking.chunk_size {
        anyhow::bail!("chunking.overlap must be smaller than chunking.chunk_size");
    }

    if config.retrieval.top_k == 0 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }

    Ok(config)
}
