//! Vector index gateway.
//!
//! Talks to an OpenSearch-compatible service over its REST API: idempotent
//! schema creation, document writes, kNN queries, and the filename
//! aggregation behind the catalog. Requests are SigV4-signed when AWS
//! credentials are present in the environment (serverless collections and
//! managed domains); unsigned otherwise (local OpenSearch, tests).
//!
//! Two HTTP clients are kept: a short-timeout one for the query path and a
//! generous one for the ingestion path, since bulk writes behind a slow
//! provider can take minutes.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Method;
use std::time::Duration;

use crate::config::IndexConfig;
use crate::models::{DocumentSummary, IndexedChunk, SearchResult};
use crate::sigv4::{hex_sha256, AwsCredentials, RequestSigner};

/// kNN search tuning applied at index creation.
const EF_SEARCH: u32 = 512;

/// Operations the pipelines need from the index service.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Create the index with its vector mapping if absent. No-op when it
    /// already exists.
    async fn ensure_index(&self) -> Result<()>;
    async fn index_exists(&self) -> Result<bool>;
    /// Write one chunk document. Chunks are immutable once written.
    async fn index_chunk(&self, chunk: &IndexedChunk) -> Result<()>;
    /// Top-k approximate nearest neighbors for a query vector, in the
    /// index's relevance order.
    async fn knn_search(&self, vector: &[f32], top_k: usize) -> Result<Vec<SearchResult>>;
    /// Group indexed chunks by filename with chunk counts and the maximum
    /// observed page number.
    async fn aggregate_documents(&self) -> Result<Vec<DocumentSummary>>;
    /// Remove every chunk belonging to a filename.
    async fn delete_document(&self, filename: &str) -> Result<u64>;
}

/// REST gateway to an OpenSearch index.
pub struct OpenSearchIndex {
    config: IndexConfig,
    creds: Option<AwsCredentials>,
    query_http: reqwest::Client,
    ingest_http: reqwest::Client,
}

impl OpenSearchIndex {
    pub fn new(config: IndexConfig) -> Result<Self> {
        let query_http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.query_timeout_secs))
            .build()?;
        let ingest_http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.ingest_timeout_secs))
            .build()?;

        Ok(Self {
            creds: AwsCredentials::from_env(),
            config,
            query_http,
            ingest_http,
        })
    }

    fn base_url(&self) -> &str {
        self.config.endpoint.trim_end_matches('/')
    }

    fn host(&self) -> &str {
        self.base_url()
            .trim_start_matches("https://")
            .trim_start_matches("http://")
    }

    /// Issue one request against the index, signing it when credentials
    /// are available. `ingest` selects the long-timeout client.
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
        ingest: bool,
    ) -> Result<reqwest::Response> {
        let payload = match body {
            Some(value) => serde_json::to_vec(value)?,
            None => Vec::new(),
        };

        let client = if ingest {
            &self.ingest_http
        } else {
            &self.query_http
        };

        let mut request = client
            .request(method.clone(), format!("{}{}", self.base_url(), path))
            .header("content-type", "application/json");

        if let Some(ref creds) = self.creds {
            let signer = RequestSigner::new(creds, &self.config.region, &self.config.service);
            let headers = signer.sign_headers(
                method.as_str(),
                self.host(),
                path,
                &[],
                &hex_sha256(&payload),
                Utc::now(),
            );
            for (name, value) in headers {
                request = request.header(name, value);
            }
        }

        if !payload.is_empty() {
            request = request.body(payload);
        }

        request
            .send()
            .await
            .with_context(|| format!("index request {} failed", path))
    }

    fn index_path(&self, suffix: &str) -> String {
        format!("/{}{}", self.config.name, suffix)
    }

    /// Index settings and mappings for the chunk schema.
    fn schema_body(&self) -> serde_json::Value {
        serde_json::json!({
            "settings": {
                "index": {
                    "knn": true,
                    "knn.algo_param.ef_search": EF_SEARCH,
                }
            },
            "mappings": {
                "properties": {
                    "vector": {
                        "type": "knn_vector",
                        "dimension": self.config.dims,
                        "method": {
                            "name": "hnsw",
                            "space_type": "cosinesimil",
                            "engine": "nmslib",
                        }
                    },
                    "text": {"type": "text"},
                    "filename": {"type": "keyword"},
                    "page": {"type": "integer"},
                    "chunk_id": {"type": "keyword"},
                }
            }
        })
    }
}

#[async_trait]
impl VectorIndex for OpenSearchIndex {
    async fn ensure_index(&self) -> Result<()> {
        if self.index_exists().await? {
            tracing::debug!(index = %self.config.name, "index already exists");
            return Ok(());
        }

        let resp = self
            .send(Method::PUT, &self.index_path(""), Some(&self.schema_body()), true)
            .await?;
        let status = resp.status();

        if status.is_success() {
            tracing::info!(
                index = %self.config.name,
                dims = self.config.dims,
                "created index"
            );
            return Ok(());
        }

        // Lost a creation race: another writer got there first.
        let body = resp.text().await.unwrap_or_default();
        if status.as_u16() == 400 && body.contains("resource_already_exists_exception") {
            return Ok(());
        }
        bail!("index creation failed ({}): {}", status, body);
    }

    async fn index_exists(&self) -> Result<bool> {
        let resp = self.send(Method::HEAD, &self.index_path(""), None, false).await?;
        match resp.status().as_u16() {
            200 => Ok(true),
            404 => Ok(false),
            other => bail!("unexpected status {} checking index existence", other),
        }
    }

    async fn index_chunk(&self, chunk: &IndexedChunk) -> Result<()> {
        let doc = serde_json::json!({
            "vector": chunk.vector,
            "text": chunk.chunk.text,
            "filename": chunk.chunk.filename,
            "page": chunk.chunk.page,
            "chunk_id": chunk.chunk.chunk_id,
        });

        let resp = self
            .send(Method::POST, &self.index_path("/_doc"), Some(&doc), true)
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("index write rejected ({}): {}", status, body);
        }
        Ok(())
    }

    async fn knn_search(&self, vector: &[f32], top_k: usize) -> Result<Vec<SearchResult>> {
        let body = serde_json::json!({
            "size": top_k,
            "query": {
                "knn": {
                    "vector": {
                        "vector": vector,
                        "k": top_k,
                    }
                }
            },
            "_source": ["text", "filename", "page", "chunk_id"],
        });

        let resp = self
            .send(Method::POST, &self.index_path("/_search"), Some(&body), false)
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("search failed ({}): {}", status, body);
        }

        let json: serde_json::Value = resp.json().await?;
        parse_search_hits(&json)
    }

    async fn aggregate_documents(&self) -> Result<Vec<DocumentSummary>> {
        let body = serde_json::json!({
            "size": 0,
            "aggs": {
                "documents": {
                    "terms": {"field": "filename", "size": 1000},
                    "aggs": {
                        "pages": {"stats": {"field": "page"}}
                    }
                }
            }
        });

        let resp = self
            .send(Method::POST, &self.index_path("/_search"), Some(&body), false)
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("document aggregation failed ({}): {}", status, body);
        }

        let json: serde_json::Value = resp.json().await?;
        Ok(parse_document_aggregation(&json))
    }

    async fn delete_document(&self, filename: &str) -> Result<u64> {
        let body = serde_json::json!({
            "query": {"term": {"filename": filename}}
        });

        let resp = self
            .send(
                Method::POST,
                &self.index_path("/_delete_by_query"),
                Some(&body),
                true,
            )
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("delete-by-filename failed ({}): {}", status, body);
        }

        let json: serde_json::Value = resp.json().await?;
        Ok(json.get("deleted").and_then(|d| d.as_u64()).unwrap_or(0))
    }
}

/// Parse `hits.hits[]` from a kNN search response, preserving index order.
pub fn parse_search_hits(json: &serde_json::Value) -> Result<Vec<SearchResult>> {
    let hits = json
        .pointer("/hits/hits")
        .and_then(|h| h.as_array())
        .context("malformed search response: missing hits.hits")?;

    let mut results = Vec::with_capacity(hits.len());
    for hit in hits {
        let source = hit
            .get("_source")
            .context("malformed search hit: missing _source")?;
        results.push(SearchResult {
            text: source
                .get("text")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            filename: source
                .get("filename")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            page: source.get("page").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
            score: hit.get("_score").and_then(|v| v.as_f64()).unwrap_or(0.0),
            chunk_id: source
                .get("chunk_id")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
        });
    }
    Ok(results)
}

/// Parse the filename terms aggregation into catalog rows, sorted by
/// filename ascending.
pub fn parse_document_aggregation(json: &serde_json::Value) -> Vec<DocumentSummary> {
    let buckets = json
        .pointer("/aggregations/documents/buckets")
        .and_then(|b| b.as_array())
        .cloned()
        .unwrap_or_default();

    let mut documents: Vec<DocumentSummary> = buckets
        .iter()
        .filter_map(|bucket| {
            let filename = bucket.get("key")?.as_str()?.to_string();
            let chunk_count = bucket.get("doc_count")?.as_u64()?;
            let page_count = bucket
                .pointer("/pages/max")
                .and_then(|m| m.as_f64())
                .unwrap_or(0.0) as u32;
            Some(DocumentSummary {
                filename,
                chunk_count,
                page_count,
            })
        })
        .collect();

    documents.sort_by(|a, b| a.filename.cmp(&b.filename));
    documents
}
