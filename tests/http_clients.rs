//! Wire-level tests for the provider and index clients against a local
//! mock server, wired in through the `base_url` / `endpoint` overrides.
//! No AWS credentials in the test environment means index requests go
//! unsigned, which is exactly what the mock expects.

use httpmock::prelude::*;
use serde_json::json;

use nexus_qa::config::{EmbeddingConfig, IndexConfig};
use nexus_qa::embedding::{EmbedError, Embedder, OpenAiEmbedder};
use nexus_qa::index::{OpenSearchIndex, VectorIndex};
use nexus_qa::models::{Chunk, IndexedChunk};

fn embedder(base_url: &str, dims: usize, max_retries: u32) -> OpenAiEmbedder {
    std::env::set_var("OPENAI_API_KEY", "test-key");
    OpenAiEmbedder::new(
        EmbeddingConfig {
            model: "text-embedding-3-small".to_string(),
            max_input_chars: 30_000,
            max_retries,
            timeout_secs: 5,
            base_url: Some(base_url.to_string()),
        },
        dims,
    )
}

fn index_config(endpoint: &str) -> IndexConfig {
    IndexConfig {
        endpoint: endpoint.to_string(),
        name: "nexus".to_string(),
        dims: 4,
        region: "us-east-1".to_string(),
        service: "aoss".to_string(),
        query_timeout_secs: 5,
        ingest_timeout_secs: 5,
    }
}

#[tokio::test]
async fn embedder_posts_and_parses_a_vector() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/embeddings")
                .header("authorization", "Bearer test-key")
                .json_body_partial(r#"{"model": "text-embedding-3-small"}"#);
            then.status(200)
                .json_body(json!({"data": [{"embedding": [0.1, 0.2, 0.3, 0.4]}]}));
        })
        .await;

    let embedder = embedder(&server.base_url(), 4, 0);
    let vector = embedder.embed("hello world").await.unwrap();
    assert_eq!(vector.len(), 4);
    assert!((vector[0] - 0.1).abs() < 1e-6);
    mock.assert_async().await;
}

#[tokio::test]
async fn embedder_retries_on_rate_limit_then_gives_up() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/embeddings");
            then.status(429).body("slow down");
        })
        .await;

    let embedder = embedder(&server.base_url(), 4, 1);
    let err = embedder.embed("hello").await.unwrap_err();
    assert!(matches!(err, EmbedError::Provider(_)));
    // Initial attempt plus one retry.
    mock.assert_hits_async(2).await;
}

#[tokio::test]
async fn embedder_does_not_retry_client_errors() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/embeddings");
            then.status(400).body("bad request");
        })
        .await;

    let embedder = embedder(&server.base_url(), 4, 3);
    let err = embedder.embed("hello").await.unwrap_err();
    assert!(matches!(err, EmbedError::Provider(_)));
    mock.assert_hits_async(1).await;
}

#[tokio::test]
async fn embedder_rejects_wrong_dimensionality() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/embeddings");
            then.status(200)
                .json_body(json!({"data": [{"embedding": [0.1, 0.2]}]}));
        })
        .await;

    let embedder = embedder(&server.base_url(), 4, 0);
    let err = embedder.embed("hello").await.unwrap_err();
    assert!(matches!(err, EmbedError::InvalidResponse(_)));
}

#[tokio::test]
async fn ensure_index_creates_schema_when_absent() {
    let server = MockServer::start_async().await;
    let head = server
        .mock_async(|when, then| {
            when.method(httpmock::Method::HEAD).path("/nexus");
            then.status(404);
        })
        .await;
    let put = server
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/nexus")
                .json_body_partial(r#"{"settings": {"index": {"knn": true}}}"#);
            then.status(200).json_body(json!({"acknowledged": true}));
        })
        .await;

    let index = OpenSearchIndex::new(index_config(&server.base_url())).unwrap();
    index.ensure_index().await.unwrap();
    head.assert_async().await;
    put.assert_async().await;
}

#[tokio::test]
async fn ensure_index_skips_creation_when_present() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(httpmock::Method::HEAD).path("/nexus");
            then.status(200);
        })
        .await;
    let put = server
        .mock_async(|when, then| {
            when.method(PUT).path("/nexus");
            then.status(200);
        })
        .await;

    let index = OpenSearchIndex::new(index_config(&server.base_url())).unwrap();
    index.ensure_index().await.unwrap();
    put.assert_hits_async(0).await;
}

#[tokio::test]
async fn index_chunk_writes_the_document_fields() {
    let server = MockServer::start_async().await;
    let doc = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/nexus/_doc")
                .json_body_partial(r#"{"filename": "report.pdf", "page": 3, "chunk_id": "report.pdf_p3_c0"}"#);
            then.status(201).json_body(json!({"result": "created"}));
        })
        .await;

    let index = OpenSearchIndex::new(index_config(&server.base_url())).unwrap();
    let chunk = IndexedChunk {
        chunk: Chunk::new("report.pdf", 3, 0, "some chunk text".to_string()),
        vector: vec![0.1, 0.2, 0.3, 0.4],
    };
    index.index_chunk(&chunk).await.unwrap();
    doc.assert_async().await;
}

#[tokio::test]
async fn knn_search_parses_results() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/nexus/_search");
            then.status(200).json_body(json!({
                "hits": {
                    "hits": [{
                        "_score": 0.87,
                        "_source": {
                            "text": "chunk text",
                            "filename": "report.pdf",
                            "page": 2,
                            "chunk_id": "report.pdf_p2_c1"
                        }
                    }]
                }
            }));
        })
        .await;

    let index = OpenSearchIndex::new(index_config(&server.base_url())).unwrap();
    let results = index.knn_search(&[0.1, 0.2, 0.3, 0.4], 10).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].filename, "report.pdf");
    assert!((results[0].score - 0.87).abs() < 1e-9);
}

#[tokio::test]
async fn delete_document_reports_deleted_count() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/nexus/_delete_by_query")
                .json_body(json!({"query": {"term": {"filename": "report.pdf"}}}));
            then.status(200).json_body(json!({"deleted": 7}));
        })
        .await;

    let index = OpenSearchIndex::new(index_config(&server.base_url())).unwrap();
    assert_eq!(index.delete_document("report.pdf").await.unwrap(), 7);
}
