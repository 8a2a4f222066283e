//! # Nexus QA
//!
//! A retrieval-augmented question-answering pipeline over PDF documents.
//!
//! Nexus ingests PDFs (from local files or bucket notifications), splits
//! their text into boundary-aware overlapping chunks, embeds each chunk,
//! and stores the vectors in an OpenSearch-compatible kNN index. Questions
//! are answered by retrieving the nearest chunks and asking a chat model
//! to synthesize a grounded, cited answer.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────────────┐   ┌────────────┐
//! │   PDFs   │──▶│     Pipeline       │──▶│ OpenSearch │
//! │ S3/local │   │ Extract+Chunk+Embed│   │ kNN index  │
//! └──────────┘   └───────────────────┘   └─────┬──────┘
//!                                              │
//!                          ┌───────────────────┤
//!                          ▼                   ▼
//!                     ┌──────────┐       ┌──────────┐
//!                     │   CLI    │       │   HTTP   │
//!                     │ (nexus)  │       │  (axum)  │
//!                     └──────────┘       └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! nexus init                        # create the vector index
//! nexus ingest report.pdf           # ingest a local PDF
//! nexus ask "What were Q3 results?" # answer a question
//! nexus documents                   # list indexed documents
//! nexus serve                       # start the HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`extract`] | PDF text extraction |
//! | [`chunk`] | Boundary-aware text chunking |
//! | [`embedding`] | Embedding provider client |
//! | [`chat`] | Chat completion client |
//! | [`index`] | Vector index gateway |
//! | [`storage`] | Object storage (S3) access |
//! | [`sigv4`] | AWS request signing |
//! | [`ingest`] | Document ingestion pipeline |
//! | [`query`] | Retrieval and question answering |
//! | [`answer`] | Prompt building and citation parsing |
//! | [`catalog`] | Document catalog |
//! | [`server`] | HTTP API |

pub mod answer;
pub mod catalog;
pub mod chat;
pub mod chunk;
pub mod config;
pub mod embedding;
pub mod extract;
pub mod index;
pub mod ingest;
pub mod models;
pub mod query;
pub mod server;
pub mod sigv4;
pub mod storage;
