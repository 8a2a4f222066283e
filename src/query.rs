//! Query pipeline: embed the question, retrieve nearest chunks, and
//! synthesize a cited answer.

use anyhow::Result;
use std::sync::Arc;

use crate::answer;
use crate::config::RetrievalConfig;
use crate::chat::ChatModel;
use crate::embedding::Embedder;
use crate::index::VectorIndex;
use crate::models::{Answer, SearchResult};
use crate::storage::ObjectStore;

pub const NO_RESULTS_ANSWER: &str =
    "I couldn't find any relevant information in the documents to answer your question.";

/// Shared handle answering questions over the index. Cheap to clone across
/// server workers.
#[derive(Clone)]
pub struct QueryEngine {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    chat: Arc<dyn ChatModel>,
    store: Option<Arc<dyn ObjectStore>>,
    retrieval: RetrievalConfig,
}

impl QueryEngine {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        chat: Arc<dyn ChatModel>,
        store: Option<Arc<dyn ObjectStore>>,
        retrieval: RetrievalConfig,
    ) -> Self {
        Self {
            embedder,
            index,
            chat,
            store,
            retrieval,
        }
    }

    /// Nearest chunks for a free-text query, most relevant first.
    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>> {
        let vector = self.embedder.embed(query).await?;
        self.index.knn_search(&vector, top_k).await
    }

    /// Full question-answering pass. Fails only when retrieval itself
    /// fails; answer-generation trouble degrades to an apology so the
    /// caller still gets a response out of the successful retrieval.
    pub async fn ask(&self, question: &str) -> Result<Answer> {
        let results = self.search(question, self.retrieval.top_k).await?;
        tracing::info!(question, hits = results.len(), "retrieved chunks");

        if results.is_empty() {
            return Ok(Answer {
                question: question.to_string(),
                answer: NO_RESULTS_ANSWER.to_string(),
                sources: Vec::new(),
            });
        }

        let (text, mut sources) =
            match answer::synthesize(self.chat.as_ref(), question, &results).await {
                Ok((text, sources)) if sources.is_empty() => (
                    text,
                    answer::fallback_citations(&results, self.retrieval.fallback_citations),
                ),
                Ok(parsed) => parsed,
                Err(e) => {
                    tracing::error!(error = %e, "answer generation failed");
                    (
                        format!("Sorry, I encountered an error generating the answer: {}", e),
                        Vec::new(),
                    )
                }
            };

        self.attach_links(&mut sources);

        Ok(Answer {
            question: question.to_string(),
            answer: text,
            sources,
        })
    }

    /// Decorate citations with presigned links. Link failure leaves the
    /// citation bare, it never fails the answer.
    fn attach_links(&self, sources: &mut [crate::models::Citation]) {
        let Some(ref store) = self.store else {
            return;
        };
        for citation in sources.iter_mut() {
            match store.presign_get(&citation.filename) {
                Ok(url) => citation.url = Some(url),
                Err(e) => {
                    tracing::warn!(filename = %citation.filename, error = %e, "presign failed");
                }
            }
        }
    }
}
