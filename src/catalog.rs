//! Document catalog.

use anyhow::Result;

use crate::index::VectorIndex;
use crate::models::DocumentSummary;

/// List every indexed document with its chunk and page counts, sorted by
/// filename. An index that does not exist yet is an empty catalog, not an
/// error: listing before the first ingestion is a normal state.
pub async fn list_documents(index: &dyn VectorIndex) -> Result<Vec<DocumentSummary>> {
    if !index.index_exists().await? {
        return Ok(Vec::new());
    }
    index.aggregate_documents().await
}
