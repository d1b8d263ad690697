//! Literature source clients.

pub mod pubmed;

use async_trait::async_trait;

use crate::models::{DateWindow, PaperMetadata};

/// Common interface for literature search backends.
#[async_trait]
pub trait LiteratureSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Identifiers of papers matching `query`, optionally restricted to a
    /// publication date window.
    async fn search_ids(
        &self,
        query: &str,
        max_results: usize,
        window: Option<DateWindow>,
    ) -> anyhow::Result<Vec<String>>;

    /// Metadata for the given identifiers. Identifiers that cannot be
    /// resolved are omitted.
    async fn fetch_details(&self, ids: &[String]) -> anyhow::Result<Vec<PaperMetadata>>;

    /// Search and fetch in one call.
    async fn search(&self, query: &str, max_results: usize) -> anyhow::Result<Vec<PaperMetadata>> {
        let ids = self.search_ids(query, max_results, None).await?;
        self.fetch_details(&ids).await
    }
}
