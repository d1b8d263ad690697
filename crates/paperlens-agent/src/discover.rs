//! Scheduled discovery: find papers published since the last run, save the
//! list and remember them so the next run skips them.

use std::path::Path;

use chrono::Utc;
use paperlens_ingestion::sources::LiteratureSource;
use paperlens_ingestion::{discover_new_papers, PaperMetadata, ProcessedPapers};
use paperlens_storage::{write_json, OutputNames, StorageAdapter};
use tracing::info;

pub struct DiscoveryOutcome {
    pub papers: Vec<PaperMetadata>,
    /// Where `new_papers_*.json` was written, if anything was found.
    pub output: Option<String>,
    pub tracked_total: usize,
}

pub async fn run_discovery(
    source: &dyn LiteratureSource,
    tracking_file: &Path,
    storage: &dyn StorageAdapter,
    query: &str,
    max_results: usize,
    days_back: i64,
) -> anyhow::Result<DiscoveryOutcome> {
    let mut tracker = ProcessedPapers::load(tracking_file).await;
    info!(query, tracked = tracker.len(), days_back, "Searching for new papers");

    let papers = discover_new_papers(source, &tracker, query, max_results, days_back).await?;
    if papers.is_empty() {
        return Ok(DiscoveryOutcome { papers, output: None, tracked_total: tracker.len() });
    }

    let destination = OutputNames::new_papers(Utc::now().date_naive());
    let output = write_json(storage, &destination, &papers).await?;

    tracker.mark_processed(papers.iter().map(|p| p.pmid.clone()));
    tracker.save().await?;

    Ok(DiscoveryOutcome { papers, output: Some(output), tracked_total: tracker.len() })
}
