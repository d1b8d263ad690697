//! Batch orchestration: PDFs → summaries → aggregated knowledge base.
//!
//! Papers run through extract → chunk → summarise in a bounded pool. One
//! paper failing never stops the batch; its summary carries the failure
//! status instead. Results are sorted by filename before anything is
//! written, so reruns over the same directory produce the same files.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use futures::stream::{self, StreamExt};
use indicatif::ProgressBar;
use paperlens_common::{PaperStatus, PaperSummary, PaperSummaryRow, PaperlensError, PerPaperExtraction};
use paperlens_ingestion::{chunk_text, estimate_tokens, extract_text, ExtractedText};
use paperlens_kg::{
    aggregate, score, to_high_confidence_subset, to_table, AggregatedKnowledgeBase, AssociationRow, KbDocument,
};
use paperlens_llm::PaperSummariser;
use paperlens_storage::{write_csv, write_json, write_text, OutputNames, StorageAdapter};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

// ── Report ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize)]
pub struct FailedPaper {
    pub filename: String,
    pub status: PaperStatus,
    pub error: String,
}

/// Outcome of one `process` or `aggregate` run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub total_papers: usize,
    pub successful: usize,
    pub failed: Vec<FailedPaper>,
    pub unique_biomarkers: usize,
    pub associations: usize,
    pub high_confidence: usize,
    pub mentions_skipped: usize,
    pub papers_malformed: usize,
    /// Where each output file was written.
    pub outputs: Vec<String>,
}

impl std::fmt::Display for BatchReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Papers:            {}", self.total_papers)?;
        writeln!(f, "  successful:      {}", self.successful)?;
        writeln!(f, "  failed:          {}", self.failed.len())?;
        for failed in &self.failed {
            writeln!(f, "    {} [{}] {}", failed.filename, failed.status.as_str(), failed.error)?;
        }
        writeln!(f, "Biomarkers:        {}", self.unique_biomarkers)?;
        writeln!(f, "Associations:      {}", self.associations)?;
        writeln!(f, "  high-confidence: {}", self.high_confidence)?;
        if self.mentions_skipped > 0 || self.papers_malformed > 0 {
            writeln!(
                f,
                "Skipped:           {} mention(s), {} malformed paper(s)",
                self.mentions_skipped, self.papers_malformed
            )?;
        }
        for output in &self.outputs {
            writeln!(f, "  → {output}")?;
        }
        Ok(())
    }
}

// ── Input discovery ───────────────────────────────────────────────────────────

/// `*.pdf` files directly under `dir`, sorted by path.
pub fn list_pdfs(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Cannot read papers directory {}", dir.display()))?;

    let mut pdfs = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let is_pdf = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));
        if is_pdf && path.is_file() {
            pdfs.push(path);
        }
    }
    pdfs.sort();
    Ok(pdfs)
}

// ── Pipeline ──────────────────────────────────────────────────────────────────

pub struct Pipeline {
    summariser: Arc<PaperSummariser>,
    storage: Arc<dyn StorageAdapter>,
    names: OutputNames,
    max_chars: usize,
    workers: usize,
    top_n: usize,
}

impl Pipeline {
    pub fn new(
        summariser: Arc<PaperSummariser>,
        storage: Arc<dyn StorageAdapter>,
        max_chars: usize,
        workers: usize,
        top_n: usize,
    ) -> Self {
        let names = OutputNames::new(summariser.backend().provider().as_str());
        Self { summariser, storage, names, max_chars, workers: workers.max(1), top_n }
    }

    /// Process every PDF, write all outputs and report. The scored knowledge
    /// base is returned alongside the report for digests.
    pub async fn run(
        &self,
        pdfs: &[PathBuf],
        progress: Option<ProgressBar>,
    ) -> anyhow::Result<(BatchReport, AggregatedKnowledgeBase)> {
        info!(papers = pdfs.len(), workers = self.workers, storage = %self.storage.describe(), "Processing batch");

        let progress = progress.as_ref();
        let mut summaries: Vec<PaperSummary> = stream::iter(pdfs)
            .map(|path| async move {
                let summary = self.process_paper(path).await;
                if let Some(bar) = progress {
                    bar.set_message(format!("{} [{}]", summary.filename, summary.status.as_str()));
                    bar.inc(1);
                }
                summary
            })
            .buffer_unordered(self.workers)
            .collect()
            .await;

        if let Some(bar) = progress {
            bar.finish_with_message("done");
        }

        summaries.sort_by(|a, b| a.filename.cmp(&b.filename));

        let mut outputs = write_summaries(self.storage.as_ref(), &self.names, &summaries).await?;
        let extractions: Vec<PerPaperExtraction> = summaries
            .iter()
            .filter(|s| s.is_success())
            .map(PaperSummary::to_extraction)
            .collect();
        let (kb, kb_outputs) = export_knowledge_base(self.storage.as_ref(), &self.names, &extractions, self.top_n).await?;
        outputs.extend(kb_outputs);

        let report = build_report(&summaries, &kb, outputs);
        Ok((report, kb))
    }

    /// Extract, chunk and summarise one paper. Always yields a summary.
    #[instrument(skip(self, path), fields(path = %path.display()))]
    pub async fn process_paper(&self, path: &Path) -> PaperSummary {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let extracted = match extract(path).await {
            Ok(e) => e,
            Err(e) => {
                warn!(filename = %filename, error = %e, "Text extraction failed");
                let status = match e {
                    PaperlensError::Extraction(_) => PaperStatus::ExtractionFailed,
                    _                              => PaperStatus::ProcessingError,
                };
                return PaperSummary::failed(filename, status, e.to_string());
            }
        };

        if extracted.is_empty() {
            warn!(filename = %filename, pages = extracted.num_pages, "No text extracted");
            let mut s = PaperSummary::failed(filename, PaperStatus::ExtractionFailed, "no text could be extracted");
            s.num_pages = Some(extracted.num_pages);
            return s;
        }

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| filename.clone());
        if let Err(e) = write_text(self.storage.as_ref(), &OutputNames::extracted_text(&stem), &extracted.text).await {
            warn!(filename = %filename, error = %e, "Could not save extracted text");
        }

        let chunks = chunk_text(&extracted.text, self.max_chars);
        debug!(filename = %filename, chunks = chunks.len(), est_tokens = estimate_tokens(&extracted.text), "Text chunked");

        let mut summary = self.summariser.summarise(&filename, &chunks).await;
        summary.num_pages = Some(extracted.num_pages);
        summary.text_length = Some(extracted.text.chars().count());
        if summary.is_success() && summary.title.is_none() {
            summary.title = extracted.metadata.title;
        }

        info!(filename = %filename, status = summary.status.as_str(), biomarkers = summary.biomarkers.len(), "Paper processed");
        summary
    }
}

async fn extract(path: &Path) -> paperlens_common::Result<ExtractedText> {
    let owned = path.to_path_buf();
    tokio::task::spawn_blocking(move || extract_text(&owned))
        .await
        .map_err(|e| PaperlensError::Pipeline(format!("extraction task failed: {e}")))?
        .map_err(|e| PaperlensError::Extraction(format!("{e:#}")))
}

// ── Exports ───────────────────────────────────────────────────────────────────

/// `paper_summaries_*.json` and `paper_summaries_*.csv`.
pub async fn write_summaries(
    storage: &dyn StorageAdapter,
    names: &OutputNames,
    summaries: &[PaperSummary],
) -> anyhow::Result<Vec<String>> {
    let rows: Vec<_> = summaries.iter().map(PaperSummary::to_row).collect();
    Ok(vec![
        write_json(storage, &names.paper_summaries_json(), summaries).await?,
        write_csv(storage, &names.paper_summaries_csv(), PaperSummaryRow::HEADERS, &rows).await?,
    ])
}

/// Aggregate, score and write the knowledge base, its flat table and the
/// high-confidence subset.
pub async fn export_knowledge_base(
    storage: &dyn StorageAdapter,
    names: &OutputNames,
    extractions: &[PerPaperExtraction],
    top_n: usize,
) -> anyhow::Result<(AggregatedKnowledgeBase, Vec<String>)> {
    let kb = score(aggregate(extractions));
    let high_confidence = to_high_confidence_subset(&kb);

    let outputs = vec![
        write_json(storage, &names.aggregated_json(), &KbDocument::new(&kb, top_n)).await?,
        write_csv(storage, &names.aggregated_csv(), AssociationRow::HEADERS, &to_table(&kb)).await?,
        write_json(storage, &names.high_confidence_json(), &high_confidence.records).await?,
    ];

    info!(
        biomarkers = kb.records.len(),
        associations = kb.association_count(),
        high_confidence = high_confidence.association_count(),
        "Knowledge base exported"
    );
    Ok((kb, outputs))
}

/// Re-run aggregation from an existing summaries file.
///
/// Accepts either `paper_summaries_*.json` (only `success` entries
/// contribute) or a list of `{paper_id, biomarker_mentions}` extractions.
/// Entries that fit neither shape count as malformed zero-mention papers.
pub async fn aggregate_from_file(
    input: &Path,
    storage: &dyn StorageAdapter,
    names: &OutputNames,
    top_n: usize,
) -> anyhow::Result<BatchReport> {
    let raw = tokio::fs::read_to_string(input)
        .await
        .with_context(|| format!("Cannot read {}", input.display()))?;
    let entries: Vec<serde_json::Value> = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a JSON array", input.display()))?;

    let (summaries, extractions) = parse_entries(entries);
    let (kb, outputs) = export_knowledge_base(storage, names, &extractions, top_n).await?;

    // Every usable entry became one extraction; failed summaries did not.
    let mut report = build_report(&summaries, &kb, outputs);
    report.total_papers = extractions.len() + report.failed.len();
    report.successful = extractions.len() - kb.stats.papers_malformed;
    Ok(report)
}

fn parse_entries(entries: Vec<serde_json::Value>) -> (Vec<PaperSummary>, Vec<PerPaperExtraction>) {
    let mut summaries = Vec::new();
    let mut extractions = Vec::new();

    for (index, entry) in entries.into_iter().enumerate() {
        if entry.get("biomarker_mentions").is_some() {
            match serde_json::from_value::<PerPaperExtraction>(entry) {
                Ok(e) => extractions.push(e),
                Err(e) => {
                    warn!(index, error = %e, "Malformed extraction entry");
                    extractions.push(PerPaperExtraction::default());
                }
            }
            continue;
        }
        match serde_json::from_value::<PaperSummary>(entry) {
            Ok(s) if s.filename.is_empty() => {
                warn!(index, "Summary entry without filename");
                extractions.push(PerPaperExtraction::default());
            }
            Ok(s) => {
                if s.is_success() {
                    extractions.push(s.to_extraction());
                }
                summaries.push(s);
            }
            Err(e) => {
                warn!(index, error = %e, "Malformed summary entry");
                extractions.push(PerPaperExtraction::default());
            }
        }
    }
    (summaries, extractions)
}

fn build_report(summaries: &[PaperSummary], kb: &AggregatedKnowledgeBase, outputs: Vec<String>) -> BatchReport {
    let failed: Vec<FailedPaper> = summaries
        .iter()
        .filter(|s| !s.is_success())
        .map(|s| FailedPaper {
            filename: s.filename.clone(),
            status: s.status,
            error: s.error.clone().unwrap_or_default(),
        })
        .collect();

    BatchReport {
        total_papers: summaries.len(),
        successful: summaries.len() - failed.len(),
        failed,
        unique_biomarkers: kb.records.len(),
        associations: kb.association_count(),
        high_confidence: to_high_confidence_subset(kb).association_count(),
        mentions_skipped: kb.stats.mentions_skipped,
        papers_malformed: kb.stats.papers_malformed,
        outputs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paperlens_test_utils::mention;

    #[test]
    fn test_list_pdfs_is_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.pdf", "a.PDF", "notes.txt", "c.pdf"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.pdf")).unwrap();

        let names: Vec<String> = list_pdfs(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.PDF", "b.pdf", "c.pdf"]);
    }

    #[test]
    fn test_list_pdfs_missing_dir_is_error() {
        assert!(list_pdfs(Path::new("/definitely/not/here")).is_err());
    }

    #[test]
    fn test_parse_entries_handles_both_shapes() {
        let entries = vec![
            serde_json::json!({
                "filename": "a.pdf",
                "status": "success",
                "biomarkers": [{"name": "BRCA1", "diseases": ["breast cancer", "ovarian cancer"]}]
            }),
            serde_json::json!({"filename": "b.pdf", "status": "api_error", "error": "429"}),
            serde_json::json!({
                "paper_id": "PMID:1",
                "biomarker_mentions": [mention("KRAS", "lung cancer", "")]
            }),
            serde_json::json!({"biomarker_mentions": "not a list"}),
            serde_json::json!({"status": "success"}),
            serde_json::json!(42),
        ];

        let (summaries, extractions) = parse_entries(entries);
        assert_eq!(summaries.len(), 2);
        assert_eq!(extractions.len(), 5);
        assert_eq!(extractions[0].biomarker_mentions.len(), 2);
        assert_eq!(extractions[1].paper_id, "PMID:1");
        assert!(extractions[2..].iter().all(|e| e.paper_id.is_empty()));
    }

    #[test]
    fn test_bad_mentions_do_not_drop_their_paper() {
        let entries = vec![
            serde_json::json!({
                "paper_id": "P1",
                "biomarker_mentions": [
                    {"raw_name": "KRAS", "disease": "lung cancer", "evidence_text": "G12C"},
                    {"raw_name": null, "disease": "lung cancer"},
                    17
                ]
            }),
            serde_json::json!({
                "filename": "a.pdf",
                "status": "success",
                "biomarkers": ["BRCA1", {"name": "TP53", "diseases": ["sarcoma"]}]
            }),
            serde_json::json!({"filename": "b.pdf", "status": "success", "biomarkers": null}),
        ];

        let (summaries, extractions) = parse_entries(entries);
        assert_eq!(summaries.len(), 2);
        assert_eq!(extractions.len(), 3);
        assert_eq!(extractions[0].paper_id, "P1");
        assert_eq!(extractions[1].paper_id, "a.pdf");
        assert!(extractions[2].biomarker_mentions.is_empty());

        let kb = score(aggregate(&extractions));
        assert_eq!(kb.stats.papers_malformed, 0);
        assert_eq!(kb.stats.mentions_skipped, 3);
        let keys: Vec<&str> = kb.records.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["kras", "tp53"]);
    }

    #[tokio::test]
    async fn test_csv_headers_match_row_fields() {
        let dir = tempfile::tempdir().unwrap();
        let storage = paperlens_storage::LocalStorage::new(dir.path());
        let names = OutputNames::new("anthropic");
        let summaries = vec![PaperSummary::failed("x.pdf", PaperStatus::ApiError, "429")];
        write_summaries(&storage, &names, &summaries).await.unwrap();
        let kb = score(aggregate(&[paperlens_test_utils::extraction("P1", &[("EGFR", "lung")])]));
        write_csv(&storage, &names.aggregated_csv(), AssociationRow::HEADERS, &to_table(&kb)).await.unwrap();

        for (file, headers) in [
            (names.paper_summaries_csv(), PaperSummaryRow::HEADERS),
            (names.aggregated_csv(), AssociationRow::HEADERS),
        ] {
            let text = std::fs::read_to_string(dir.path().join(&file)).unwrap();
            assert_eq!(text.lines().next(), Some(headers.join(",").as_str()), "{file}");
        }
    }

    #[test]
    fn test_report_lists_failures() {
        let summaries = vec![
            PaperSummary { filename: "a.pdf".into(), status: PaperStatus::Success, ..Default::default() },
            PaperSummary::failed("b.pdf", PaperStatus::JsonError, "expected value"),
        ];
        let kb = score(aggregate(&[]));
        let report = build_report(&summaries, &kb, vec![]);
        assert_eq!(report.total_papers, 2);
        assert_eq!(report.successful, 1);
        assert_eq!(report.failed.len(), 1);
        assert!(report.to_string().contains("b.pdf [json_error] expected value"));
    }
}
