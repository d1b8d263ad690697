//! End-to-end batch runs against a scripted LLM backend and local storage.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use paperlens_agent::pipeline::{aggregate_from_file, list_pdfs, Pipeline};
use paperlens_common::{PaperStatus, PaperSummary};
use paperlens_kg::{biomarker_details, EvidenceLevel};
use paperlens_llm::{LlmBackend, LlmError, LlmRequest, LlmResponse, PaperSummariser, Provider, SummariserConfig};
use paperlens_storage::{LocalStorage, OutputNames};
use paperlens_test_utils::{fenced_summary_json, pretty_assertions::assert_eq, write_pdf};

/// Answers according to which fixture paper the prompt contains.
struct ScriptedBackend;

#[async_trait]
impl LlmBackend for ScriptedBackend {
    async fn complete(&self, req: LlmRequest) -> Result<LlmResponse, LlmError> {
        let prompt = req.messages.last().map(|m| m.content.clone()).unwrap_or_default();
        let content = if prompt.contains("first study") {
            fenced_summary_json("First", "BRCA1", "breast cancer")
        } else if prompt.contains("second study") {
            fenced_summary_json("Second", "brca-1", "Breast Cancer")
        } else {
            "I could not read this paper.".to_string()
        };
        Ok(LlmResponse { content, model: "scripted".into(), prompt_tokens: 10, completion_tokens: 10 })
    }

    fn model_id(&self) -> &str { "scripted" }
    fn provider(&self) -> Provider { Provider::Anthropic }
    fn max_context_tokens(&self) -> usize { 200_000 }
    fn max_output_tokens(&self) -> usize { 4_096 }
}

fn pipeline(output_dir: &Path) -> Pipeline {
    let summariser = Arc::new(PaperSummariser::new(Arc::new(ScriptedBackend), SummariserConfig::default()));
    Pipeline::new(summariser, Arc::new(LocalStorage::new(output_dir)), 100_000, 2, 10)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> T {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

#[tokio::test]
async fn test_batch_aggregates_across_papers() {
    let papers = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();

    write_pdf(&papers.path().join("a.pdf"), "A", &["The first study of BRCA1."]).unwrap();
    write_pdf(&papers.path().join("b.pdf"), "B", &["The second study, a replication."]).unwrap();
    write_pdf(&papers.path().join("c.pdf"), "C", &["An unrelated commentary."]).unwrap();
    std::fs::write(papers.path().join("d.pdf"), b"not a pdf at all").unwrap();

    let pdfs = list_pdfs(papers.path()).unwrap();
    assert_eq!(pdfs.len(), 4);

    let (report, kb) = pipeline(out.path()).run(&pdfs, None).await.unwrap();

    assert_eq!(report.total_papers, 4);
    assert_eq!(report.successful, 2);
    let failures: Vec<(&str, PaperStatus)> =
        report.failed.iter().map(|f| (f.filename.as_str(), f.status)).collect();
    assert_eq!(failures, vec![("c.pdf", PaperStatus::JsonError), ("d.pdf", PaperStatus::ExtractionFailed)]);

    let record = biomarker_details(&kb, "BRCA-1").unwrap();
    assert_eq!(record.display_name, "BRCA1");
    let evidence = record.disease_associations.values().next().unwrap();
    assert_eq!(evidence.paper_count(), 2);
    assert_eq!(evidence.evidence_level, Some(EvidenceLevel::Moderate));
    assert_eq!(report.high_confidence, 1);

    let names = OutputNames::new("anthropic");
    for file in [
        names.paper_summaries_json(),
        names.paper_summaries_csv(),
        names.aggregated_json(),
        names.aggregated_csv(),
        names.high_confidence_json(),
        OutputNames::extracted_text("a"),
    ] {
        assert!(out.path().join(&file).exists(), "missing {file}");
    }

    let summaries: Vec<PaperSummary> = read_json(&out.path().join(names.paper_summaries_json()));
    let order: Vec<&str> = summaries.iter().map(|s| s.filename.as_str()).collect();
    assert_eq!(order, vec!["a.pdf", "b.pdf", "c.pdf", "d.pdf"]);
    assert_eq!(summaries[0].num_pages, Some(1));
    assert!(summaries[2].raw_response.as_deref().unwrap().contains("could not read"));

    let csv = std::fs::read_to_string(out.path().join(names.aggregated_csv())).unwrap();
    assert!(csv.starts_with("biomarker,disease,evidence_level,paper_count,paper_ids"));
    assert!(csv.contains("BRCA1,breast cancer,MODERATE,2,a.pdf; b.pdf"));
    assert!(csv.lines().nth(1).unwrap().ends_with(",prognostic,cohort"));
}

#[tokio::test]
async fn test_rerun_from_summaries_matches_batch() {
    let papers = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_pdf(&papers.path().join("a.pdf"), "A", &["The first study of BRCA1."]).unwrap();
    write_pdf(&papers.path().join("b.pdf"), "B", &["The second study, a replication."]).unwrap();

    let pdfs = list_pdfs(papers.path()).unwrap();
    let (batch, _) = pipeline(out.path()).run(&pdfs, None).await.unwrap();

    let names = OutputNames::new("anthropic");
    let rerun_dir = tempfile::tempdir().unwrap();
    let storage = LocalStorage::new(rerun_dir.path());
    let rerun = aggregate_from_file(&out.path().join(names.paper_summaries_json()), &storage, &names, 10)
        .await
        .unwrap();

    assert_eq!(rerun.unique_biomarkers, batch.unique_biomarkers);
    assert_eq!(rerun.associations, batch.associations);
    assert_eq!(rerun.high_confidence, batch.high_confidence);
    assert_eq!(
        std::fs::read_to_string(rerun_dir.path().join(names.aggregated_csv())).unwrap(),
        std::fs::read_to_string(out.path().join(names.aggregated_csv())).unwrap(),
    );
}

#[tokio::test]
async fn test_extraction_list_input_counts_malformed_papers() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("extractions.json");
    std::fs::write(
        &input,
        r#"[
            {"paper_id": "P1", "biomarker_mentions": [{"raw_name": "KRAS", "disease": "lung cancer"}]},
            {"paper_id": "P2", "biomarker_mentions": [{"raw_name": "kras", "disease": "Lung Cancer"},
                                                     {"raw_name": "  ", "disease": "lung cancer"}]},
            {"biomarker_mentions": [{"raw_name": "EGFR", "disease": "lung cancer"}]}
        ]"#,
    )
    .unwrap();

    let storage = LocalStorage::new(dir.path().join("out"));
    let report = aggregate_from_file(&input, &storage, &OutputNames::new("anthropic"), 10)
        .await
        .unwrap();

    assert_eq!(report.total_papers, 3);
    assert_eq!(report.papers_malformed, 1);
    assert_eq!(report.mentions_skipped, 1);
    assert_eq!(report.unique_biomarkers, 1);
    assert_eq!(report.high_confidence, 1);
}

#[tokio::test]
async fn test_run_without_associations_writes_header_only_csv() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("extractions.json");
    std::fs::write(&input, r#"[{"paper_id": "P1", "biomarker_mentions": null}]"#).unwrap();

    let names = OutputNames::new("anthropic");
    let storage = LocalStorage::new(dir.path().join("out"));
    let report = aggregate_from_file(&input, &storage, &names, 10).await.unwrap();
    assert_eq!(report.associations, 0);

    let csv = std::fs::read_to_string(dir.path().join("out").join(names.aggregated_csv())).unwrap();
    assert_eq!(
        csv,
        "biomarker,disease,evidence_level,paper_count,paper_ids,total_mentions,name_variants,association_types,reported_levels\n"
    );
}
