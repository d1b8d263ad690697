//! paperlens-test-utils — fixtures shared by the workspace's test suites.

use std::path::{Path, PathBuf};

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use paperlens_common::{MentionInput, PerPaperExtraction};

pub use pretty_assertions;
pub use tempfile;

// ── Extraction fixtures ─────────────────────────────────────────────────────

/// A paper's extraction from `(biomarker, disease)` pairs. Evidence text is
/// derived from the pair so snippets stay distinguishable.
pub fn extraction(paper_id: &str, mentions: &[(&str, &str)]) -> PerPaperExtraction {
    PerPaperExtraction {
        paper_id: paper_id.to_string(),
        biomarker_mentions: mentions
            .iter()
            .map(|(name, disease)| mention(name, disease, &format!("{paper_id}: {name} / {disease}")))
            .collect(),
    }
}

pub fn mention(raw_name: &str, disease: &str, evidence_text: &str) -> MentionInput {
    MentionInput {
        raw_name: raw_name.to_string(),
        disease: disease.to_string(),
        evidence_text: evidence_text.to_string(),
        ..Default::default()
    }
}

/// A mention carrying the summarizer's association type and study label.
pub fn labelled_mention(raw_name: &str, disease: &str, association_type: &str, evidence_level: &str) -> MentionInput {
    MentionInput {
        association_type: association_type.to_string(),
        evidence_level: evidence_level.to_string(),
        ..mention(raw_name, disease, "")
    }
}

/// A well-formed summarizer response, fenced the way chat models tend to
/// return it.
pub fn fenced_summary_json(title: &str, biomarker: &str, disease: &str) -> String {
    let body = serde_json::json!({
        "title": title,
        "authors": ["A. Researcher", "B. Scientist"],
        "year": "2024",
        "abstract": "A short abstract.",
        "research_question": "Does the marker predict outcome?",
        "methodology": "Retrospective cohort",
        "key_findings": ["Marker elevated in cases"],
        "conclusions": "It does.",
        "limitations": "Single centre",
        "future_work": "Prospective validation",
        "biomarkers": [{
            "name": biomarker,
            "diseases": [disease],
            "association_type": "prognostic",
            "evidence_level": "cohort",
            "evidence": format!("{biomarker} elevated in {disease}")
        }]
    });
    format!("```json\n{}\n```", serde_json::to_string_pretty(&body).unwrap_or_default())
}

// ── PDF fixtures ────────────────────────────────────────────────────────────

/// Write a small PDF with one text line per page and a Title entry in the
/// document info dictionary.
pub fn write_pdf(path: &Path, title: &str, pages: &[&str]) -> anyhow::Result<()> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = doc.add_object(dictionary! {
        "Title" => Object::string_literal(title),
        "Author" => Object::string_literal("Fixture Author"),
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);
    doc.save(path)?;
    Ok(())
}

/// Temp directory holding `count` PDFs named `paper_<n>.pdf`.
pub fn pdf_dir(count: usize) -> anyhow::Result<(tempfile::TempDir, Vec<PathBuf>)> {
    let dir = tempfile::tempdir()?;
    let mut paths = Vec::with_capacity(count);
    for n in 1..=count {
        let path = dir.path().join(format!("paper_{n}.pdf"));
        write_pdf(&path, &format!("Fixture paper {n}"), &[&format!("Body of paper {n}")])?;
        paths.push(path);
    }
    Ok((dir, paths))
}
