//! Paper-level data models shared between the summarizer, the aggregation
//! engine and the exporters.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Processing status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaperStatus {
    Success,
    ExtractionFailed,
    JsonError,
    ApiError,
    #[default]
    ProcessingError,
}

impl PaperStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaperStatus::Success          => "success",
            PaperStatus::ExtractionFailed => "extraction_failed",
            PaperStatus::JsonError        => "json_error",
            PaperStatus::ApiError         => "api_error",
            PaperStatus::ProcessingError  => "processing_error",
        }
    }
}

// ---------------------------------------------------------------------------
// LLM-side biomarker finding
// ---------------------------------------------------------------------------

/// A biomarker as reported by the summarizer: one name, possibly several
/// diseases.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BiomarkerFinding {
    #[serde(deserialize_with = "lenient_text")]
    pub name: String,
    #[serde(deserialize_with = "lenient_list")]
    pub diseases: Vec<String>,
    #[serde(deserialize_with = "lenient_opt_text")]
    pub association_type: Option<String>,
    #[serde(deserialize_with = "lenient_opt_text")]
    pub evidence_level: Option<String>,
    #[serde(deserialize_with = "lenient_opt_text")]
    pub evidence: Option<String>,
}

impl BiomarkerFinding {
    /// Evidence snippet recorded against every disease of this finding.
    /// Falls back to the association type and study-level label.
    pub fn evidence_text(&self) -> String {
        if let Some(ref e) = self.evidence {
            if !e.trim().is_empty() {
                return e.trim().to_string();
            }
        }
        match (&self.association_type, &self.evidence_level) {
            (Some(a), Some(l)) => format!("{a} ({l})"),
            (Some(a), None)    => a.clone(),
            (None, Some(l))    => l.clone(),
            (None, None)       => String::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Paper summary
// ---------------------------------------------------------------------------

/// Structured result for one processed paper. Failed papers carry a non
/// `Success` status and an `error` message instead of content.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PaperSummary {
    pub filename: String,
    pub status: PaperStatus,
    pub api_provider: Option<String>,
    #[serde(deserialize_with = "lenient_opt_text")]
    pub title: Option<String>,
    #[serde(deserialize_with = "lenient_opt_text")]
    pub authors: Option<String>,
    #[serde(deserialize_with = "lenient_opt_text")]
    pub year: Option<String>,
    #[serde(rename = "abstract", deserialize_with = "lenient_opt_text")]
    pub abstract_text: Option<String>,
    #[serde(deserialize_with = "lenient_opt_text")]
    pub research_question: Option<String>,
    #[serde(deserialize_with = "lenient_opt_text")]
    pub methodology: Option<String>,
    #[serde(deserialize_with = "lenient_list")]
    pub key_findings: Vec<String>,
    #[serde(deserialize_with = "lenient_opt_text")]
    pub conclusions: Option<String>,
    #[serde(deserialize_with = "lenient_opt_text")]
    pub limitations: Option<String>,
    #[serde(deserialize_with = "lenient_opt_text")]
    pub future_work: Option<String>,
    #[serde(deserialize_with = "lenient_records")]
    pub biomarkers: Vec<BiomarkerFinding>,
    pub num_pages: Option<usize>,
    pub text_length: Option<usize>,
    pub chunks_processed: Option<usize>,
    pub error: Option<String>,
    pub raw_response: Option<String>,
}

impl PaperSummary {
    /// A summary for a paper that never produced content.
    pub fn failed(filename: impl Into<String>, status: PaperStatus, error: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            status,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == PaperStatus::Success
    }

    /// Flatten the summarizer's findings into one mention per
    /// (biomarker, disease). A finding without diseases yields a single
    /// mention with an empty disease; an unreadable finding yields one
    /// nameless mention the aggregator skips.
    pub fn to_extraction(&self) -> PerPaperExtraction {
        let mut mentions = Vec::new();
        for finding in &self.biomarkers {
            let base = MentionInput {
                raw_name: finding.name.clone(),
                disease: String::new(),
                evidence_text: finding.evidence_text(),
                association_type: finding.association_type.clone().unwrap_or_default(),
                evidence_level: finding.evidence_level.clone().unwrap_or_default(),
            };
            if finding.diseases.is_empty() {
                mentions.push(base);
                continue;
            }
            for disease in &finding.diseases {
                mentions.push(MentionInput { disease: disease.clone(), ..base.clone() });
            }
        }
        PerPaperExtraction {
            paper_id: self.filename.clone(),
            biomarker_mentions: mentions,
        }
    }

    /// Flat row for the `paper_summaries_*.csv` export.
    pub fn to_row(&self) -> PaperSummaryRow {
        PaperSummaryRow {
            filename: self.filename.clone(),
            status: self.status.as_str().to_string(),
            api_provider: self.api_provider.clone().unwrap_or_default(),
            title: self.title.clone().unwrap_or_default(),
            authors: self.authors.clone().unwrap_or_default(),
            year: self.year.clone().unwrap_or_default(),
            abstract_text: self.abstract_text.clone().unwrap_or_default(),
            research_question: self.research_question.clone().unwrap_or_default(),
            methodology: self.methodology.clone().unwrap_or_default(),
            key_findings: self.key_findings.join(" | "),
            conclusions: self.conclusions.clone().unwrap_or_default(),
            limitations: self.limitations.clone().unwrap_or_default(),
            future_work: self.future_work.clone().unwrap_or_default(),
            biomarker_count: self.biomarkers.iter().filter(|b| !b.name.trim().is_empty()).count(),
            num_pages: self.num_pages,
            text_length: self.text_length,
            chunks_processed: self.chunks_processed,
            error: self.error.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PaperSummaryRow {
    pub filename: String,
    pub status: String,
    pub api_provider: String,
    pub title: String,
    pub authors: String,
    pub year: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub research_question: String,
    pub methodology: String,
    pub key_findings: String,
    pub conclusions: String,
    pub limitations: String,
    pub future_work: String,
    pub biomarker_count: usize,
    pub num_pages: Option<usize>,
    pub text_length: Option<usize>,
    pub chunks_processed: Option<usize>,
    pub error: String,
}

impl PaperSummaryRow {
    /// Column names in serialization order.
    pub const HEADERS: &'static [&'static str] = &[
        "filename",
        "status",
        "api_provider",
        "title",
        "authors",
        "year",
        "abstract",
        "research_question",
        "methodology",
        "key_findings",
        "conclusions",
        "limitations",
        "future_work",
        "biomarker_count",
        "num_pages",
        "text_length",
        "chunks_processed",
        "error",
    ];
}

// ---------------------------------------------------------------------------
// Aggregation input
// ---------------------------------------------------------------------------

/// Extraction output for one paper, as consumed by the aggregation engine.
/// Missing fields deserialize to empty values; the aggregator treats an
/// empty `paper_id` as a malformed paper and an empty `raw_name` as a
/// skipped mention. Mentions that are not objects decode to a nameless
/// placeholder so they are skipped and counted without losing their
/// siblings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PerPaperExtraction {
    #[serde(deserialize_with = "lenient_text")]
    pub paper_id: String,
    #[serde(deserialize_with = "lenient_records")]
    pub biomarker_mentions: Vec<MentionInput>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MentionInput {
    #[serde(deserialize_with = "lenient_text")]
    pub raw_name: String,
    #[serde(deserialize_with = "lenient_text")]
    pub disease: String,
    #[serde(deserialize_with = "lenient_text")]
    pub evidence_text: String,
    /// e.g. "prognostic", "diagnostic"; empty when not reported.
    #[serde(deserialize_with = "lenient_text")]
    pub association_type: String,
    /// Study-level label such as "cohort" or "clinical_trial".
    #[serde(deserialize_with = "lenient_text")]
    pub evidence_level: String,
}

// ---------------------------------------------------------------------------
// Lenient field decoding (LLM output is loosely typed)
// ---------------------------------------------------------------------------

fn value_to_text(v: &Value) -> Option<String> {
    match v {
        Value::Null         => None,
        Value::String(s)    => Some(s.clone()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(value_to_text).collect();
            Some(parts.join(", "))
        }
        other => Some(other.to_string()),
    }
}

fn lenient_opt_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_to_text))
}

fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_opt_text(deserializer)?.unwrap_or_default())
}

fn lenient_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => items.iter().filter_map(value_to_text).collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s],
        _ => Vec::new(),
    })
}

/// Element-wise list decoding. `null` or a missing list is empty, a lone
/// object is a one-element list, and any element that is not an object (or
/// fails to decode) becomes `T::default()` in place.
fn lenient_records<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let items = match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(items)) => items,
        Some(obj @ Value::Object(_)) => vec![obj],
        _ => return Ok(Vec::new()),
    };
    Ok(items
        .into_iter()
        .map(|item| match item {
            Value::Object(_) => serde_json::from_value(item).unwrap_or_default(),
            _ => T::default(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_finding_with_two_diseases_yields_two_mentions() {
        let summary = PaperSummary {
            filename: "paper1.pdf".to_string(),
            status: PaperStatus::Success,
            biomarkers: vec![BiomarkerFinding {
                name: "BRCA1".to_string(),
                diseases: vec!["breast cancer".to_string(), "ovarian cancer".to_string()],
                association_type: Some("causal".to_string()),
                evidence_level: Some("clinical_trial".to_string()),
                evidence: None,
            }],
            ..Default::default()
        };
        let extraction = summary.to_extraction();
        assert_eq!(extraction.paper_id, "paper1.pdf");
        assert_eq!(extraction.biomarker_mentions.len(), 2);
        assert_eq!(extraction.biomarker_mentions[1].disease, "ovarian cancer");
        assert_eq!(extraction.biomarker_mentions[0].evidence_text, "causal (clinical_trial)");
        assert_eq!(extraction.biomarker_mentions[1].association_type, "causal");
        assert_eq!(extraction.biomarker_mentions[1].evidence_level, "clinical_trial");
    }

    #[test]
    fn test_finding_without_diseases_keeps_one_mention() {
        let summary = PaperSummary {
            filename: "p.pdf".to_string(),
            biomarkers: vec![BiomarkerFinding { name: "CA-125".to_string(), ..Default::default() }],
            ..Default::default()
        };
        let mentions = summary.to_extraction().biomarker_mentions;
        assert_eq!(mentions.len(), 1);
        assert_eq!(mentions[0].disease, "");
    }

    #[test]
    fn test_lenient_decoding_of_llm_json() {
        let json = r#"{
            "title": "EGFR in NSCLC",
            "authors": ["A. Smith", "B. Jones"],
            "year": 2023,
            "key_findings": "single finding",
            "biomarkers": [{"name": "EGFR", "diseases": "NSCLC", "evidence": "exon 19 deletions"}]
        }"#;
        let summary: PaperSummary = serde_json::from_str(json).unwrap();
        assert_eq!(summary.authors.as_deref(), Some("A. Smith, B. Jones"));
        assert_eq!(summary.year.as_deref(), Some("2023"));
        assert_eq!(summary.key_findings, vec!["single finding".to_string()]);
        assert_eq!(summary.biomarkers[0].diseases, vec!["NSCLC".to_string()]);
        assert_eq!(summary.biomarkers[0].evidence_text(), "exon 19 deletions");
    }

    #[test]
    fn test_failed_summary_row() {
        let s = PaperSummary::failed("broken.pdf", PaperStatus::ExtractionFailed, "no xref table");
        assert!(!s.is_success());
        let row = s.to_row();
        assert_eq!(row.status, "extraction_failed");
        assert_eq!(row.error, "no xref table");
    }

    #[test]
    fn test_missing_fields_deserialize_to_empty_extraction() {
        let e: PerPaperExtraction = serde_json::from_str(r#"{"biomarker_mentions": [{"disease": "x"}]}"#).unwrap();
        assert_eq!(e.paper_id, "");
        assert_eq!(e.biomarker_mentions[0].raw_name, "");
    }

    #[test]
    fn test_null_raw_name_keeps_sibling_mentions() {
        let json = r#"{
            "paper_id": "P1",
            "biomarker_mentions": [
                {"raw_name": "KRAS", "disease": "lung cancer", "evidence_text": "G12C"},
                {"raw_name": null, "disease": null},
                "EGFR"
            ]
        }"#;
        let e: PerPaperExtraction = serde_json::from_str(json).unwrap();
        assert_eq!(e.paper_id, "P1");
        assert_eq!(e.biomarker_mentions.len(), 3);
        assert_eq!(e.biomarker_mentions[0].raw_name, "KRAS");
        assert_eq!(e.biomarker_mentions[0].evidence_text, "G12C");
        assert_eq!(e.biomarker_mentions[1], MentionInput::default());
        assert_eq!(e.biomarker_mentions[2], MentionInput::default());
    }

    #[test]
    fn test_non_object_finding_keeps_the_rest() {
        let json = r#"{
            "filename": "a.pdf",
            "status": "success",
            "biomarkers": ["BRCA1", {"name": "TP53", "diseases": ["sarcoma"], "association_type": "prognostic"}]
        }"#;
        let summary: PaperSummary = serde_json::from_str(json).unwrap();
        assert_eq!(summary.biomarkers.len(), 2);
        assert_eq!(summary.biomarkers[1].name, "TP53");
        assert_eq!(summary.to_row().biomarker_count, 1);

        let mentions = summary.to_extraction().biomarker_mentions;
        let names: Vec<&str> = mentions.iter().map(|m| m.raw_name.as_str()).collect();
        assert_eq!(names, vec!["", "TP53"]);
        assert_eq!(mentions[1].association_type, "prognostic");
    }

    #[test]
    fn test_null_or_single_object_biomarker_list() {
        let none: PaperSummary = serde_json::from_str(r#"{"title": "T", "biomarkers": null}"#).unwrap();
        assert!(none.biomarkers.is_empty());

        let one: PaperSummary =
            serde_json::from_str(r#"{"biomarkers": {"name": "PSA", "diseases": "prostate cancer"}}"#).unwrap();
        assert_eq!(one.biomarkers.len(), 1);
        assert_eq!(one.biomarkers[0].name, "PSA");

        let e: PerPaperExtraction = serde_json::from_str(r#"{"paper_id": "P9", "biomarker_mentions": null}"#).unwrap();
        assert_eq!(e.paper_id, "P9");
        assert!(e.biomarker_mentions.is_empty());
    }
}
