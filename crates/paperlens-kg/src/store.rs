//! In-memory evidence store keyed by canonical biomarker key.
//!
//! Owned by a single `aggregate` call; nothing here is shared or persisted.

use std::collections::{BTreeMap, BTreeSet};

use paperlens_common::MentionInput;
use serde::{Deserialize, Serialize};

use crate::normalise::{disease_key, normalise, InvalidInputError};
use crate::scoring::EvidenceLevel;

// ---------------------------------------------------------------------------
// Mention
// ---------------------------------------------------------------------------

/// One biomarker-disease observation from one paper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BiomarkerMention {
    pub raw_name: String,
    pub canonical_key: String,
    pub disease: String,
    pub evidence_text: String,
    pub source_paper_id: String,
    /// As reported by the summarizer; empty when absent.
    pub association_type: String,
    pub evidence_level: String,
}

impl BiomarkerMention {
    /// Build a mention, normalising the raw name.
    pub fn new(
        raw_name: &str,
        disease: &str,
        evidence_text: &str,
        source_paper_id: &str,
    ) -> Result<Self, InvalidInputError> {
        let canonical_key = normalise(raw_name)?;
        Ok(Self {
            raw_name: raw_name.trim().to_string(),
            canonical_key,
            disease: disease.trim().to_string(),
            evidence_text: evidence_text.trim().to_string(),
            source_paper_id: source_paper_id.to_string(),
            association_type: String::new(),
            evidence_level: String::new(),
        })
    }

    pub fn from_input(paper_id: &str, input: &MentionInput) -> Result<Self, InvalidInputError> {
        let mut mention = Self::new(&input.raw_name, &input.disease, &input.evidence_text, paper_id)?;
        mention.association_type = input.association_type.trim().to_string();
        mention.evidence_level = input.evidence_level.trim().to_string();
        Ok(mention)
    }
}

// ---------------------------------------------------------------------------
// Record / evidence
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssociationEvidence {
    /// First-seen spelling of the disease.
    pub disease: String,
    pub contributing_papers: BTreeSet<String>,
    pub evidence_snippets: Vec<String>,
    /// Association types the papers reported ("prognostic", ...).
    #[serde(default)]
    pub association_types: BTreeSet<String>,
    /// Study-level labels the papers reported ("cohort", ...). Distinct
    /// from the computed `evidence_level`.
    #[serde(default)]
    pub reported_levels: BTreeSet<String>,
    /// `None` until the knowledge base has been scored.
    pub evidence_level: Option<EvidenceLevel>,
}

impl AssociationEvidence {
    fn new(disease: impl Into<String>) -> Self {
        Self {
            disease: disease.into(),
            contributing_papers: BTreeSet::new(),
            evidence_snippets: Vec::new(),
            association_types: BTreeSet::new(),
            reported_levels: BTreeSet::new(),
            evidence_level: None,
        }
    }

    pub fn paper_count(&self) -> usize {
        self.contributing_papers.len()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BiomarkerRecord {
    pub canonical_key: String,
    /// First-seen raw spelling.
    pub display_name: String,
    pub name_variants: BTreeSet<String>,
    pub total_mentions: usize,
    /// Disease key → evidence. See `normalise::disease_key`.
    pub disease_associations: BTreeMap<String, AssociationEvidence>,
}

impl BiomarkerRecord {
    fn new(canonical_key: &str, display_name: &str) -> Self {
        Self {
            canonical_key: canonical_key.to_string(),
            display_name: display_name.to_string(),
            name_variants: BTreeSet::new(),
            total_mentions: 0,
            disease_associations: BTreeMap::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct EvidenceStore {
    records: BTreeMap<String, BiomarkerRecord>,
}

impl EvidenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Existing record for `canonical_key`, or a new one displayed as
    /// `display_name_hint`. The hint is ignored for existing records.
    pub fn get_or_create(&mut self, canonical_key: &str, display_name_hint: &str) -> &mut BiomarkerRecord {
        self.records
            .entry(canonical_key.to_string())
            .or_insert_with(|| BiomarkerRecord::new(canonical_key, display_name_hint))
    }

    /// File `mention` under its disease on `record`. Re-adding a paper that
    /// already contributed leaves the paper set unchanged; the snippet is
    /// still appended.
    pub fn record_mention(record: &mut BiomarkerRecord, mention: &BiomarkerMention) {
        record.total_mentions += 1;
        record.name_variants.insert(mention.raw_name.clone());

        let evidence = record
            .disease_associations
            .entry(disease_key(&mention.disease))
            .or_insert_with(|| AssociationEvidence::new(display_disease(&mention.disease)));

        evidence.contributing_papers.insert(mention.source_paper_id.clone());
        evidence.evidence_snippets.push(mention.evidence_text.clone());
        if !mention.association_type.is_empty() {
            evidence.association_types.insert(mention.association_type.clone());
        }
        if !mention.evidence_level.is_empty() {
            evidence.reported_levels.insert(mention.evidence_level.clone());
        }
    }

    pub fn get(&self, canonical_key: &str) -> Option<&BiomarkerRecord> {
        self.records.get(canonical_key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> BTreeMap<String, BiomarkerRecord> {
        self.records
    }
}

fn display_disease(disease: &str) -> String {
    let collapsed = disease.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        crate::normalise::UNKNOWN_DISEASE.to_string()
    } else {
        collapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mention(name: &str, disease: &str, paper: &str) -> BiomarkerMention {
        BiomarkerMention::new(name, disease, "snippet", paper).unwrap()
    }

    #[test]
    fn test_get_or_create_keeps_first_display_name() {
        let mut store = EvidenceStore::new();
        store.get_or_create("brca1", "BRCA1");
        let rec = store.get_or_create("brca1", "BRCA-1");
        assert_eq!(rec.display_name, "BRCA1");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_same_paper_counts_once() {
        let mut store = EvidenceStore::new();
        let m = mention("BRCA1", "breast cancer", "P1");
        let rec = store.get_or_create(&m.canonical_key, &m.raw_name);
        EvidenceStore::record_mention(rec, &m);
        EvidenceStore::record_mention(rec, &m);

        let ev = &rec.disease_associations["breast cancer"];
        assert_eq!(ev.paper_count(), 1);
        assert_eq!(ev.evidence_snippets.len(), 2);
        assert_eq!(rec.total_mentions, 2);
    }

    #[test]
    fn test_disease_spellings_merge_and_keep_first_form() {
        let mut store = EvidenceStore::new();
        let a = mention("EGFR", "NSCLC", "P1");
        let b = mention("EGFR", "nsclc ", "P2");
        let rec = store.get_or_create(&a.canonical_key, &a.raw_name);
        EvidenceStore::record_mention(rec, &a);
        EvidenceStore::record_mention(rec, &b);

        assert_eq!(rec.disease_associations.len(), 1);
        let ev = &rec.disease_associations["nsclc"];
        assert_eq!(ev.disease, "NSCLC");
        assert_eq!(ev.paper_count(), 2);
        assert!(ev.evidence_level.is_none());
    }

    #[test]
    fn test_blank_disease_is_filed_as_unknown() {
        let mut store = EvidenceStore::new();
        let m = mention("CA-125", "", "P1");
        let rec = store.get_or_create(&m.canonical_key, &m.raw_name);
        EvidenceStore::record_mention(rec, &m);
        assert_eq!(rec.disease_associations["unknown"].disease, "unknown");
    }

    #[test]
    fn test_mention_rejects_blank_name() {
        assert!(BiomarkerMention::new("  ", "x", "y", "P1").is_err());
    }

    #[test]
    fn test_reported_labels_are_collected_per_disease() {
        let mut store = EvidenceStore::new();
        let inputs = [
            ("P1", paperlens_test_utils::labelled_mention("BRCA1", "breast cancer", "prognostic", "cohort")),
            ("P2", paperlens_test_utils::labelled_mention("BRCA1", "Breast Cancer", "diagnostic", "cohort")),
            ("P3", paperlens_test_utils::labelled_mention("BRCA1", "breast cancer", "", " ")),
        ];
        for (paper, input) in &inputs {
            let m = BiomarkerMention::from_input(paper, input).unwrap();
            let rec = store.get_or_create(&m.canonical_key, &m.raw_name);
            EvidenceStore::record_mention(rec, &m);
        }

        let ev = &store.get("brca1").unwrap().disease_associations["breast cancer"];
        let types: Vec<&str> = ev.association_types.iter().map(String::as_str).collect();
        assert_eq!(types, vec!["diagnostic", "prognostic"]);
        let levels: Vec<&str> = ev.reported_levels.iter().map(String::as_str).collect();
        assert_eq!(levels, vec!["cohort"]);
        assert_eq!(ev.paper_count(), 3);
    }
}
