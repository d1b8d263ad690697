//! Flat and filtered views over a scored knowledge base.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregator::{AggregatedKnowledgeBase, AggregationStats};
use crate::normalise::normalise;
use crate::store::BiomarkerRecord;

/// Separator between paper ids in `AssociationRow::paper_ids`.
pub const PAPER_ID_DELIMITER: &str = "; ";

/// Name variants listed per row.
const MAX_VARIANTS_IN_ROW: usize = 3;

// ── Association table ───────────────────────────────────────────────────────

/// One (biomarker, disease) association as a table row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssociationRow {
    pub biomarker: String,
    pub disease: String,
    /// Empty when the knowledge base has not been scored.
    pub evidence_level: String,
    pub paper_count: usize,
    pub paper_ids: String,
    pub total_mentions: usize,
    pub name_variants: String,
    pub association_types: String,
    pub reported_levels: String,
}

impl AssociationRow {
    /// Column names in serialization order.
    pub const HEADERS: &'static [&'static str] = &[
        "biomarker",
        "disease",
        "evidence_level",
        "paper_count",
        "paper_ids",
        "total_mentions",
        "name_variants",
        "association_types",
        "reported_levels",
    ];
}

/// One row per association, sorted by biomarker display name then disease
/// (both case-insensitively, raw spelling as tiebreak).
pub fn to_table(kb: &AggregatedKnowledgeBase) -> Vec<AssociationRow> {
    let mut rows: Vec<AssociationRow> = kb
        .associations()
        .map(|(record, evidence)| AssociationRow {
            biomarker: record.display_name.clone(),
            disease: evidence.disease.clone(),
            evidence_level: evidence
                .evidence_level
                .map(|l| l.as_str().to_string())
                .unwrap_or_default(),
            paper_count: evidence.paper_count(),
            paper_ids: evidence
                .contributing_papers
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(PAPER_ID_DELIMITER),
            total_mentions: record.total_mentions,
            name_variants: record
                .name_variants
                .iter()
                .take(MAX_VARIANTS_IN_ROW)
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", "),
            association_types: join_labels(&evidence.association_types),
            reported_levels: join_labels(&evidence.reported_levels),
        })
        .collect();

    rows.sort_by(|a, b| {
        caseless(&a.biomarker, &b.biomarker).then_with(|| caseless(&a.disease, &b.disease))
    });
    rows
}

fn join_labels(labels: &BTreeSet<String>) -> String {
    labels.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}

fn caseless(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b))
}

// ── High-confidence subset ──────────────────────────────────────────────────

/// Copy of `kb` keeping only Moderate and High associations. Records left
/// with no association are dropped. Unscored associations never qualify.
pub fn to_high_confidence_subset(kb: &AggregatedKnowledgeBase) -> AggregatedKnowledgeBase {
    let records = kb
        .records
        .iter()
        .filter_map(|(key, record)| {
            let kept: BTreeMap<_, _> = record
                .disease_associations
                .iter()
                .filter(|(_, e)| e.evidence_level.is_some_and(|l| l.is_high_confidence()))
                .map(|(k, e)| (k.clone(), e.clone()))
                .collect();
            if kept.is_empty() {
                return None;
            }
            let mut record = record.clone();
            record.disease_associations = kept;
            Some((key.clone(), record))
        })
        .collect();

    AggregatedKnowledgeBase {
        records,
        generated_at: kb.generated_at,
        stats: kb.stats.clone(),
    }
}

// ── Summary ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NamedCount {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KbSummary {
    pub total_unique_biomarkers: usize,
    pub total_associations: usize,
    pub high_confidence_associations: usize,
    /// Biomarkers by total mentions.
    pub top_biomarkers: Vec<NamedCount>,
    /// Diseases by number of supporting papers summed over biomarkers.
    pub top_diseases: Vec<NamedCount>,
}

pub fn summarise(kb: &AggregatedKnowledgeBase, top_n: usize) -> KbSummary {
    let mut biomarkers: Vec<NamedCount> = kb
        .records
        .values()
        .map(|r| NamedCount { name: r.display_name.clone(), count: r.total_mentions })
        .collect();
    rank(&mut biomarkers, top_n);

    // Keyed by disease key; the first spelling encountered is displayed.
    let mut by_disease: BTreeMap<&str, NamedCount> = BTreeMap::new();
    for record in kb.records.values() {
        for (key, evidence) in &record.disease_associations {
            by_disease
                .entry(key.as_str())
                .or_insert_with(|| NamedCount { name: evidence.disease.clone(), count: 0 })
                .count += evidence.paper_count();
        }
    }
    let mut diseases: Vec<NamedCount> = by_disease.into_values().collect();
    rank(&mut diseases, top_n);

    KbSummary {
        total_unique_biomarkers: kb.records.len(),
        total_associations: kb.association_count(),
        high_confidence_associations: kb
            .associations()
            .filter(|(_, e)| e.evidence_level.is_some_and(|l| l.is_high_confidence()))
            .count(),
        top_biomarkers: biomarkers,
        top_diseases: diseases,
    }
}

fn rank(items: &mut Vec<NamedCount>, top_n: usize) {
    items.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    items.truncate(top_n);
}

/// Record for any spelling of a biomarker name.
pub fn biomarker_details<'a>(kb: &'a AggregatedKnowledgeBase, raw_name: &str) -> Option<&'a BiomarkerRecord> {
    let key = normalise(raw_name).ok()?;
    kb.records.get(&key)
}

// ── JSON document ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KbMetadata {
    pub generated_at: DateTime<Utc>,
    pub total_biomarkers: usize,
    pub stats: AggregationStats,
}

/// Layout of the `biomarkers_aggregated_*.json` file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KbDocument {
    pub metadata: KbMetadata,
    pub summary: KbSummary,
    pub biomarkers: BTreeMap<String, BiomarkerRecord>,
}

impl KbDocument {
    pub fn new(kb: &AggregatedKnowledgeBase, top_n: usize) -> Self {
        Self {
            metadata: KbMetadata {
                generated_at: kb.generated_at,
                total_biomarkers: kb.records.len(),
                stats: kb.stats.clone(),
            },
            summary: summarise(kb, top_n),
            biomarkers: kb.records.clone(),
        }
    }
}
