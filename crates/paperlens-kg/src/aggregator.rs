//! Batch aggregation of per-paper extractions into one knowledge base.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use paperlens_common::PerPaperExtraction;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::store::{AssociationEvidence, BiomarkerMention, BiomarkerRecord, EvidenceStore};

/// Counters for one aggregation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AggregationStats {
    pub papers_seen: usize,
    /// Papers with no identifier; their mentions are ignored.
    pub papers_malformed: usize,
    pub mentions_recorded: usize,
    /// Mentions whose name normalised to nothing.
    pub mentions_skipped: usize,
}

/// Result of one `aggregate` call. Records are ordered by canonical key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AggregatedKnowledgeBase {
    pub records: BTreeMap<String, BiomarkerRecord>,
    pub generated_at: DateTime<Utc>,
    pub stats: AggregationStats,
}

impl AggregatedKnowledgeBase {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn association_count(&self) -> usize {
        self.records.values().map(|r| r.disease_associations.len()).sum()
    }

    /// Every (record, evidence) pair, in record-key then disease-key order.
    pub fn associations(&self) -> impl Iterator<Item = (&BiomarkerRecord, &AssociationEvidence)> {
        self.records
            .values()
            .flat_map(|r| r.disease_associations.values().map(move |e| (r, e)))
    }
}

/// Fold every paper's mentions into a fresh store.
///
/// Never fails: blank biomarker names are skipped with a warning and papers
/// without an identifier contribute nothing. Evidence levels are left unset;
/// call `scoring::score` on the result.
pub fn aggregate(paper_results: &[PerPaperExtraction]) -> AggregatedKnowledgeBase {
    let mut store = EvidenceStore::new();
    let mut stats = AggregationStats::default();

    for paper in paper_results {
        stats.papers_seen += 1;

        let paper_id = paper.paper_id.trim();
        if paper_id.is_empty() {
            warn!(
                mentions = paper.biomarker_mentions.len(),
                "Extraction has no paper_id, ignoring its mentions"
            );
            stats.papers_malformed += 1;
            continue;
        }

        for input in &paper.biomarker_mentions {
            let mention = match BiomarkerMention::from_input(paper_id, input) {
                Ok(m) => m,
                Err(e) => {
                    warn!(paper_id, error = %e, "Skipping biomarker mention");
                    stats.mentions_skipped += 1;
                    continue;
                }
            };

            let record = store.get_or_create(&mention.canonical_key, &mention.raw_name);
            EvidenceStore::record_mention(record, &mention);
            stats.mentions_recorded += 1;
        }

        debug!(paper_id, mentions = paper.biomarker_mentions.len(), "Paper folded");
    }

    info!(
        papers = stats.papers_seen,
        biomarkers = store.len(),
        recorded = stats.mentions_recorded,
        skipped = stats.mentions_skipped,
        "Aggregation complete"
    );

    AggregatedKnowledgeBase {
        records: store.into_records(),
        generated_at: Utc::now(),
        stats,
    }
}
