//! Evidence level scoring.
//!
//! An association's level depends only on how many distinct papers support
//! it. Repeated mentions inside one paper never raise the level.
//!
//!   papers ≥ HIGH_MIN_PAPERS      → High
//!   papers ≥ MODERATE_MIN_PAPERS  → Moderate
//!   otherwise                     → Low

use serde::{Deserialize, Serialize};

use crate::aggregator::AggregatedKnowledgeBase;

pub const MODERATE_MIN_PAPERS: usize = 2;
pub const HIGH_MIN_PAPERS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvidenceLevel {
    Low,
    Moderate,
    High,
}

impl EvidenceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvidenceLevel::Low      => "LOW",
            EvidenceLevel::Moderate => "MODERATE",
            EvidenceLevel::High     => "HIGH",
        }
    }

    /// Moderate and High both count as high-confidence for export.
    pub fn is_high_confidence(&self) -> bool {
        matches!(self, EvidenceLevel::Moderate | EvidenceLevel::High)
    }
}

impl std::fmt::Display for EvidenceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Level for an independent paper count. Zero maps to Low; stored
/// associations always have at least one paper.
pub fn level_for_count(paper_count: usize) -> EvidenceLevel {
    if paper_count >= HIGH_MIN_PAPERS {
        EvidenceLevel::High
    } else if paper_count >= MODERATE_MIN_PAPERS {
        EvidenceLevel::Moderate
    } else {
        EvidenceLevel::Low
    }
}

/// Assign a level to every association. Rescoring an already scored
/// knowledge base yields the same levels.
pub fn score(mut kb: AggregatedKnowledgeBase) -> AggregatedKnowledgeBase {
    for record in kb.records.values_mut() {
        for evidence in record.disease_associations.values_mut() {
            evidence.evidence_level = Some(level_for_count(evidence.paper_count()));
        }
    }
    kb
}
