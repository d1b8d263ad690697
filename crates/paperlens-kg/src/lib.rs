//! paperlens-kg — Cross-paper biomarker knowledge base.
//!
//! A single-pass batch fold over per-paper extraction results:
//!   1. `normalise`  — raw biomarker name → canonical key
//!   2. `store`      — canonical key → disease → evidence
//!   3. `aggregator` — fold every paper's mentions into a fresh store
//!   4. `scoring`    — evidence level from independent paper count
//!   5. `export`     — flat table and high-confidence subset
//!
//! Nothing here performs I/O; writing bytes is the storage adapter's job.

pub mod normalise;
pub mod store;
pub mod aggregator;
pub mod scoring;
pub mod export;

pub use aggregator::{aggregate, AggregatedKnowledgeBase, AggregationStats};
pub use export::{biomarker_details, summarise, to_high_confidence_subset, to_table, AssociationRow, KbDocument, KbSummary};
pub use normalise::{normalise, InvalidInputError};
pub use scoring::{level_for_count, score, EvidenceLevel, HIGH_MIN_PAPERS, MODERATE_MIN_PAPERS};
pub use store::{AssociationEvidence, BiomarkerMention, BiomarkerRecord, EvidenceStore};
