//! paperlens-common — Shared types and errors used across all Paperlens crates.

pub mod error;
pub mod models;

// Re-export commonly used types
pub use error::{PaperlensError, Result};
pub use models::{BiomarkerFinding, MentionInput, PaperStatus, PaperSummary, PaperSummaryRow, PerPaperExtraction};
