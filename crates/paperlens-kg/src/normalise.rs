//! Biomarker name normalisation.
//!
//! Maps every spelling of a biomarker onto one canonical key so mentions
//! from different papers merge:
//!
//! ```ignore
//! assert_eq!(normalise("BRCA-1")?, "brca1");
//! assert_eq!(normalise("gene: brca.1")?, "brca1");
//! ```
//!
//! The mapping is deliberately lossy. Two genuinely different markers that
//! differ only in punctuation collapse to one key; recall across papers
//! matters more here than cataloguing every variant.

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

/// Disease key used when a mention carries no disease.
pub const UNKNOWN_DISEASE: &str = "unknown";

/// Raised for names that are empty once normalised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid biomarker name {raw:?}: empty after normalisation")]
pub struct InvalidInputError {
    pub raw: String,
}

/// Leading type tags some extractions prepend, e.g. "Gene: KRAS".
fn tag_prefix() -> &'static Regex {
    static TAG: OnceLock<Regex> = OnceLock::new();
    TAG.get_or_init(|| Regex::new(r"^(gene|protein|biomarker)\s*:\s*").unwrap())
}

/// Canonical key for a raw biomarker name.
///
/// Trims, lowercases, drops a leading `gene:` / `protein:` / `biomarker:`
/// tag, then strips `-`, `_`, `.` and all whitespace.
pub fn normalise(raw_name: &str) -> Result<String, InvalidInputError> {
    let lowered = raw_name.trim().to_lowercase();
    let untagged = tag_prefix().replace(&lowered, "");

    let key: String = untagged
        .chars()
        .filter(|c| !matches!(c, '-' | '_' | '.') && !c.is_whitespace())
        .collect();

    if key.is_empty() {
        return Err(InvalidInputError { raw: raw_name.to_string() });
    }
    Ok(key)
}

/// Key under which a disease association is filed: whitespace-collapsed and
/// case-folded, `unknown` when blank.
pub fn disease_key(disease: &str) -> String {
    let key = disease
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    if key.is_empty() {
        UNKNOWN_DISEASE.to_string()
    } else {
        key
    }
}
