//! Data models for paper discovery.

use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A paper found by a literature source, before any PDF is processed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PaperMetadata {
    pub pmid: String,
    pub title: String,
    pub authors: Vec<String>,
    pub abstract_text: Option<String>,
    pub year: Option<String>,
    pub journal: Option<String>,
    pub url: String,
}

impl PaperMetadata {
    pub fn pubmed_url(pmid: &str) -> String {
        format!("https://pubmed.ncbi.nlm.nih.gov/{pmid}/")
    }

    /// "First, Second, Third et al." style author line.
    pub fn short_authors(&self, max: usize) -> String {
        let shown = self.authors.iter().take(max).cloned().collect::<Vec<_>>().join(", ");
        if self.authors.len() > max {
            format!("{shown} et al.")
        } else {
            shown
        }
    }
}

/// Inclusive publication date range for a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub min: NaiveDate,
    pub max: NaiveDate,
}

impl DateWindow {
    /// The `days_back` days up to and including today (UTC).
    pub fn last_days(days_back: i64) -> Self {
        let max = Utc::now().date_naive();
        Self { min: max - Duration::days(days_back), max }
    }

    /// E-utilities date format.
    pub fn format_bounds(&self) -> (String, String) {
        (
            self.min.format("%Y/%m/%d").to_string(),
            self.max.format("%Y/%m/%d").to_string(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_formatting() {
        let w = DateWindow {
            min: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            max: NaiveDate::from_ymd_opt(2024, 2, 4).unwrap(),
        };
        assert_eq!(w.format_bounds(), ("2024/01/05".to_string(), "2024/02/04".to_string()));
    }

    #[test]
    fn test_last_days_span() {
        let w = DateWindow::last_days(30);
        assert_eq!((w.max - w.min).num_days(), 30);
    }

    #[test]
    fn test_short_authors() {
        let p = PaperMetadata {
            authors: vec!["A".into(), "B".into(), "C".into(), "D".into()],
            ..Default::default()
        };
        assert_eq!(p.short_authors(3), "A, B, C et al.");
        assert_eq!(p.short_authors(5), "A, B, C, D");
    }
}
