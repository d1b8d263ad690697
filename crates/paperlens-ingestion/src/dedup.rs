//! Processed-paper tracking.
//!
//! Discovery reports only PMIDs that are not already in the tracking file:
//!
//! ```json
//! { "processed_pmids": ["38012345", "..."], "last_updated": "2024-03-01T06:00:00Z" }
//! ```

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::models::{DateWindow, PaperMetadata};
use crate::sources::LiteratureSource;

#[derive(Debug, Default, Serialize, Deserialize)]
struct TrackingFile {
    #[serde(default)]
    processed_pmids: BTreeSet<String>,
    #[serde(default)]
    last_updated: Option<DateTime<Utc>>,
}

/// Set of PMIDs already handled, backed by a JSON file.
#[derive(Debug)]
pub struct ProcessedPapers {
    path: PathBuf,
    pmids: BTreeSet<String>,
    last_updated: Option<DateTime<Utc>>,
}

impl ProcessedPapers {
    /// Load the tracking file. A missing file is an empty set; an unreadable
    /// or corrupt one is logged and also treated as empty.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let parsed = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => match serde_json::from_str::<TrackingFile>(&raw) {
                Ok(file) => file,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Corrupt tracking file, starting empty");
                    TrackingFile::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => TrackingFile::default(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cannot read tracking file, starting empty");
                TrackingFile::default()
            }
        };

        Self {
            path,
            pmids: parsed.processed_pmids,
            last_updated: parsed.last_updated,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.pmids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pmids.is_empty()
    }

    pub fn contains(&self, pmid: &str) -> bool {
        self.pmids.contains(pmid)
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_updated
    }

    /// PMIDs not yet processed, in input order, without repeats.
    pub fn filter_new(&self, pmids: &[String]) -> Vec<String> {
        let mut seen = BTreeSet::new();
        let mut fresh = Vec::new();
        for pmid in pmids {
            if !self.pmids.contains(pmid) && seen.insert(pmid.as_str()) {
                fresh.push(pmid.clone());
            }
        }
        fresh
    }

    pub fn mark_processed<I, S>(&mut self, pmids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pmids.extend(pmids.into_iter().map(Into::into));
    }

    /// Write the set back, creating parent directories as needed.
    pub async fn save(&mut self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        self.last_updated = Some(Utc::now());
        let file = TrackingFile {
            processed_pmids: self.pmids.clone(),
            last_updated: self.last_updated,
        };
        let body = serde_json::to_string_pretty(&file)?;
        tokio::fs::write(&self.path, body)
            .await
            .with_context(|| format!("writing {}", self.path.display()))?;
        Ok(())
    }
}

/// Search `source` for papers published in the last `days_back` days and
/// return details only for those not yet in `tracker`. The tracker is not
/// modified.
pub async fn discover_new_papers(
    source: &dyn LiteratureSource,
    tracker: &ProcessedPapers,
    query: &str,
    max_results: usize,
    days_back: i64,
) -> Result<Vec<PaperMetadata>> {
    let window = DateWindow::last_days(days_back);
    let ids = source.search_ids(query, max_results, Some(window)).await?;
    let new_ids = tracker.filter_new(&ids);

    if new_ids.is_empty() {
        info!(query, total = ids.len(), "No new papers found");
        return Ok(Vec::new());
    }
    info!(query, new = new_ids.len(), total = ids.len(), source = source.name(), "New papers found");

    source.fetch_details(&new_ids).await
}
