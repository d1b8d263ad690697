//! Serialisation helpers and result file names.

use chrono::NaiveDate;
use serde::Serialize;

use crate::{StorageAdapter, StorageResult};

/// File names for one run, keyed by the LLM provider that produced them so
/// runs against different providers can sit side by side.
#[derive(Debug, Clone)]
pub struct OutputNames {
    provider: String,
}

impl OutputNames {
    pub fn new(provider: impl Into<String>) -> Self {
        Self { provider: provider.into() }
    }

    pub fn paper_summaries_json(&self) -> String {
        format!("paper_summaries_{}.json", self.provider)
    }

    pub fn paper_summaries_csv(&self) -> String {
        format!("paper_summaries_{}.csv", self.provider)
    }

    pub fn aggregated_json(&self) -> String {
        format!("biomarkers_aggregated_{}.json", self.provider)
    }

    pub fn aggregated_csv(&self) -> String {
        format!("biomarkers_aggregated_{}.csv", self.provider)
    }

    pub fn high_confidence_json(&self) -> String {
        format!("high_confidence_associations_{}.json", self.provider)
    }

    /// Plain text extracted from `pdf_stem`.pdf.
    pub fn extracted_text(pdf_stem: &str) -> String {
        format!("extracted_texts/{pdf_stem}.txt")
    }

    pub fn new_papers(day: NaiveDate) -> String {
        format!("new_papers_{}.json", day.format("%Y%m%d"))
    }
}

/// Pretty-printed JSON.
pub async fn write_json<T: Serialize + ?Sized>(
    storage: &dyn StorageAdapter,
    destination: &str,
    value: &T,
) -> StorageResult<String> {
    let bytes = serde_json::to_vec_pretty(value)?;
    storage.put(destination, bytes, "application/json").await
}

/// CSV with a header row taken from `T`'s field names. `headers` is
/// written instead when `rows` is empty, so it must list those same names.
pub async fn write_csv<T: Serialize>(
    storage: &dyn StorageAdapter,
    destination: &str,
    headers: &[&str],
    rows: &[T],
) -> StorageResult<String> {
    let bytes = csv_bytes(headers, rows)?;
    storage.put(destination, bytes, "text/csv").await
}

pub async fn write_text(storage: &dyn StorageAdapter, destination: &str, text: &str) -> StorageResult<String> {
    storage
        .put(destination, text.as_bytes().to_vec(), "text/plain; charset=utf-8")
        .await
}

fn csv_bytes<T: Serialize>(headers: &[&str], rows: &[T]) -> StorageResult<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    if rows.is_empty() {
        writer.write_record(headers)?;
    }
    for row in rows {
        writer.serialize(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| crate::StorageError::Csv(e.to_string()))
}
