//! paperlens-storage — Where result files end up.
//!
//! Every export goes through a `StorageAdapter`, so the pipeline writes the
//! same bytes whether the destination is a local directory or an S3 bucket:
//! - **LocalStorage**: files under a root directory
//! - **S3Storage** (feature `s3`): objects under an optional key prefix
//!
//! `output` holds the serialisation helpers and the file naming scheme.

use async_trait::async_trait;
use thiserror::Error;

pub mod local;
pub mod output;
#[cfg(feature = "s3")]
pub mod s3;

pub use local::LocalStorage;
pub use output::{write_csv, write_json, write_text, OutputNames};
#[cfg(feature = "s3")]
pub use s3::{S3Config, S3Storage};

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("S3 error: {0}")]
    S3(String),

    #[error("Invalid destination: {0}")]
    InvalidDestination(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}

impl From<csv::Error> for StorageError {
    fn from(e: csv::Error) -> Self {
        StorageError::Csv(e.to_string())
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Write-only sink for result files.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Store `bytes` at `destination`, a relative slash-separated path.
    /// Returns where the data landed (file path or `s3://` URI).
    async fn put(&self, destination: &str, bytes: Vec<u8>, content_type: &str) -> StorageResult<String>;

    /// Human-readable location, for logs and reports.
    fn describe(&self) -> String;
}

/// Reject destinations that could escape the storage root.
pub(crate) fn check_destination(destination: &str) -> StorageResult<()> {
    let bad = destination.is_empty()
        || destination.starts_with('/')
        || destination.starts_with('\\')
        || destination.split(['/', '\\']).any(|part| part == "..");
    if bad {
        return Err(StorageError::InvalidDestination(destination.to_string()));
    }
    Ok(())
}
