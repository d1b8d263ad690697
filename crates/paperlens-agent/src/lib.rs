//! paperlens-agent — Batch orchestration behind the `paperlens` binary.

pub mod config;
pub mod discover;
pub mod notify;
pub mod pipeline;

use std::sync::Arc;

use paperlens_storage::{LocalStorage, StorageAdapter};

use crate::config::{Config, StorageBackend};

/// Storage adapter for the configured backend. Local output lands in
/// `processing.output_dir`.
pub fn build_storage(config: &Config) -> anyhow::Result<Arc<dyn StorageAdapter>> {
    match config.storage.backend {
        StorageBackend::Local => Ok(Arc::new(LocalStorage::new(&config.processing.output_dir))),
        StorageBackend::S3    => build_s3(config),
    }
}

#[cfg(feature = "s3")]
fn build_s3(config: &Config) -> anyhow::Result<Arc<dyn StorageAdapter>> {
    use paperlens_storage::{S3Config, S3Storage};

    let mut s3 = S3Config::from_env(&config.storage.bucket, &config.storage.region);
    s3.prefix = config.storage.prefix.clone();
    s3.endpoint = config.storage.endpoint.clone();
    Ok(Arc::new(S3Storage::new(s3)?))
}

#[cfg(not(feature = "s3"))]
fn build_s3(_config: &Config) -> anyhow::Result<Arc<dyn StorageAdapter>> {
    anyhow::bail!("storage.backend = \"s3\" needs paperlens built with the `s3` feature")
}
