//! Local directory storage.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::{check_destination, StorageAdapter, StorageResult};

pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl StorageAdapter for LocalStorage {
    async fn put(&self, destination: &str, bytes: Vec<u8>, _content_type: &str) -> StorageResult<String> {
        check_destination(destination)?;
        let path = self.root.join(destination);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let len = bytes.len();
        tokio::fs::write(&path, bytes).await?;
        debug!(path = %path.display(), bytes = len, "Wrote file");
        Ok(path.display().to_string())
    }

    fn describe(&self) -> String {
        format!("local directory {}", self.root.display())
    }
}
