//! S3 (or S3-compatible) storage.

use async_trait::async_trait;
use aws_sdk_s3::{
    config::{Credentials, Region},
    primitives::ByteStream,
    Client,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{check_destination, StorageAdapter, StorageError, StorageResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    pub bucket: String,

    /// AWS region, e.g. "us-east-1"
    pub region: String,

    /// Custom endpoint for MinIO or other S3-compatible stores
    pub endpoint: Option<String>,

    pub access_key_id: String,

    pub secret_access_key: String,

    /// Prepended to every key, e.g. "paperlens/"
    pub prefix: String,
}

impl S3Config {
    /// Config for `bucket` with credentials taken from the standard AWS
    /// environment variables.
    pub fn from_env(bucket: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            region: region.into(),
            endpoint: None,
            access_key_id: std::env::var("AWS_ACCESS_KEY_ID").unwrap_or_default(),
            secret_access_key: std::env::var("AWS_SECRET_ACCESS_KEY").unwrap_or_default(),
            prefix: String::new(),
        }
    }
}

pub struct S3Storage {
    client: Client,
    bucket: String,
    prefix: String,
}

impl S3Storage {
    pub fn new(config: S3Config) -> StorageResult<Self> {
        if config.bucket.trim().is_empty() {
            return Err(StorageError::InvalidConfig("S3 bucket name is empty".to_string()));
        }

        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "paperlens-storage",
        );

        let mut builder = aws_sdk_s3::Config::builder()
            .credentials_provider(credentials)
            .region(Region::new(config.region.clone()))
            .behavior_version_latest();

        if let Some(endpoint) = config.endpoint.filter(|e| !e.trim().is_empty()) {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Ok(Self {
            client: Client::from_conf(builder.build()),
            bucket: config.bucket,
            prefix: normalise_prefix(&config.prefix),
        })
    }

    fn full_key(&self, destination: &str) -> String {
        format!("{}{}", self.prefix, destination)
    }
}

/// "" stays empty; anything else ends with exactly one '/'.
fn normalise_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}/")
    }
}

#[async_trait]
impl StorageAdapter for S3Storage {
    async fn put(&self, destination: &str, bytes: Vec<u8>, content_type: &str) -> StorageResult<String> {
        check_destination(destination)?;
        let key = self.full_key(destination);
        let len = bytes.len();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| StorageError::S3(e.to_string()))?;

        debug!(bucket = %self.bucket, key = %key, bytes = len, "Uploaded object");
        Ok(format!("s3://{}/{}", self.bucket, key))
    }

    fn describe(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.prefix)
    }
}
