//! services/api/src/adapters/storage.rs
//!
//! This module contains the blob-storage adapter, which implements the
//! `BlobStore` port from the `core` crate against any S3-compatible
//! object store.

use async_trait::async_trait;
use aws_config::Region;
use aws_credential_types::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use uuid::Uuid;

use cohort_core::ports::{BlobStore, PortError, PortResult};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `BlobStore` port using an S3 bucket.
#[derive(Clone)]
pub struct S3BlobStore {
    bucket: String,
    public_base_url: String,
    client: aws_sdk_s3::Client,
}

impl S3BlobStore {
    /// Creates a new `S3BlobStore`.
    pub fn new(
        bucket: String,
        region: String,
        endpoint: Option<String>,
        credentials: Credentials,
        public_base_url: String,
    ) -> Self {
        let config = if let Some(endpoint) = endpoint {
            aws_sdk_s3::config::Builder::new().endpoint_url(endpoint)
        } else {
            aws_sdk_s3::config::Builder::new()
        }
        .region(Region::new(region))
        .credentials_provider(credentials)
        .force_path_style(true)
        .build();

        let client = aws_sdk_s3::Client::from_conf(config);

        Self {
            bucket,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    fn key_for(&self, url: &str) -> PortResult<String> {
        url.strip_prefix(&self.public_base_url)
            .map(|key| key.trim_start_matches('/').to_string())
            .ok_or_else(|| PortError::Unexpected(format!("url {} is not in this store", url)))
    }
}

//=========================================================================================
// `BlobStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn upload(&self, data: Vec<u8>, namespace: &str, filename: &str) -> PortResult<String> {
        let key = format!("{}/{}-{}", namespace, Uuid::new_v4(), filename);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| PortError::Unavailable(e.to_string()))?;
        Ok(format!("{}/{}", self.public_base_url, key))
    }

    async fn remove(&self, url: &str) -> PortResult<()> {
        let key = self.key_for(url)?;
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| PortError::Unavailable(e.to_string()))?;
        Ok(())
    }
}
