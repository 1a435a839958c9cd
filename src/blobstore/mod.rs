// ABOUTME: Blob storage on the agent, reached through the message bus.
// ABOUTME: DAV-style PUT, GET, and DELETE on <mbus>/blobs/<id>.

use crate::types::MbusUrl;
use async_trait::async_trait;
use futures::StreamExt;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::debug;

#[derive(Debug, Error)]
pub enum BlobstoreError {
    #[error("Invalid blobstore URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },

    #[error("Blobstore request for '{blob_id}' failed: {source}")]
    Http {
        blob_id: String,
        source: reqwest::Error,
    },

    #[error("Blobstore responded to '{blob_id}' with status {status}")]
    Status {
        blob_id: String,
        status: reqwest::StatusCode,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait Blobstore: Send + Sync {
    /// Download `blob_id` to `dest`.
    async fn get(&self, blob_id: &str, dest: &Path) -> Result<(), BlobstoreError>;

    /// Upload `source` and return the new blob id.
    async fn add(&self, source: &Path) -> Result<String, BlobstoreError>;

    async fn delete(&self, blob_id: &str) -> Result<(), BlobstoreError>;
}

pub trait BlobstoreFactory: Send + Sync {
    fn create(
        &self,
        mbus_url: &str,
        http: reqwest::Client,
    ) -> Result<Arc<dyn Blobstore>, BlobstoreError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DavBlobstoreFactory;

impl BlobstoreFactory for DavBlobstoreFactory {
    fn create(
        &self,
        mbus_url: &str,
        http: reqwest::Client,
    ) -> Result<Arc<dyn Blobstore>, BlobstoreError> {
        let mbus = MbusUrl::parse(mbus_url).map_err(|source| BlobstoreError::InvalidUrl {
            url: mbus_url.to_string(),
            source,
        })?;
        Ok(Arc::new(DavBlobstore { http, mbus }))
    }
}

/// HTTP client for bootstrap endpoints, which present self-signed certificates.
pub fn insecure_http_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .danger_accept_invalid_certs(true)
        .build()
}

pub struct DavBlobstore {
    http: reqwest::Client,
    mbus: MbusUrl,
}

impl DavBlobstore {
    fn blob_url(&self, blob_id: &str) -> String {
        self.mbus.join(&format!("blobs/{blob_id}"))
    }

    fn check(
        blob_id: &str,
        result: Result<reqwest::Response, reqwest::Error>,
    ) -> Result<reqwest::Response, BlobstoreError> {
        let response = result.map_err(|source| BlobstoreError::Http {
            blob_id: blob_id.to_string(),
            source,
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(BlobstoreError::Status {
                blob_id: blob_id.to_string(),
                status,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl Blobstore for DavBlobstore {
    async fn get(&self, blob_id: &str, dest: &Path) -> Result<(), BlobstoreError> {
        let request = self.mbus.authorize(self.http.get(self.blob_url(blob_id)));
        let response = Self::check(blob_id, request.send().await)?;

        let mut file = tokio::fs::File::create(dest).await?;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|source| BlobstoreError::Http {
                blob_id: blob_id.to_string(),
                source,
            })?;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        Ok(())
    }

    async fn add(&self, source: &Path) -> Result<String, BlobstoreError> {
        let blob_id = uuid::Uuid::new_v4().to_string();
        let contents = tokio::fs::read(source).await?;
        let request = self
            .mbus
            .authorize(self.http.put(self.blob_url(&blob_id)))
            .body(contents);
        Self::check(&blob_id, request.send().await)?;
        debug!(blob_id, source = %source.display(), "uploaded blob");
        Ok(blob_id)
    }

    async fn delete(&self, blob_id: &str) -> Result<(), BlobstoreError> {
        let request = self.mbus.authorize(self.http.delete(self.blob_url(blob_id)));
        match Self::check(blob_id, request.send().await) {
            Err(BlobstoreError::Status { status, .. }) if status == reqwest::StatusCode::NOT_FOUND => {
                Ok(())
            }
            other => other.map(drop),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_urls_drop_credentials() {
        let dav = DavBlobstore {
            http: reqwest::Client::new(),
            mbus: MbusUrl::parse("https://user:pw@10.0.0.6:6868").unwrap(),
        };
        assert_eq!(dav.blob_url("abc"), "https://10.0.0.6:6868/blobs/abc");
    }

    #[test]
    fn invalid_url_is_rejected() {
        let result = DavBlobstoreFactory.create("not a url", reqwest::Client::new());
        assert!(matches!(result, Err(BlobstoreError::InvalidUrl { .. })));
    }
}
