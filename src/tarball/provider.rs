// ABOUTME: Resolves release and stemcell sources to local tarball paths.
// ABOUTME: file:// is used in place; http(s):// is downloaded, verified, and cached.

use super::cache::TarballCache;
use super::error::TarballError;
use crate::stage::Stage;
use crate::types::Digest;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

const DEFAULT_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Where a tarball comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TarballSource {
    pub url: String,
    pub checksum: Option<String>,
    /// Used in step names, e.g. "release 'bosh'".
    pub description: String,
}

impl TarballSource {
    pub fn new(
        url: impl Into<String>,
        checksum: Option<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            checksum,
            description: description.into(),
        }
    }
}

pub struct TarballProvider {
    cache: TarballCache,
    http: reqwest::Client,
    attempts: u32,
    retry_delay: Duration,
}

impl TarballProvider {
    pub fn new(cache: TarballCache, http: reqwest::Client) -> Self {
        Self {
            cache,
            http,
            attempts: DEFAULT_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    pub fn with_retry(mut self, attempts: u32, retry_delay: Duration) -> Self {
        self.attempts = attempts.max(1);
        self.retry_delay = retry_delay;
        self
    }

    /// Local path of the tarball for `source`, downloading it if needed.
    pub async fn get(&self, source: &TarballSource, stage: &Stage) -> Result<PathBuf, TarballError> {
        if let Some(path) = source.url.strip_prefix("file://") {
            let path = PathBuf::from(path);
            if !path.is_file() {
                return Err(TarballError::NotFound(path));
            }
            return Ok(path);
        }

        if !(source.url.starts_with("http://") || source.url.starts_with("https://")) {
            return Err(TarballError::InvalidUrl(source.url.clone()));
        }

        let checksum = source
            .checksum
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| TarballError::MissingChecksum(source.url.clone()))?;
        let digest = Digest::parse(checksum).map_err(|e| TarballError::InvalidChecksum {
            url: source.url.clone(),
            source: e,
        })?;

        if let Some(path) = self.cache.get(&digest) {
            debug!(url = %source.url, path = %path.display(), "using cached tarball");
            return Ok(path);
        }

        let url = source.url.as_str();
        let digest = &digest;
        stage
            .perform(format!("Downloading {}", source.description), || async move {
                let mut attempt = 1;
                loop {
                    match self.download(url, digest).await {
                        Ok(path) => return Ok(path),
                        Err(e) if attempt < self.attempts => {
                            warn!(url, attempt, error = %e, "download failed, retrying");
                            tokio::time::sleep(self.retry_delay).await;
                            attempt += 1;
                        }
                        Err(e) => return Err(e),
                    }
                }
            })
            .await
    }

    async fn download(&self, url: &str, digest: &Digest) -> Result<PathBuf, TarballError> {
        tokio::fs::create_dir_all(self.cache.dir()).await?;
        let tmp = self
            .cache
            .dir()
            .join(format!("download-{}", uuid::Uuid::new_v4().simple()));

        let result = self.fetch_to(url, &tmp).await;
        if let Err(e) = result {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e);
        }

        let actual = Digest::of_file(digest.algorithm(), &tmp)?;
        if actual.hex() != digest.hex() {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(TarballError::ChecksumMismatch {
                path: tmp,
                expected: digest.to_string(),
                actual: actual.to_string(),
            });
        }

        Ok(self.cache.save(digest, &tmp)?)
    }

    async fn fetch_to(&self, url: &str, dest: &Path) -> Result<(), TarballError> {
        let http_err = |source| TarballError::Http {
            url: url.to_string(),
            source,
        };

        let response = self.http.get(url).send().await.map_err(http_err)?;
        let status = response.status();
        if !status.is_success() {
            return Err(TarballError::Status {
                url: url.to_string(),
                status,
            });
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            file.write_all(&chunk.map_err(http_err)?).await?;
        }
        file.flush().await?;
        Ok(())
    }
}
