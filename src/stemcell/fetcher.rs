// ABOUTME: Resolves the manifest's stemcell to an extracted stemcell.
// ABOUTME: The production fetcher goes through the tarball provider.

use super::error::StemcellError;
use super::extracted::ExtractedStemcell;
use super::reader::StemcellReader;
use crate::manifest::DeploymentManifest;
use crate::stage::Stage;
use crate::tarball::{TarballProvider, TarballSource};
use crate::types::TempRoot;
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait StemcellFetcher: Send + Sync {
    async fn get_stemcell(
        &self,
        manifest: &DeploymentManifest,
        temp_root: &TempRoot,
        stage: &Stage,
    ) -> Result<ExtractedStemcell, StemcellError>;
}

pub struct TarballStemcellFetcher {
    provider: Arc<TarballProvider>,
}

impl TarballStemcellFetcher {
    pub fn new(provider: Arc<TarballProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl StemcellFetcher for TarballStemcellFetcher {
    async fn get_stemcell(
        &self,
        manifest: &DeploymentManifest,
        temp_root: &TempRoot,
        stage: &Stage,
    ) -> Result<ExtractedStemcell, StemcellError> {
        let stemcell = manifest.stemcell().ok_or(StemcellError::NoStemcell)?;
        let source = TarballSource::new(&stemcell.url, stemcell.sha1.clone(), "stemcell");
        let tarball = self.provider.get(&source, stage).await?;

        stage
            .perform("Validating stemcell", || async move {
                let reader = StemcellReader::new(temp_root.clone());
                let path = tarball.clone();
                tokio::task::spawn_blocking(move || reader.read(&path))
                    .await
                    .map_err(|e| StemcellError::Extraction {
                        path: tarball,
                        message: e.to_string(),
                    })?
            })
            .await
    }
}
