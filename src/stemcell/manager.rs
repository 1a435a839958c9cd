// ABOUTME: Uploads stemcells to the cloud and removes unused ones.
// ABOUTME: Uploaded stemcells are recorded in the deployment state.

use super::error::StemcellError;
use super::extracted::ExtractedStemcell;
use crate::cloud::Cloud;
use crate::config::{StemcellRecord, StemcellRepo};
use crate::stage::Stage;
use crate::types::StemcellCid;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

/// A stemcell known to the cloud.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudStemcell {
    pub id: String,
    pub cid: StemcellCid,
    pub name: String,
    pub version: String,
    pub api_version: u32,
}

impl From<StemcellRecord> for CloudStemcell {
    fn from(record: StemcellRecord) -> Self {
        Self {
            id: record.id,
            cid: StemcellCid::new(record.cid),
            name: record.name,
            version: record.version,
            api_version: record.api_version,
        }
    }
}

#[async_trait]
pub trait StemcellManager: Send + Sync {
    /// Upload `stemcell` unless a stemcell with its name and version is
    /// already recorded.
    async fn upload(
        &self,
        stemcell: &ExtractedStemcell,
        stage: &Stage,
    ) -> Result<CloudStemcell, StemcellError>;

    /// Delete every recorded stemcell other than the current one.
    async fn delete_unused(&self, stage: &Stage) -> Result<(), StemcellError>;
}

pub trait StemcellManagerFactory: Send + Sync {
    fn new_manager(&self, cloud: Arc<dyn Cloud>) -> Arc<dyn StemcellManager>;
}

pub struct CloudStemcellManager {
    repo: StemcellRepo,
    cloud: Arc<dyn Cloud>,
}

impl CloudStemcellManager {
    pub fn new(repo: StemcellRepo, cloud: Arc<dyn Cloud>) -> Self {
        Self { repo, cloud }
    }
}

#[async_trait]
impl StemcellManager for CloudStemcellManager {
    async fn upload(
        &self,
        stemcell: &ExtractedStemcell,
        stage: &Stage,
    ) -> Result<CloudStemcell, StemcellError> {
        let manifest = stemcell.manifest();
        let step = format!("Uploading stemcell '{}/{}'", manifest.name, manifest.version);

        if let Some(record) = self.repo.find(&manifest.name, &manifest.version)? {
            stage.skip(step, "Stemcell already uploaded");
            return Ok(record.into());
        }

        stage
            .perform(step, || async move {
                let cid = self
                    .cloud
                    .create_stemcell(&stemcell.image_path(), &manifest.cloud_properties)
                    .await
                    .map_err(|source| StemcellError::Create {
                        name: manifest.name.clone(),
                        version: manifest.version.clone(),
                        source,
                    })?;
                let record = self.repo.save(
                    &manifest.name,
                    &manifest.version,
                    stemcell.api_version(),
                    &cid,
                )?;
                Ok(record.into())
            })
            .await
    }

    async fn delete_unused(&self, stage: &Stage) -> Result<(), StemcellError> {
        let current = self.repo.find_current()?.map(|r| r.id);
        let unused: Vec<_> = self
            .repo
            .all()?
            .into_iter()
            .filter(|r| Some(&r.id) != current.as_ref())
            .collect();

        for record in &unused {
            stage
                .perform(format!("Deleting unused stemcell '{}'", record.cid), || async move {
                    let cid = StemcellCid::new(record.cid.as_str());
                    match self.cloud.delete_stemcell(&cid).await {
                        Ok(()) => {}
                        Err(e) if e.is_stemcell_not_found() => {
                            warn!(cid = %cid, "stemcell already gone from the cloud");
                        }
                        Err(source) => {
                            return Err(StemcellError::Delete {
                                cid: record.cid.clone(),
                                source,
                            });
                        }
                    }
                    self.repo.delete(&record.id)?;
                    Ok(())
                })
                .await?;
        }
        Ok(())
    }
}

/// Builds repo-backed stemcell managers.
#[derive(Clone)]
pub struct RepoStemcellManagerFactory {
    repo: StemcellRepo,
}

impl RepoStemcellManagerFactory {
    pub fn new(repo: StemcellRepo) -> Self {
        Self { repo }
    }
}

impl StemcellManagerFactory for RepoStemcellManagerFactory {
    fn new_manager(&self, cloud: Arc<dyn Cloud>) -> Arc<dyn StemcellManager> {
        Arc::new(CloudStemcellManager::new(self.repo.clone(), cloud))
    }
}
