// ABOUTME: The deployed environment and the manager that finds it from state.
// ABOUTME: Deletes, starts, and stops the deployment; cleans up unused resources.

use super::disk::{delete_disk, delete_unused_disks};
use super::error::DeployError;
use super::instance::Instance;
use super::vm::Vm;
use crate::agent::AgentClient;
use crate::blobstore::Blobstore;
use crate::cloud::Cloud;
use crate::config::{DiskRecord, Repos};
use crate::manifest::Update;
use crate::stage::Stage;
use crate::stemcell::{CloudStemcell, CloudStemcellManager, StemcellManager};
use async_trait::async_trait;
use std::sync::Arc;

/// The job name is not persisted, so instances found from state go by this.
pub const UNKNOWN_JOB_NAME: &str = "unknown";

#[async_trait]
pub trait Deployment: Send + Sync {
    /// Delete the instances, then their disks, then their stemcells.
    async fn delete(&self, skip_drain: bool, stage: &Stage) -> Result<(), DeployError>;

    async fn start(&self, stage: &Stage, update: &Update) -> Result<(), DeployError>;

    async fn stop(&self, skip_drain: bool, stage: &Stage) -> Result<(), DeployError>;
}

#[async_trait]
pub trait DeploymentManager: Send + Sync {
    async fn find_current(&self) -> Result<Option<Arc<dyn Deployment>>, DeployError>;

    /// Delete disks and stemcells no longer referenced by the current deployment.
    async fn cleanup(&self, stage: &Stage) -> Result<(), DeployError>;
}

pub trait DeploymentManagerFactory: Send + Sync {
    /// Start and stop only talk to the agent, so the cloud and blobstore are optional.
    fn new_manager(
        &self,
        cloud: Option<Arc<dyn Cloud>>,
        agent: Arc<dyn AgentClient>,
        blobstore: Option<Arc<dyn Blobstore>>,
    ) -> Arc<dyn DeploymentManager>;
}

/// An environment made of instances, their persistent disks, and stemcells.
pub struct CloudDeployment {
    instances: Vec<Instance>,
    disks: Vec<DiskRecord>,
    stemcells: Vec<CloudStemcell>,
    cloud: Option<Arc<dyn Cloud>>,
    repos: Repos,
}

impl CloudDeployment {
    pub fn new(
        instances: Vec<Instance>,
        disks: Vec<DiskRecord>,
        stemcells: Vec<CloudStemcell>,
        cloud: Option<Arc<dyn Cloud>>,
        repos: Repos,
    ) -> Self {
        Self {
            instances,
            disks,
            stemcells,
            cloud,
            repos,
        }
    }

    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    fn cloud(&self, operation: &'static str) -> Result<&dyn Cloud, DeployError> {
        self.cloud
            .as_deref()
            .ok_or(DeployError::CloudUnavailable(operation))
    }

    async fn delete_stemcell(
        &self,
        stemcell: &CloudStemcell,
        stage: &Stage,
    ) -> Result<(), DeployError> {
        let cloud = self.cloud("delete_stemcell")?;
        let repo = &self.repos.stemcells;
        stage
            .perform_skippable(
                format!("Deleting stemcell '{}'", stemcell.cid),
                || async move {
                    let skipped = match cloud.delete_stemcell(&stemcell.cid).await {
                        Ok(()) => None,
                        Err(e) if e.is_stemcell_not_found() => {
                            Some("Stemcell not found".to_string())
                        }
                        Err(e) => return Err(DeployError::from(e)),
                    };
                    repo.delete(&stemcell.id)?;
                    Ok(skipped)
                },
            )
            .await
    }
}

#[async_trait]
impl Deployment for CloudDeployment {
    async fn delete(&self, skip_drain: bool, stage: &Stage) -> Result<(), DeployError> {
        for instance in &self.instances {
            instance.delete(skip_drain, stage).await?;
        }
        for disk in &self.disks {
            delete_disk(self.cloud("delete_disk")?, &self.repos.disks, disk, stage).await?;
        }
        for stemcell in &self.stemcells {
            self.delete_stemcell(stemcell, stage).await?;
        }
        Ok(())
    }

    async fn start(&self, stage: &Stage, update: &Update) -> Result<(), DeployError> {
        for instance in &self.instances {
            instance.start(update, stage).await?;
        }
        Ok(())
    }

    async fn stop(&self, skip_drain: bool, stage: &Stage) -> Result<(), DeployError> {
        for instance in &self.instances {
            instance.shutdown(skip_drain, stage).await?;
        }
        Ok(())
    }
}

pub struct StateDeploymentManager {
    cloud: Option<Arc<dyn Cloud>>,
    agent: Arc<dyn AgentClient>,
    repos: Repos,
}

impl StateDeploymentManager {
    pub fn new(cloud: Option<Arc<dyn Cloud>>, agent: Arc<dyn AgentClient>, repos: Repos) -> Self {
        Self {
            cloud,
            agent,
            repos,
        }
    }
}

#[async_trait]
impl DeploymentManager for StateDeploymentManager {
    async fn find_current(&self) -> Result<Option<Arc<dyn Deployment>>, DeployError> {
        let instances: Vec<_> = self
            .repos
            .vms
            .find_current()?
            .map(|cid| {
                let vm = Vm::new(
                    cid,
                    self.cloud.clone(),
                    Arc::clone(&self.agent),
                    self.repos.vms.clone(),
                );
                Instance::new(UNKNOWN_JOB_NAME, 0, vm)
            })
            .into_iter()
            .collect();
        let disks: Vec<_> = self.repos.disks.find_current()?.into_iter().collect();
        let stemcells: Vec<CloudStemcell> = self
            .repos
            .stemcells
            .find_current()?
            .into_iter()
            .map(Into::into)
            .collect();

        if instances.is_empty() && disks.is_empty() && stemcells.is_empty() {
            return Ok(None);
        }
        Ok(Some(Arc::new(CloudDeployment::new(
            instances,
            disks,
            stemcells,
            self.cloud.clone(),
            self.repos.clone(),
        ))))
    }

    async fn cleanup(&self, stage: &Stage) -> Result<(), DeployError> {
        let cloud = self
            .cloud
            .clone()
            .ok_or(DeployError::CloudUnavailable("cleanup"))?;
        delete_unused_disks(cloud.as_ref(), &self.repos.disks, stage).await?;
        CloudStemcellManager::new(self.repos.stemcells.clone(), cloud)
            .delete_unused(stage)
            .await?;
        Ok(())
    }
}

/// Builds managers over the deployment state repos.
#[derive(Clone)]
pub struct StateDeploymentManagerFactory {
    repos: Repos,
}

impl StateDeploymentManagerFactory {
    pub fn new(repos: Repos) -> Self {
        Self { repos }
    }
}

impl DeploymentManagerFactory for StateDeploymentManagerFactory {
    fn new_manager(
        &self,
        cloud: Option<Arc<dyn Cloud>>,
        agent: Arc<dyn AgentClient>,
        // Finding, stopping, starting and deleting never upload to the agent,
        // so deployments built from state have no use for the blobstore.
        _blobstore: Option<Arc<dyn Blobstore>>,
    ) -> Arc<dyn DeploymentManager> {
        Arc::new(StateDeploymentManager::new(cloud, agent, self.repos.clone()))
    }
}
