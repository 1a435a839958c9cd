// ABOUTME: The deployed VM and the manager that creates or finds it.
// ABOUTME: A VM pairs its cloud id with the agent running on it.

use super::error::DeployError;
use crate::agent::AgentClient;
use crate::cloud::Cloud;
use crate::config::{Repos, VmRepo};
use crate::manifest::DeploymentManifest;
use crate::stemcell::CloudStemcell;
use crate::types::{DiskCid, UuidGenerator, VmCid};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// The environment's VM.
#[derive(Clone)]
pub struct Vm {
    cid: VmCid,
    cloud: Option<Arc<dyn Cloud>>,
    agent: Arc<dyn AgentClient>,
    repo: VmRepo,
}

impl std::fmt::Debug for Vm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vm").field("cid", &self.cid).finish()
    }
}

impl Vm {
    pub fn new(
        cid: VmCid,
        cloud: Option<Arc<dyn Cloud>>,
        agent: Arc<dyn AgentClient>,
        repo: VmRepo,
    ) -> Self {
        Self {
            cid,
            cloud,
            agent,
            repo,
        }
    }

    pub fn cid(&self) -> &VmCid {
        &self.cid
    }

    pub fn agent(&self) -> &Arc<dyn AgentClient> {
        &self.agent
    }

    fn cloud(&self, operation: &'static str) -> Result<&Arc<dyn Cloud>, DeployError> {
        self.cloud
            .as_ref()
            .ok_or(DeployError::CloudUnavailable(operation))
    }

    pub async fn exists(&self) -> Result<bool, DeployError> {
        Ok(self.cloud("has_vm")?.has_vm(&self.cid).await?)
    }

    /// Ping the agent until it answers or `timeout` passes.
    pub async fn wait_until_ready(
        &self,
        timeout: Duration,
        delay: Duration,
    ) -> Result<(), DeployError> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.agent.ping().await {
                Ok(_) => return Ok(()),
                Err(e) if Instant::now() + delay < deadline => {
                    debug!(vm = %self.cid, error = %e, "agent not ready yet");
                    tokio::time::sleep(delay).await;
                }
                Err(source) => {
                    return Err(DeployError::AgentUnreachable {
                        vm: self.cid.to_string(),
                        timeout,
                        source,
                    });
                }
            }
        }
    }

    /// Run the drain scripts and wait as long as they ask.
    pub async fn drain(&self) -> Result<(), DeployError> {
        let mut wait = self.agent.drain("shutdown").await?;
        while wait < 0 {
            tokio::time::sleep(Duration::from_secs(wait.unsigned_abs())).await;
            wait = self.agent.drain("status").await?;
        }
        tokio::time::sleep(Duration::from_secs(wait.unsigned_abs())).await;
        Ok(())
    }

    pub async fn stop(&self) -> Result<(), DeployError> {
        Ok(self.agent.stop().await?)
    }

    pub async fn start(&self) -> Result<(), DeployError> {
        Ok(self.agent.start().await?)
    }

    pub async fn apply(&self, spec: &serde_json::Value) -> Result<(), DeployError> {
        Ok(self.agent.apply(spec).await?)
    }

    /// Poll the agent until its jobs report running.
    pub async fn wait_to_be_running(
        &self,
        max_attempts: u32,
        delay: Duration,
    ) -> Result<(), DeployError> {
        for attempt in 1..=max_attempts.max(1) {
            match self.agent.get_state().await {
                Ok(state) if state.is_running() => return Ok(()),
                Ok(state) => debug!(vm = %self.cid, attempt, job_state = %state.job_state, "jobs not running yet"),
                Err(e) => debug!(vm = %self.cid, attempt, error = %e, "getting agent state failed"),
            }
            tokio::time::sleep(delay).await;
        }
        Err(DeployError::JobsNotRunning {
            instance: self.cid.to_string(),
        })
    }

    /// Disks the agent reports as attached.
    pub async fn disks(&self) -> Result<Vec<DiskCid>, DeployError> {
        Ok(self.agent.list_disk().await?)
    }

    pub async fn attach_disk(&self, disk: &DiskCid) -> Result<(), DeployError> {
        self.cloud("attach_disk")?.attach_disk(&self.cid, disk).await?;
        // The agent may restart while it picks up the new disk.
        self.wait_until_ready(Duration::from_secs(600), Duration::from_millis(500))
            .await?;
        Ok(self.agent.mount_disk(disk).await?)
    }

    pub async fn detach_disk(&self, disk: &DiskCid) -> Result<(), DeployError> {
        self.cloud("detach_disk")?.detach_disk(&self.cid, disk).await?;
        Ok(())
    }

    pub async fn unmount_disk(&self, disk: &DiskCid) -> Result<(), DeployError> {
        Ok(self.agent.unmount_disk(disk).await?)
    }

    pub async fn migrate_disk(&self) -> Result<(), DeployError> {
        Ok(self.agent.migrate_disk().await?)
    }

    /// Delete the VM in the cloud and forget it.
    pub async fn delete(&self) -> Result<(), DeployError> {
        let result = self.cloud("delete_vm")?.delete_vm(&self.cid).await;
        // A VM the cloud no longer knows about is gone either way.
        if result.as_ref().is_ok() || result.as_ref().is_err_and(|e| e.is_vm_not_found()) {
            self.repo.clear_current()?;
        }
        Ok(result?)
    }
}

#[async_trait]
pub trait VmManager: Send + Sync {
    async fn find_current(&self) -> Result<Option<Vm>, DeployError>;

    async fn create(
        &self,
        stemcell: &CloudStemcell,
        manifest: &DeploymentManifest,
        disk_cids: &[DiskCid],
    ) -> Result<Vm, DeployError>;
}

pub trait VmManagerFactory: Send + Sync {
    fn new_manager(
        &self,
        cloud: Arc<dyn Cloud>,
        agent: Arc<dyn AgentClient>,
    ) -> Arc<dyn VmManager>;
}

pub struct CloudVmManager {
    cloud: Arc<dyn Cloud>,
    agent: Arc<dyn AgentClient>,
    repo: VmRepo,
    uuid: Arc<dyn UuidGenerator>,
}

impl CloudVmManager {
    pub fn new(
        cloud: Arc<dyn Cloud>,
        agent: Arc<dyn AgentClient>,
        repo: VmRepo,
        uuid: Arc<dyn UuidGenerator>,
    ) -> Self {
        Self {
            cloud,
            agent,
            repo,
            uuid,
        }
    }

    fn vm(&self, cid: VmCid) -> Vm {
        Vm::new(
            cid,
            Some(Arc::clone(&self.cloud)),
            Arc::clone(&self.agent),
            self.repo.clone(),
        )
    }
}

#[async_trait]
impl VmManager for CloudVmManager {
    async fn find_current(&self) -> Result<Option<Vm>, DeployError> {
        Ok(self.repo.find_current()?.map(|cid| self.vm(cid)))
    }

    async fn create(
        &self,
        stemcell: &CloudStemcell,
        manifest: &DeploymentManifest,
        disk_cids: &[DiskCid],
    ) -> Result<Vm, DeployError> {
        let job = manifest
            .job()
            .ok_or(DeployError::JobCount(manifest.jobs.len()))?;
        let networks = manifest.network_interfaces(&job.name)?;
        let pool = manifest.resource_pool(&job.resource_pool).cloned().unwrap_or_default();
        let agent_id = self.uuid.generate();

        let cid = self
            .cloud
            .create_vm(
                &agent_id,
                &stemcell.cid,
                &pool.cloud_properties,
                &networks,
                disk_cids,
                &pool.env,
            )
            .await?;
        // Record immediately so a later failure does not leak the VM.
        self.repo.update_current(&cid)?;

        let mut metadata = BTreeMap::from([
            ("deployment".to_string(), manifest.name.clone()),
            ("job".to_string(), job.name.clone()),
            ("instance_group".to_string(), job.name.clone()),
            ("index".to_string(), "0".to_string()),
            ("name".to_string(), format!("{}/0", job.name)),
            ("director".to_string(), "bosh-env".to_string()),
            ("created_at".to_string(), chrono::Utc::now().to_rfc3339()),
        ]);
        metadata.extend(manifest.tags.clone());
        self.cloud.set_vm_metadata(&cid, &metadata).await?;

        Ok(self.vm(cid))
    }
}

/// Builds repo-backed VM managers.
pub struct RepoVmManagerFactory {
    repos: Repos,
    uuid: Arc<dyn UuidGenerator>,
}

impl RepoVmManagerFactory {
    pub fn new(repos: Repos, uuid: Arc<dyn UuidGenerator>) -> Self {
        Self { repos, uuid }
    }
}

impl VmManagerFactory for RepoVmManagerFactory {
    fn new_manager(
        &self,
        cloud: Arc<dyn Cloud>,
        agent: Arc<dyn AgentClient>,
    ) -> Arc<dyn VmManager> {
        Arc::new(CloudVmManager::new(
            cloud,
            agent,
            self.repos.vms.clone(),
            Arc::clone(&self.uuid),
        ))
    }
}
