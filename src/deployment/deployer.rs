// ABOUTME: Replaces the environment's VM with a fresh one from the uploaded stemcell.
// ABOUTME: Deletes the old instance, creates the VM and disk, then applies the jobs.

use super::disk::DiskDeployer;
use super::error::DeployError;
use super::instance::{Instance, PING_DELAY};
use super::manager::{CloudDeployment, Deployment, UNKNOWN_JOB_NAME};
use super::vm::{Vm, VmManager};
use crate::blobstore::Blobstore;
use crate::cloud::Cloud;
use crate::config::Repos;
use crate::installation::JobRenderer;
use crate::manifest::{DeploymentManifest, Job};
use crate::release::ReleaseManager;
use crate::stage::Stage;
use crate::stemcell::CloudStemcell;
use crate::tarball::create_tgz;
use crate::types::{Digest, DigestAlgorithm, DiskCid, TempRoot};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// How long a freshly created VM's agent gets to come up.
const AGENT_READY_TIMEOUT: Duration = Duration::from_secs(600);

#[async_trait]
pub trait Deployer: Send + Sync {
    #[allow(clippy::too_many_arguments)]
    async fn deploy(
        &self,
        cloud: Arc<dyn Cloud>,
        manifest: &DeploymentManifest,
        stemcell: &CloudStemcell,
        vm_manager: Arc<dyn VmManager>,
        blobstore: Arc<dyn Blobstore>,
        skip_drain: bool,
        disk_cids: &[DiskCid],
        temp_root: &TempRoot,
        stage: &Stage,
    ) -> Result<Arc<dyn Deployment>, DeployError>;
}

pub struct CloudDeployer {
    repos: Repos,
    releases: ReleaseManager,
    renderer: Arc<dyn JobRenderer>,
    recreate_persistent_disks: bool,
}

impl CloudDeployer {
    pub fn new(
        repos: Repos,
        releases: ReleaseManager,
        renderer: Arc<dyn JobRenderer>,
        recreate_persistent_disks: bool,
    ) -> Self {
        Self {
            repos,
            releases,
            renderer,
            recreate_persistent_disks,
        }
    }

    async fn delete_existing(
        &self,
        vm_manager: &dyn VmManager,
        skip_drain: bool,
        stage: &Stage,
    ) -> Result<(), DeployError> {
        if let Some(vm) = vm_manager.find_current().await? {
            Instance::new(UNKNOWN_JOB_NAME, 0, vm)
                .delete(skip_drain, stage)
                .await?;
        }
        Ok(())
    }

    async fn create_vm(
        &self,
        job: &Job,
        manifest: &DeploymentManifest,
        stemcell: &CloudStemcell,
        vm_manager: &dyn VmManager,
        disk_cids: &[DiskCid],
        stage: &Stage,
    ) -> Result<Vm, DeployError> {
        let step = format!(
            "Creating VM for instance '{}/0' from stemcell '{}'",
            job.name, stemcell.cid
        );
        let vm = stage
            .perform(step, || async move {
                let vm = vm_manager.create(stemcell, manifest, disk_cids).await?;
                self.repos.stemcells.update_current(&stemcell.id)?;
                Ok::<_, DeployError>(vm)
            })
            .await?;

        let vm_ref = &vm;
        stage
            .perform(
                format!("Waiting for the agent on VM '{}' to be ready", vm.cid()),
                || vm_ref.wait_until_ready(AGENT_READY_TIMEOUT, PING_DELAY),
            )
            .await?;
        Ok(vm)
    }

    /// Render the job's templates, upload them, and build the agent apply spec.
    /// Rendering happens in a scratch directory under the run's temp root.
    async fn apply_spec(
        &self,
        job: &Job,
        manifest: &DeploymentManifest,
        blobstore: &dyn Blobstore,
        temp_root: &TempRoot,
    ) -> Result<Value, DeployError> {
        let scratch = tempfile::Builder::new()
            .prefix("rendered-jobs")
            .tempdir_in(temp_root.path())?;
        let render_dir = scratch.path().join("jobs");

        let mut properties = manifest.properties.clone();
        properties.extend(job.properties.clone());

        let mut templates = Vec::with_capacity(job.templates.len());
        for template in &job.templates {
            let release_job = self
                .releases
                .find(&template.release)
                .and_then(|r| r.find_job_by_name(&template.name).cloned())
                .ok_or_else(|| DeployError::JobTemplateNotFound {
                    template: template.name.clone(),
                    release: template.release.clone(),
                })?;
            self.renderer.render(
                &release_job,
                &properties,
                &render_dir.join(&release_job.name),
            )?;
            templates.push(json!({
                "name": release_job.name,
                "version": release_job.version,
            }));
        }

        let archive = scratch.path().join("rendered-templates.tgz");
        archive_rendered_jobs(&render_dir, &archive)?;
        let sha1 = Digest::of_file(DigestAlgorithm::Sha1, &archive)?;
        let blob_id = blobstore.add(&archive).await?;
        debug!(blob_id = %blob_id, sha1 = %sha1, "uploaded rendered templates");

        Ok(json!({
            "deployment": manifest.name,
            "index": 0,
            "job": {
                "name": job.name,
                "templates": templates,
            },
            "packages": {},
            "networks": manifest.network_interfaces(&job.name)?,
            "properties": Value::Object(properties),
            "rendered_templates_archive": {
                "blobstore_id": blob_id,
                "sha1": sha1.hex(),
            },
            "configuration_hash": sha1.hex(),
        }))
    }
}

fn archive_rendered_jobs(render_dir: &Path, archive: &Path) -> Result<(), DeployError> {
    std::fs::create_dir_all(render_dir).map_err(DeployError::Archive)?;
    create_tgz(render_dir, archive).map_err(DeployError::Archive)
}

#[async_trait]
impl Deployer for CloudDeployer {
    async fn deploy(
        &self,
        cloud: Arc<dyn Cloud>,
        manifest: &DeploymentManifest,
        stemcell: &CloudStemcell,
        vm_manager: Arc<dyn VmManager>,
        blobstore: Arc<dyn Blobstore>,
        skip_drain: bool,
        disk_cids: &[DiskCid],
        temp_root: &TempRoot,
        stage: &Stage,
    ) -> Result<Arc<dyn Deployment>, DeployError> {
        self.delete_existing(vm_manager.as_ref(), skip_drain, stage)
            .await?;

        let [job] = manifest.jobs.as_slice() else {
            return Err(DeployError::JobCount(manifest.jobs.len()));
        };

        let vm = self
            .create_vm(job, manifest, stemcell, vm_manager.as_ref(), disk_cids, stage)
            .await?;

        let disk_pool = manifest.disk_pool(&job.name)?;
        let disks = DiskDeployer::new(
            Arc::clone(&cloud),
            self.repos.disks.clone(),
            self.recreate_persistent_disks,
        )
        .deploy(disk_pool.as_ref(), &vm, stage)
        .await?;

        let spec = self
            .apply_spec(job, manifest, blobstore.as_ref(), temp_root)
            .await?;
        let instance = Instance::new(&job.name, 0, vm);
        instance.update_jobs(&spec, &manifest.update, stage).await?;

        Ok(Arc::new(CloudDeployment::new(
            vec![instance],
            disks,
            vec![stemcell.clone()],
            Some(cloud),
            self.repos.clone(),
        )))
    }
}
