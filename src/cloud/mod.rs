// ABOUTME: The IaaS as seen through the CPI: stemcells, VMs, and disks.
// ABOUTME: Production calls go to the locally installed CPI executable.

mod cmd;
mod cpi;
mod error;

pub use cmd::{CmdContext, CmdOutput, CpiCmdRunner, CpiJob};
pub use cpi::CpiCloud;
pub use error::{
    CloudError, DISK_NOT_FOUND_ERROR, NOT_IMPLEMENTED_ERROR, STEMCELL_NOT_FOUND_ERROR,
    VM_NOT_FOUND_ERROR,
};

use crate::config::Properties;
use crate::installation::Installation;
use crate::types::{DiskCid, StemcellCid, VmCid};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// What the CPI reports about itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CpiInfo {
    #[serde(default)]
    pub api_version: u32,
    #[serde(default)]
    pub stemcell_formats: Vec<String>,
}

/// Operations the deployment needs from the IaaS.
#[async_trait]
pub trait Cloud: Send + Sync {
    async fn info(&self) -> Result<CpiInfo, CloudError>;

    async fn create_stemcell(
        &self,
        image_path: &Path,
        cloud_properties: &Properties,
    ) -> Result<StemcellCid, CloudError>;

    async fn delete_stemcell(&self, cid: &StemcellCid) -> Result<(), CloudError>;

    async fn has_vm(&self, cid: &VmCid) -> Result<bool, CloudError>;

    async fn create_vm(
        &self,
        agent_id: &str,
        stemcell_cid: &StemcellCid,
        cloud_properties: &Properties,
        networks: &Properties,
        disk_cids: &[DiskCid],
        env: &Properties,
    ) -> Result<VmCid, CloudError>;

    async fn set_vm_metadata(
        &self,
        cid: &VmCid,
        metadata: &BTreeMap<String, String>,
    ) -> Result<(), CloudError>;

    async fn delete_vm(&self, cid: &VmCid) -> Result<(), CloudError>;

    async fn create_disk(
        &self,
        size_mb: u64,
        cloud_properties: &Properties,
        vm_cid: &VmCid,
    ) -> Result<DiskCid, CloudError>;

    async fn attach_disk(&self, vm_cid: &VmCid, disk_cid: &DiskCid) -> Result<(), CloudError>;

    async fn detach_disk(&self, vm_cid: &VmCid, disk_cid: &DiskCid) -> Result<(), CloudError>;

    async fn delete_disk(&self, cid: &DiskCid) -> Result<(), CloudError>;
}

/// Builds a cloud bound to an installed CPI.
pub trait CloudFactory: Send + Sync {
    fn new_cloud(
        &self,
        installation: &Installation,
        director_id: &str,
        stemcell_api_version: u32,
    ) -> Result<Arc<dyn Cloud>, CloudError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CpiCloudFactory;

impl CloudFactory for CpiCloudFactory {
    fn new_cloud(
        &self,
        installation: &Installation,
        director_id: &str,
        stemcell_api_version: u32,
    ) -> Result<Arc<dyn Cloud>, CloudError> {
        let job = installation.cpi_job().ok_or(CloudError::NoCpiJob)?;
        let runner = CpiCmdRunner::new(CpiJob {
            job_path: job.path.clone(),
            jobs_dir: installation.target.jobs_path(),
            packages_dir: installation.target.packages_path(),
        });
        let context = CmdContext::new(director_id, stemcell_api_version);
        Ok(Arc::new(CpiCloud::new(runner, context)))
    }
}
