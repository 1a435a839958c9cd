// ABOUTME: Record repositories over the deployment state file.
// ABOUTME: Each mutation is a load-modify-save of the whole state document.

use super::error::StateError;
use super::service::DeploymentStateService;
use super::state::{
    DeploymentState, DiskRecord, Properties, ReleaseRecord, ReleaseVersion, StemcellRecord,
};
use crate::types::{DiskCid, StemcellCid, UuidGenerator, VmCid};
use std::sync::Arc;

fn modify<T>(
    service: &dyn DeploymentStateService,
    f: impl FnOnce(&mut DeploymentState) -> Result<T, StateError>,
) -> Result<T, StateError> {
    let mut state = service.load()?;
    let value = f(&mut state)?;
    service.save(&state)?;
    Ok(value)
}

/// Release records and the set currently deployed.
#[derive(Clone)]
pub struct ReleaseRepo {
    service: Arc<dyn DeploymentStateService>,
    uuid_generator: Arc<dyn UuidGenerator>,
}

impl ReleaseRepo {
    pub fn new(
        service: Arc<dyn DeploymentStateService>,
        uuid_generator: Arc<dyn UuidGenerator>,
    ) -> Self {
        Self {
            service,
            uuid_generator,
        }
    }

    /// Releases currently deployed.
    pub fn list(&self) -> Result<Vec<ReleaseRecord>, StateError> {
        let state = self.service.load()?;
        Ok(state.current_releases().into_iter().cloned().collect())
    }

    /// Replace every release record with `releases`, each under a fresh id.
    pub fn update(&self, releases: &[ReleaseVersion]) -> Result<Vec<ReleaseRecord>, StateError> {
        modify(self.service.as_ref(), |state| {
            let records: Vec<ReleaseRecord> = releases
                .iter()
                .map(|r| ReleaseRecord {
                    id: self.uuid_generator.generate(),
                    name: r.name.clone(),
                    version: r.version.clone(),
                })
                .collect();
            state.current_release_ids = records.iter().map(|r| r.id.clone()).collect();
            state.releases = records.clone();
            Ok(records)
        })
    }
}

/// Stemcells uploaded to the cloud.
#[derive(Clone)]
pub struct StemcellRepo {
    service: Arc<dyn DeploymentStateService>,
    uuid_generator: Arc<dyn UuidGenerator>,
}

impl StemcellRepo {
    pub fn new(
        service: Arc<dyn DeploymentStateService>,
        uuid_generator: Arc<dyn UuidGenerator>,
    ) -> Self {
        Self {
            service,
            uuid_generator,
        }
    }

    pub fn save(
        &self,
        name: &str,
        version: &str,
        api_version: u32,
        cid: &StemcellCid,
    ) -> Result<StemcellRecord, StateError> {
        modify(self.service.as_ref(), |state| {
            if state
                .stemcells
                .iter()
                .any(|s| s.name == name && s.version == version)
            {
                return Err(StateError::StemcellExists {
                    name: name.to_string(),
                    version: version.to_string(),
                });
            }
            if state.stemcells.iter().any(|s| s.cid == cid.as_str()) {
                return Err(StateError::StemcellCidExists(cid.to_string()));
            }

            let record = StemcellRecord {
                id: self.uuid_generator.generate(),
                name: name.to_string(),
                version: version.to_string(),
                api_version,
                cid: cid.to_string(),
            };
            state.stemcells.push(record.clone());
            Ok(record)
        })
    }

    pub fn find(&self, name: &str, version: &str) -> Result<Option<StemcellRecord>, StateError> {
        let state = self.service.load()?;
        Ok(state
            .stemcells
            .into_iter()
            .find(|s| s.name == name && s.version == version))
    }

    pub fn find_current(&self) -> Result<Option<StemcellRecord>, StateError> {
        let state = self.service.load()?;
        Ok(state.current_stemcell().cloned())
    }

    pub fn all(&self) -> Result<Vec<StemcellRecord>, StateError> {
        Ok(self.service.load()?.stemcells)
    }

    pub fn update_current(&self, id: &str) -> Result<(), StateError> {
        modify(self.service.as_ref(), |state| {
            if !state.stemcells.iter().any(|s| s.id == id) {
                return Err(StateError::RecordNotFound {
                    kind: "stemcell",
                    id: id.to_string(),
                });
            }
            state.current_stemcell_id = id.to_string();
            Ok(())
        })
    }

    pub fn clear_current(&self) -> Result<(), StateError> {
        modify(self.service.as_ref(), |state| {
            state.current_stemcell_id.clear();
            Ok(())
        })
    }

    pub fn delete(&self, id: &str) -> Result<(), StateError> {
        modify(self.service.as_ref(), |state| {
            state.stemcells.retain(|s| s.id != id);
            if state.current_stemcell_id == id {
                state.current_stemcell_id.clear();
            }
            Ok(())
        })
    }
}

/// Persistent disks created in the cloud.
#[derive(Clone)]
pub struct DiskRepo {
    service: Arc<dyn DeploymentStateService>,
    uuid_generator: Arc<dyn UuidGenerator>,
}

impl DiskRepo {
    pub fn new(
        service: Arc<dyn DeploymentStateService>,
        uuid_generator: Arc<dyn UuidGenerator>,
    ) -> Self {
        Self {
            service,
            uuid_generator,
        }
    }

    pub fn save(
        &self,
        cid: &DiskCid,
        size: u64,
        cloud_properties: &Properties,
    ) -> Result<DiskRecord, StateError> {
        modify(self.service.as_ref(), |state| {
            if state.disks.iter().any(|d| d.cid == cid.as_str()) {
                return Err(StateError::DiskCidExists(cid.to_string()));
            }
            let record = DiskRecord {
                id: self.uuid_generator.generate(),
                cid: cid.to_string(),
                size,
                cloud_properties: cloud_properties.clone(),
            };
            state.disks.push(record.clone());
            Ok(record)
        })
    }

    pub fn find_current(&self) -> Result<Option<DiskRecord>, StateError> {
        let state = self.service.load()?;
        if state.current_disk_id.is_empty() {
            return Ok(None);
        }
        Ok(state
            .disks
            .into_iter()
            .find(|d| d.id == state.current_disk_id))
    }

    pub fn all(&self) -> Result<Vec<DiskRecord>, StateError> {
        Ok(self.service.load()?.disks)
    }

    pub fn update_current(&self, id: &str) -> Result<(), StateError> {
        modify(self.service.as_ref(), |state| {
            if !state.disks.iter().any(|d| d.id == id) {
                return Err(StateError::RecordNotFound {
                    kind: "disk",
                    id: id.to_string(),
                });
            }
            state.current_disk_id = id.to_string();
            Ok(())
        })
    }

    pub fn clear_current(&self) -> Result<(), StateError> {
        modify(self.service.as_ref(), |state| {
            state.current_disk_id.clear();
            Ok(())
        })
    }

    pub fn delete(&self, id: &str) -> Result<(), StateError> {
        modify(self.service.as_ref(), |state| {
            state.disks.retain(|d| d.id != id);
            if state.current_disk_id == id {
                state.current_disk_id.clear();
            }
            Ok(())
        })
    }
}

/// The single VM of the environment.
#[derive(Clone)]
pub struct VmRepo {
    service: Arc<dyn DeploymentStateService>,
}

impl VmRepo {
    pub fn new(service: Arc<dyn DeploymentStateService>) -> Self {
        Self { service }
    }

    pub fn find_current(&self) -> Result<Option<VmCid>, StateError> {
        let state = self.service.load()?;
        Ok(Some(state.current_vm_cid)
            .filter(|cid| !cid.is_empty())
            .map(VmCid::new))
    }

    pub fn update_current(&self, cid: &VmCid) -> Result<(), StateError> {
        modify(self.service.as_ref(), |state| {
            state.current_vm_cid = cid.to_string();
            Ok(())
        })
    }

    pub fn clear_current(&self) -> Result<(), StateError> {
        modify(self.service.as_ref(), |state| {
            state.current_vm_cid.clear();
            Ok(())
        })
    }
}

/// Digest of the last deployed manifest.
#[derive(Clone)]
pub struct DeploymentRepo {
    service: Arc<dyn DeploymentStateService>,
}

impl DeploymentRepo {
    pub fn new(service: Arc<dyn DeploymentStateService>) -> Self {
        Self { service }
    }

    pub fn find_current(&self) -> Result<Option<String>, StateError> {
        let state = self.service.load()?;
        Ok(Some(state.current_manifest_sha).filter(|sha| !sha.is_empty()))
    }

    pub fn update_current(&self, manifest_sha: &str) -> Result<(), StateError> {
        modify(self.service.as_ref(), |state| {
            state.current_manifest_sha = manifest_sha.to_string();
            Ok(())
        })
    }
}

/// All repositories backed by one state service.
#[derive(Clone)]
pub struct Repos {
    pub releases: ReleaseRepo,
    pub stemcells: StemcellRepo,
    pub disks: DiskRepo,
    pub vms: VmRepo,
    pub deployments: DeploymentRepo,
}

impl Repos {
    pub fn new(
        service: Arc<dyn DeploymentStateService>,
        uuid_generator: Arc<dyn UuidGenerator>,
    ) -> Self {
        Self {
            releases: ReleaseRepo::new(Arc::clone(&service), Arc::clone(&uuid_generator)),
            stemcells: StemcellRepo::new(Arc::clone(&service), Arc::clone(&uuid_generator)),
            disks: DiskRepo::new(Arc::clone(&service), uuid_generator),
            vms: VmRepo::new(Arc::clone(&service)),
            deployments: DeploymentRepo::new(service),
        }
    }
}
