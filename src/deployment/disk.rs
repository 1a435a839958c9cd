// ABOUTME: Persistent disk handling: create, attach, migrate, and delete.
// ABOUTME: At most one disk is current; any other recorded disk is unused.

use super::error::DeployError;
use super::vm::Vm;
use crate::cloud::Cloud;
use crate::config::{DiskRecord, DiskRepo};
use crate::manifest::DiskPool;
use crate::stage::Stage;
use crate::types::DiskCid;
use std::sync::Arc;

pub struct DiskDeployer {
    cloud: Arc<dyn Cloud>,
    repo: DiskRepo,
    recreate: bool,
}

impl DiskDeployer {
    /// `recreate` forces a migration onto a fresh disk even when the pool is unchanged.
    pub fn new(cloud: Arc<dyn Cloud>, repo: DiskRepo, recreate: bool) -> Self {
        Self {
            cloud,
            repo,
            recreate,
        }
    }

    /// Bring the VM's persistent disk in line with `pool`.
    pub async fn deploy(
        &self,
        pool: Option<&DiskPool>,
        vm: &Vm,
        stage: &Stage,
    ) -> Result<Vec<DiskRecord>, DeployError> {
        let Some(pool) = pool.filter(|p| p.disk_size > 0) else {
            return Ok(Vec::new());
        };

        let disks = self.repo.all()?;
        let current = self.repo.find_current()?;
        if current.is_none() && disks.len() > 1 {
            return Err(DeployError::MultipleDisks(disks.len()));
        }

        let disk = match current {
            Some(disk) if !self.needs_migration(&disk, pool) => {
                self.attach(&disk, vm, stage).await?;
                disk
            }
            Some(old) => self.migrate(old, pool, vm, stage).await?,
            None => {
                let disk = self.create(pool, vm, stage).await?;
                self.attach(&disk, vm, stage).await?;
                disk
            }
        };

        delete_unused_disks(self.cloud.as_ref(), &self.repo, stage).await?;
        Ok(vec![disk])
    }

    fn needs_migration(&self, disk: &DiskRecord, pool: &DiskPool) -> bool {
        self.recreate
            || disk.size != pool_size(pool)
            || disk.cloud_properties != pool.cloud_properties
    }

    async fn create(
        &self,
        pool: &DiskPool,
        vm: &Vm,
        stage: &Stage,
    ) -> Result<DiskRecord, DeployError> {
        stage
            .perform("Creating disk", || async move {
                let cid = self
                    .cloud
                    .create_disk(pool_size(pool), &pool.cloud_properties, vm.cid())
                    .await?;
                let record = self.repo.save(&cid, pool_size(pool), &pool.cloud_properties)?;
                self.repo.update_current(&record.id)?;
                Ok::<_, DeployError>(record)
            })
            .await
    }

    async fn attach(&self, disk: &DiskRecord, vm: &Vm, stage: &Stage) -> Result<(), DeployError> {
        let cid = DiskCid::new(disk.cid.as_str());
        stage
            .perform(
                format!("Attaching disk '{}' to VM '{}'", cid, vm.cid()),
                || vm.attach_disk(&cid),
            )
            .await
    }

    async fn migrate(
        &self,
        old: DiskRecord,
        pool: &DiskPool,
        vm: &Vm,
        stage: &Stage,
    ) -> Result<DiskRecord, DeployError> {
        let new = self.create(pool, vm, stage).await?;
        self.attach(&new, vm, stage).await?;

        let old_cid = &DiskCid::new(old.cid.as_str());
        stage
            .perform(
                format!("Migrating disk content from '{}' to '{}'", old.cid, new.cid),
                || vm.migrate_disk(),
            )
            .await?;
        stage
            .perform(format!("Detaching disk '{old_cid}'"), || async move {
                vm.unmount_disk(old_cid).await?;
                vm.detach_disk(old_cid).await
            })
            .await?;
        delete_disk(self.cloud.as_ref(), &self.repo, &old, stage).await?;
        Ok(new)
    }
}

fn pool_size(pool: &DiskPool) -> u64 {
    u64::try_from(pool.disk_size).unwrap_or(0)
}

/// Delete `disk` in the cloud and drop its record; a disk the cloud no
/// longer has is skipped.
pub(crate) async fn delete_disk(
    cloud: &dyn Cloud,
    repo: &DiskRepo,
    disk: &DiskRecord,
    stage: &Stage,
) -> Result<(), DeployError> {
    stage
        .perform_skippable(format!("Deleting disk '{}'", disk.cid), || async move {
            let skipped = match cloud.delete_disk(&DiskCid::new(disk.cid.as_str())).await {
                Ok(()) => None,
                Err(e) if e.is_disk_not_found() => Some("Disk not found".to_string()),
                Err(e) => return Err(DeployError::from(e)),
            };
            repo.delete(&disk.id)?;
            Ok(skipped)
        })
        .await
}

/// Delete every recorded disk except the current one.
pub(crate) async fn delete_unused_disks(
    cloud: &dyn Cloud,
    repo: &DiskRepo,
    stage: &Stage,
) -> Result<(), DeployError> {
    let current = repo.find_current()?.map(|d| d.id);
    for disk in repo.all()? {
        if Some(&disk.id) == current.as_ref() {
            continue;
        }
        let disk = &disk;
        stage
            .perform_skippable(format!("Deleting unused disk '{}'", disk.cid), || async move {
                match cloud.delete_disk(&DiskCid::new(disk.cid.as_str())).await {
                    Ok(()) => {
                        repo.delete(&disk.id)?;
                        Ok(None)
                    }
                    Err(e) if e.is_disk_not_found() => {
                        repo.delete(&disk.id)?;
                        Ok(Some("Disk not found".to_string()))
                    }
                    Err(e) => Err(DeployError::from(e)),
                }
            })
            .await?;
    }
    Ok(())
}
