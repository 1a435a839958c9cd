// ABOUTME: Migration from the legacy bosh-deployments.yml state format.
// ABOUTME: Converts the first recorded instance into a JSON deployment state.

use super::error::StateError;
use super::service::DeploymentStateService;
use super::state::{DeploymentState, DiskRecord, Properties, StemcellRecord};
use crate::types::UuidGenerator;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

const UNKNOWN_STEMCELL_NAME: &str = "unknown-stemcell";

#[derive(Debug, Default, Deserialize)]
struct LegacyDeploymentFile {
    #[serde(default)]
    instances: Vec<LegacyInstance>,
}

#[derive(Debug, Default, Deserialize)]
struct LegacyInstance {
    #[serde(default)]
    vm_cid: Option<String>,
    #[serde(default)]
    disk_cid: Option<String>,
    #[serde(default)]
    stemcell_cid: Option<String>,
    #[serde(default)]
    stemcell_name: Option<String>,
}

pub struct LegacyDeploymentStateMigrator {
    state_service: Arc<dyn DeploymentStateService>,
    uuid_generator: Arc<dyn UuidGenerator>,
}

impl LegacyDeploymentStateMigrator {
    pub fn new(
        state_service: Arc<dyn DeploymentStateService>,
        uuid_generator: Arc<dyn UuidGenerator>,
    ) -> Self {
        Self {
            state_service,
            uuid_generator,
        }
    }

    /// Migrate `legacy_path` into the state file and delete it.
    ///
    /// Returns `false` when there is no legacy file.
    pub fn migrate_if_exists(&self, legacy_path: &Path) -> Result<bool, StateError> {
        if !legacy_path.is_file() {
            return Ok(false);
        }

        let state = self.migrate(legacy_path)?;
        self.state_service.save(&state)?;

        fs::remove_file(legacy_path).map_err(|source| StateError::LegacyRemove {
            path: legacy_path.to_path_buf(),
            source,
        })?;
        Ok(true)
    }

    fn migrate(&self, legacy_path: &Path) -> Result<DeploymentState, StateError> {
        info!(path = %legacy_path.display(), "migrating legacy deployment state");

        let raw = fs::read_to_string(legacy_path).map_err(|source| StateError::LegacyRead {
            path: legacy_path.to_path_buf(),
            source,
        })?;
        let legacy: LegacyDeploymentFile =
            serde_yaml::from_str(&strip_symbol_keys(&raw)).map_err(|source| {
                StateError::LegacyParse {
                    path: legacy_path.to_path_buf(),
                    source,
                }
            })?;

        let mut state = DeploymentState {
            director_id: self.uuid_generator.generate(),
            ..Default::default()
        };

        if let Some(instance) = legacy.instances.into_iter().next() {
            if let Some(disk_cid) = instance.disk_cid.filter(|c| !c.is_empty()) {
                let id = self.uuid_generator.generate();
                state.current_disk_id = id.clone();
                state.disks.push(DiskRecord {
                    id,
                    cid: disk_cid,
                    size: 0,
                    cloud_properties: Properties::new(),
                });
            }

            if let Some(vm_cid) = instance.vm_cid.filter(|c| !c.is_empty()) {
                state.current_vm_cid = vm_cid;
            }

            if let Some(stemcell_cid) = instance.stemcell_cid.filter(|c| !c.is_empty()) {
                let name = instance
                    .stemcell_name
                    .filter(|n| !n.is_empty())
                    .unwrap_or_else(|| UNKNOWN_STEMCELL_NAME.to_string());
                // The legacy file never recorded a version, so this record can't
                // match any stemcell deployed later.
                state.stemcells.push(StemcellRecord {
                    id: self.uuid_generator.generate(),
                    name,
                    version: String::new(),
                    api_version: 0,
                    cid: stemcell_cid,
                });
            }
        }

        debug!(?state, "migrated legacy deployment state");
        Ok(state)
    }
}

/// Legacy files were written by Ruby with symbol keys (`:vm_cid:`).
fn strip_symbol_keys(raw: &str) -> String {
    raw.replace("\n- :", "\n- ").replace("\n  :", "\n  ")
}
