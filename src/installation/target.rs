// ABOUTME: Installation targets: one directory per installation id.
// ABOUTME: The provider reuses the persisted id or mints and saves a new one.

use crate::config::{DeploymentStateService, StateError, WorkspaceConfig};
use crate::types::UuidGenerator;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where the CPI is installed: `<root>/jobs`, `<root>/packages`, `<root>/tmp`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    path: PathBuf,
    packages_path: Option<PathBuf>,
}

impl Target {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            packages_path: None,
        }
    }

    /// Keep compiled packages outside the target, so they survive uninstall.
    pub fn with_packages_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.packages_path = Some(path.into());
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn jobs_path(&self) -> PathBuf {
        self.path.join("jobs")
    }

    pub fn packages_path(&self) -> PathBuf {
        self.packages_path
            .clone()
            .unwrap_or_else(|| self.path.join("packages"))
    }

    pub fn tmp_path(&self) -> PathBuf {
        self.path.join("tmp")
    }
}

pub struct TargetProvider {
    state_service: Arc<dyn DeploymentStateService>,
    uuid: Arc<dyn UuidGenerator>,
    workspace: WorkspaceConfig,
}

impl TargetProvider {
    pub fn new(
        state_service: Arc<dyn DeploymentStateService>,
        uuid: Arc<dyn UuidGenerator>,
        workspace: WorkspaceConfig,
    ) -> Self {
        Self {
            state_service,
            uuid,
            workspace,
        }
    }

    /// The target for this deployment's installation.
    pub fn new_target(&self) -> Result<Target, StateError> {
        let mut state = self.state_service.load()?;
        if state.installation_id.is_empty() {
            state.installation_id = self.uuid.generate();
            self.state_service.save(&state)?;
        }
        let target = Target::new(self.workspace.installation_path(&state.installation_id));
        Ok(match self.workspace.package_dir() {
            Some(dir) => target.with_packages_path(dir),
            None => target,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FileSystemDeploymentStateService;
    use crate::types::RandomUuidGenerator;

    #[test]
    fn installation_id_is_minted_once_and_reused() {
        let tmp = tempfile::tempdir().unwrap();
        let uuid: Arc<dyn UuidGenerator> = Arc::new(RandomUuidGenerator);
        let service: Arc<dyn DeploymentStateService> = Arc::new(
            FileSystemDeploymentStateService::new(tmp.path().join("state.json"), uuid.clone()),
        );
        let workspace = WorkspaceConfig::new(tmp.path().join("home"));
        let provider = TargetProvider::new(service.clone(), uuid, workspace.clone());

        let first = provider.new_target().unwrap();
        let second = provider.new_target().unwrap();

        let id = service.load().unwrap().installation_id;
        assert!(!id.is_empty());
        assert_eq!(first, second);
        assert_eq!(first.path(), workspace.installation_path(&id));
        assert_eq!(first.tmp_path(), first.path().join("tmp"));
        assert_eq!(first.packages_path(), first.path().join("packages"));
    }

    #[test]
    fn package_dir_override_moves_packages_only() {
        let tmp = tempfile::tempdir().unwrap();
        let uuid: Arc<dyn UuidGenerator> = Arc::new(RandomUuidGenerator);
        let service: Arc<dyn DeploymentStateService> = Arc::new(
            FileSystemDeploymentStateService::new(tmp.path().join("state.json"), uuid.clone()),
        );
        let workspace =
            WorkspaceConfig::new(tmp.path().join("home")).with_package_dir(tmp.path().join("pkgs"));

        let target = TargetProvider::new(service, uuid, workspace).new_target().unwrap();

        assert_eq!(target.packages_path(), tmp.path().join("pkgs"));
        assert_eq!(target.jobs_path(), target.path().join("jobs"));
    }
}
