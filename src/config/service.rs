// ABOUTME: File-backed deployment state service.
// ABOUTME: Loads, saves (atomically), and removes the JSON state file beside the manifest.

use super::error::StateError;
use super::state::DeploymentState;
use crate::types::UuidGenerator;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Name of the pre-JSON state file that may sit next to a manifest.
pub const LEGACY_STATE_FILENAME: &str = "bosh-deployments.yml";

/// Access to the persisted [`DeploymentState`].
pub trait DeploymentStateService: Send + Sync {
    /// Location of the backing file.
    fn path(&self) -> &Path;

    fn exists(&self) -> bool;

    /// Load the state, creating (and saving) a fresh one if there is none.
    ///
    /// This is the only place a director id is minted.
    fn load(&self) -> Result<DeploymentState, StateError>;

    fn save(&self, state: &DeploymentState) -> Result<(), StateError>;

    /// Remove the backing file.
    fn cleanup(&self) -> Result<(), StateError>;
}

/// Resolve the state file for a manifest: an explicit override, or
/// `<manifest-dir>/<manifest-stem>-state.json`.
pub fn deployment_state_path(manifest_path: &Path, override_path: Option<&Path>) -> PathBuf {
    if let Some(path) = override_path.filter(|p| !p.as_os_str().is_empty()) {
        return path.to_path_buf();
    }

    let stem = manifest_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    manifest_dir(manifest_path).join(format!("{stem}-state.json"))
}

/// Path of the legacy state file for a manifest.
pub fn legacy_deployment_state_path(manifest_path: &Path) -> PathBuf {
    manifest_dir(manifest_path).join(LEGACY_STATE_FILENAME)
}

fn manifest_dir(manifest_path: &Path) -> PathBuf {
    manifest_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default()
}

pub struct FileSystemDeploymentStateService {
    path: PathBuf,
    uuid_generator: Arc<dyn UuidGenerator>,
}

impl FileSystemDeploymentStateService {
    pub fn new(path: impl Into<PathBuf>, uuid_generator: Arc<dyn UuidGenerator>) -> Self {
        Self {
            path: path.into(),
            uuid_generator,
        }
    }
}

impl DeploymentStateService for FileSystemDeploymentStateService {
    fn path(&self) -> &Path {
        &self.path
    }

    fn exists(&self) -> bool {
        self.path.is_file()
    }

    fn load(&self) -> Result<DeploymentState, StateError> {
        let mut state = if self.exists() {
            let contents = fs::read_to_string(&self.path).map_err(|source| StateError::Read {
                path: self.path.clone(),
                source,
            })?;
            serde_json::from_str(&contents).map_err(|source| StateError::Parse {
                path: self.path.clone(),
                source,
            })?
        } else {
            DeploymentState::default()
        };

        if state.director_id.is_empty() {
            state.director_id = self.uuid_generator.generate();
            debug!(path = %self.path.display(), director_id = %state.director_id, "minted director id");
            self.save(&state)?;
        }

        Ok(state)
    }

    fn save(&self, state: &DeploymentState) -> Result<(), StateError> {
        let json = serde_json::to_string_pretty(state)?;
        let write_err = |source| StateError::Write {
            path: self.path.clone(),
            source,
        };

        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        fs::create_dir_all(parent).map_err(write_err)?;

        // Written beside the target so the final rename stays on one filesystem.
        let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(write_err)?;
        tmp.write_all(json.as_bytes()).map_err(write_err)?;
        tmp.persist(&self.path).map_err(|e| write_err(e.error))?;
        Ok(())
    }

    fn cleanup(&self) -> Result<(), StateError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StateError::Remove {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_path_sits_beside_manifest() {
        let path = deployment_state_path(Path::new("/work/env/bosh.yml"), None);
        assert_eq!(path, PathBuf::from("/work/env/bosh-state.json"));
    }

    #[test]
    fn state_path_override_wins() {
        let path = deployment_state_path(
            Path::new("/work/env/bosh.yml"),
            Some(Path::new("/elsewhere/state.json")),
        );
        assert_eq!(path, PathBuf::from("/elsewhere/state.json"));
    }

    #[test]
    fn empty_override_is_ignored() {
        let path = deployment_state_path(Path::new("/work/bosh.yml"), Some(Path::new("")));
        assert_eq!(path, PathBuf::from("/work/bosh-state.json"));
    }

    #[test]
    fn legacy_path_uses_manifest_directory() {
        let path = legacy_deployment_state_path(Path::new("/work/env/bosh.yml"));
        assert_eq!(path, PathBuf::from("/work/env/bosh-deployments.yml"));
    }

    #[test]
    fn save_replaces_file_without_leftovers() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("state").join("bosh-state.json");
        let service = FileSystemDeploymentStateService::new(
            &path,
            Arc::new(crate::types::RandomUuidGenerator),
        );

        let mut state = DeploymentState {
            director_id: "d-1".to_string(),
            ..DeploymentState::default()
        };
        service.save(&state).unwrap();
        state.current_vm_cid = "vm-1".to_string();
        service.save(&state).unwrap();

        assert_eq!(service.load().unwrap().current_vm_cid, "vm-1");
        let entries: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("bosh-state.json")]);
    }
}
