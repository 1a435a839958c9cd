// ABOUTME: Removes an installation target from disk.
// ABOUTME: Used by delete-env once the environment is gone.

use super::error::InstallError;
use super::target::Target;
use crate::release::remove_dir_if_exists;
use tracing::info;

#[derive(Debug, Clone, Copy, Default)]
pub struct Uninstaller;

impl Uninstaller {
    pub fn uninstall(&self, target: &Target) -> Result<(), InstallError> {
        info!(target = %target.path().display(), "uninstalling");
        remove_dir_if_exists(target.path()).map_err(|source| InstallError::Remove {
            path: target.path().to_path_buf(),
            source,
        })
    }
}
