// ABOUTME: Local workspace layout for installations and downloads.
// ABOUTME: Rooted at ~/.bosh unless overridden.

use std::path::{Path, PathBuf};

/// Environment variable overriding the workspace root.
pub const HOME_ENV_VAR: &str = "BOSH_ENV_HOME";

const DEFAULT_DIR: &str = ".bosh";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceConfig {
    root: PathBuf,
    package_dir: Option<PathBuf>,
}

impl WorkspaceConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            package_dir: None,
        }
    }

    /// Compile CPI packages into `dir` instead of each installation's own directory.
    pub fn with_package_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.package_dir = Some(dir.into());
        self
    }

    pub fn package_dir(&self) -> Option<&Path> {
        self.package_dir.as_deref()
    }

    /// Resolve the workspace from `BOSH_ENV_HOME`, falling back to `$HOME/.bosh`.
    pub fn from_env() -> Option<Self> {
        if let Some(root) = std::env::var_os(HOME_ENV_VAR).filter(|v| !v.is_empty()) {
            return Some(Self::new(root));
        }
        std::env::var_os("HOME")
            .filter(|v| !v.is_empty())
            .map(|home| Self::new(PathBuf::from(home).join(DEFAULT_DIR)))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Cache of downloaded release and stemcell tarballs.
    pub fn downloads_dir(&self) -> PathBuf {
        self.root.join("downloads")
    }

    pub fn installations_dir(&self) -> PathBuf {
        self.root.join("installations")
    }

    pub fn installation_path(&self, installation_id: &str) -> PathBuf {
        self.installations_dir().join(installation_id)
    }
}
