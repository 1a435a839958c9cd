// ABOUTME: Extracted BOSH releases and the set fetched for one run.
// ABOUTME: Releases hold jobs whose templates render to files like bin/cpi.

mod error;
mod fetcher;
mod manager;
mod reader;

pub use error::ReleaseError;
pub use fetcher::{ReleaseFetcher, TarballReleaseFetcher};
pub use manager::ReleaseManager;
pub use reader::ReleaseReader;

use crate::config::ReleaseVersion;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A release extracted into a temp directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    pub name: String,
    pub version: String,
    pub jobs: Vec<ReleaseJob>,
    pub packages: Vec<ReleasePackage>,
    pub extracted_path: PathBuf,
}

impl Release {
    pub fn find_job_by_name(&self, name: &str) -> Option<&ReleaseJob> {
        self.jobs.iter().find(|j| j.name == name)
    }

    pub fn find_package_by_name(&self, name: &str) -> Option<&ReleasePackage> {
        self.packages.iter().find(|p| p.name == name)
    }

    pub fn version(&self) -> ReleaseVersion {
        ReleaseVersion::new(&self.name, &self.version)
    }

    /// Remove the extracted files.
    pub fn delete(&self) -> std::io::Result<()> {
        remove_dir_if_exists(&self.extracted_path)
    }
}

/// A job inside a release, extracted next to the release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseJob {
    pub name: String,
    pub version: String,
    /// Template source path (relative to `templates/`) to rendered destination.
    pub templates: BTreeMap<String, String>,
    pub packages: Vec<String>,
    pub extracted_path: PathBuf,
}

impl ReleaseJob {
    /// Whether one of this job's templates renders to `destination`.
    pub fn renders_to(&self, destination: &str) -> bool {
        self.templates.values().any(|dest| dest == destination)
    }
}

/// A package archive inside a release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleasePackage {
    pub name: String,
    pub version: String,
    pub archive_path: PathBuf,
}

pub(crate) fn remove_dir_if_exists(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_dir_all(path) {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
