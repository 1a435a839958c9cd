// ABOUTME: Local CPI installation: targets, installer, renderer, and uninstaller.
// ABOUTME: An Installation is the installed job set for one scoped run.

mod error;
mod installer;
mod renderer;
mod target;
mod uninstaller;

pub use error::InstallError;
pub use installer::{Installer, JobInstaller};
pub use renderer::{CopyJobRenderer, JobRenderer};
pub use target::{Target, TargetProvider};
pub use uninstaller::Uninstaller;

use crate::manifest::InstallationManifest;
use std::path::PathBuf;

/// A job rendered into the target's `jobs/` directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledJob {
    pub name: String,
    pub path: PathBuf,
    /// Whether this job provides the CPI executable.
    pub renders_cpi: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Installation {
    pub target: Target,
    pub jobs: Vec<InstalledJob>,
    pub manifest: InstallationManifest,
}

impl Installation {
    /// Every job `manifest` names, at the path it would be rendered to in
    /// `target`, whether or not it has been rendered yet.
    pub fn declared(manifest: &InstallationManifest, target: &Target) -> Self {
        let jobs = manifest
            .templates
            .iter()
            .filter(|template| !template.name.is_empty())
            .map(|template| InstalledJob {
                name: template.name.clone(),
                path: target.jobs_path().join(&template.name),
                renders_cpi: false,
            })
            .collect();
        Self {
            target: target.clone(),
            jobs,
            manifest: manifest.clone(),
        }
    }

    /// The job holding `bin/cpi`, or the first job.
    pub fn cpi_job(&self) -> Option<&InstalledJob> {
        self.jobs
            .iter()
            .find(|j| j.renders_cpi)
            .or_else(|| self.jobs.first())
    }
}
