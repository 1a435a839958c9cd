// ABOUTME: Reads an extracted release tarball into a Release.
// ABOUTME: Parses release.MF and each job's job.MF; packages stay archived.

use super::error::ReleaseError;
use super::{Release, ReleaseJob, ReleasePackage};
use crate::tarball::extract_tgz;
use crate::types::TempRoot;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Deserialize)]
struct ReleaseManifest {
    name: String,
    version: serde_yaml::Value,
    #[serde(default)]
    jobs: Vec<ManifestEntry>,
    #[serde(default)]
    packages: Vec<ManifestEntry>,
}

#[derive(Debug, Deserialize)]
struct ManifestEntry {
    name: String,
    #[serde(default)]
    version: String,
}

#[derive(Debug, Deserialize)]
struct JobManifest {
    #[serde(default)]
    templates: BTreeMap<String, String>,
    #[serde(default)]
    packages: Vec<String>,
}

/// Extracts release tarballs under a temp root.
#[derive(Debug, Clone)]
pub struct ReleaseReader {
    temp_root: TempRoot,
}

impl ReleaseReader {
    pub fn new(temp_root: TempRoot) -> Self {
        Self { temp_root }
    }

    /// Extract `tarball` and read its manifests. On failure the extracted
    /// directory is removed.
    pub fn read(&self, tarball: &Path) -> Result<Release, ReleaseError> {
        let dir = self.temp_root.new_dir("release")?;
        let result = read_into(tarball, &dir);
        if result.is_err() {
            let _ = super::remove_dir_if_exists(&dir);
        }
        result
    }
}

fn read_into(tarball: &Path, dir: &Path) -> Result<Release, ReleaseError> {
    extract_tgz(tarball, dir)?;
    let manifest: ReleaseManifest = read_yaml(&dir.join("release.MF"))?;

    let mut jobs = Vec::with_capacity(manifest.jobs.len());
    for entry in &manifest.jobs {
        let archive = dir.join("jobs").join(format!("{}.tgz", entry.name));
        if !archive.is_file() {
            return Err(ReleaseError::MissingJob(entry.name.clone()));
        }
        let job_dir = dir.join("extracted_jobs").join(&entry.name);
        extract_tgz(&archive, &job_dir)?;
        let job_manifest: JobManifest = read_yaml(&job_dir.join("job.MF"))?;
        jobs.push(ReleaseJob {
            name: entry.name.clone(),
            version: entry.version.clone(),
            templates: job_manifest.templates,
            packages: job_manifest.packages,
            extracted_path: job_dir,
        });
    }

    let mut packages = Vec::with_capacity(manifest.packages.len());
    for entry in &manifest.packages {
        let archive = dir.join("packages").join(format!("{}.tgz", entry.name));
        if !archive.is_file() {
            return Err(ReleaseError::MissingPackage(entry.name.clone()));
        }
        packages.push(ReleasePackage {
            name: entry.name.clone(),
            version: entry.version.clone(),
            archive_path: archive,
        });
    }

    let version = match manifest.version {
        serde_yaml::Value::String(s) => s,
        serde_yaml::Value::Number(n) => n.to_string(),
        other => serde_yaml::to_string(&other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    };

    debug!(release = %manifest.name, %version, jobs = jobs.len(), "read release");
    Ok(Release {
        name: manifest.name,
        version,
        jobs,
        packages,
        extracted_path: PathBuf::from(dir),
    })
}

fn read_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ReleaseError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ReleaseError::ReadManifest {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&raw).map_err(|source| ReleaseError::ParseManifest {
        path: path.to_path_buf(),
        source,
    })
}
