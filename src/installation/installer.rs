// ABOUTME: Installs CPI jobs and their packages into an installation target.
// ABOUTME: Packages are compiled locally by running their packaging script.

use super::error::InstallError;
use super::renderer::JobRenderer;
use super::target::Target;
use super::{Installation, InstalledJob};
use crate::manifest::InstallationManifest;
use crate::release::{Release, ReleaseJob, ReleaseManager, remove_dir_if_exists};
use crate::stage::Stage;
use crate::tarball::extract_tgz;
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, info};

const PACKAGING_PATH: &str = "/usr/local/bin:/usr/bin:/bin";

#[async_trait]
pub trait Installer: Send + Sync {
    async fn install(
        &self,
        manifest: &InstallationManifest,
        target: &Target,
        stage: &Stage,
    ) -> Result<Installation, InstallError>;

    /// Remove the rendered jobs of `installation`. Compiled packages stay.
    async fn cleanup(&self, installation: &Installation) -> Result<(), InstallError>;
}

pub struct JobInstaller {
    releases: ReleaseManager,
    renderer: Arc<dyn JobRenderer>,
}

impl JobInstaller {
    pub fn new(releases: ReleaseManager, renderer: Arc<dyn JobRenderer>) -> Self {
        Self { releases, renderer }
    }

    fn resolve(
        &self,
        manifest: &InstallationManifest,
    ) -> Result<Vec<(Release, ReleaseJob)>, InstallError> {
        manifest
            .templates
            .iter()
            .map(|template| {
                let release = self
                    .releases
                    .find(&template.release)
                    .ok_or_else(|| InstallError::ReleaseNotFound(template.release.clone()))?;
                let job = release
                    .find_job_by_name(&template.name)
                    .cloned()
                    .ok_or_else(|| InstallError::JobNotFound {
                        job: template.name.clone(),
                        release: template.release.clone(),
                    })?;
                Ok((release, job))
            })
            .collect()
    }
}

#[async_trait]
impl Installer for JobInstaller {
    async fn install(
        &self,
        manifest: &InstallationManifest,
        target: &Target,
        stage: &Stage,
    ) -> Result<Installation, InstallError> {
        info!(deployment = %manifest.name, target = %target.path().display(), "installing CPI");
        let jobs = self.resolve(manifest)?;

        let mut compiled = HashSet::new();
        for (release, job) in &jobs {
            for package_name in &job.packages {
                if !compiled.insert(package_name.clone()) {
                    continue;
                }
                let package = release.find_package_by_name(package_name).ok_or_else(|| {
                    InstallError::PackageNotFound {
                        package: package_name.clone(),
                        job: job.name.clone(),
                        release: release.name.clone(),
                    }
                })?;
                stage
                    .perform(
                        format!("Compiling package '{}/{}'", package.name, package.version),
                        || compile_package(&package.name, &package.archive_path, target),
                    )
                    .await?;
            }
        }

        let jobs = &jobs;
        let installed = stage
            .perform("Rendering job templates", || async move {
                let mut installed = Vec::with_capacity(jobs.len());
                for (_, job) in jobs {
                    let dest = target.jobs_path().join(&job.name);
                    self.renderer.render(job, &manifest.properties, &dest)?;
                    installed.push(InstalledJob {
                        name: job.name.clone(),
                        path: dest,
                        renders_cpi: job.renders_to(crate::cpi::CPI_BINARY_PATH),
                    });
                }
                Ok::<_, InstallError>(installed)
            })
            .await?;

        Ok(Installation {
            target: target.clone(),
            jobs: installed,
            manifest: manifest.clone(),
        })
    }

    async fn cleanup(&self, installation: &Installation) -> Result<(), InstallError> {
        for job in &installation.jobs {
            remove_dir_if_exists(&job.path).map_err(|source| InstallError::Remove {
                path: job.path.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

async fn compile_package(name: &str, archive: &Path, target: &Target) -> Result<(), InstallError> {
    let src_dir = target.tmp_path().join(format!("compile-{name}"));
    remove_dir_if_exists(&src_dir)?;
    let archive_path = archive.to_path_buf();
    let extract_to = src_dir.clone();
    tokio::task::spawn_blocking(move || extract_tgz(&archive_path, &extract_to))
        .await
        .map_err(|e| InstallError::Compile {
            package: name.to_string(),
            message: e.to_string(),
        })??;

    let result = run_packaging(name, &src_dir, target).await;
    if let Err(e) = remove_dir_if_exists(&src_dir) {
        debug!(package = name, error = %e, "failed to remove package sources");
    }
    result
}

async fn run_packaging(name: &str, src_dir: &Path, target: &Target) -> Result<(), InstallError> {
    if !src_dir.join("packaging").is_file() {
        return Err(InstallError::MissingPackagingScript(name.to_string()));
    }

    let install_dir = target.packages_path().join(name);
    remove_dir_if_exists(&install_dir)?;
    tokio::fs::create_dir_all(&install_dir).await?;

    let output = Command::new("bash")
        .args(["-x", "packaging"])
        .current_dir(src_dir)
        .env_clear()
        .env("BOSH_COMPILE_TARGET", src_dir)
        .env("BOSH_INSTALL_TARGET", &install_dir)
        .env("BOSH_PACKAGE_NAME", name)
        .env("BOSH_PACKAGES_DIR", target.packages_path())
        .env("PATH", PACKAGING_PATH)
        .output()
        .await?;

    debug!(
        package = name,
        exit_code = ?output.status.code(),
        stderr = %String::from_utf8_lossy(&output.stderr),
        "ran packaging script"
    );
    if !output.status.success() {
        return Err(InstallError::Compile {
            package: name.to_string(),
            message: format!(
                "packaging script exited with {}",
                output.status.code().unwrap_or(-1)
            ),
        });
    }
    Ok(())
}
