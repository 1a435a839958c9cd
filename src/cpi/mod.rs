// ABOUTME: Validates and installs the CPI release for a run.
// ABOUTME: Installation is scoped: cleanup always runs after the body.

use crate::installation::{InstallError, Installation, Installer, Target};
use crate::manifest::InstallationManifest;
use crate::release::ReleaseManager;
use crate::stage::Stage;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// Where a CPI job's executable is rendered, relative to the job.
pub const CPI_BINARY_PATH: &str = "bin/cpi";

/// The only CPI API version this tool speaks.
pub const MAX_SUPPORTED_CPI_API_VERSION: u32 = 2;

/// Stemcells at or above this API version do not use a registry.
pub const STEMCELL_NO_REGISTRY_AS_OF_API_VERSION: u32 = 2;

#[derive(Debug, Error)]
pub enum CpiError {
    #[error("installation release '{0}' must refer to a provided release")]
    ReleaseNotFound(String),

    #[error(
        "Found {found} releases containing a template that renders to target 'bin/cpi'. Expected to find 1. Releases inspected: [{}]{}",
        inspected.join(" "),
        missing_jobs.iter().map(|m| format!("\n{m}")).collect::<String>()
    )]
    CpiJobCount {
        found: usize,
        inspected: Vec<String>,
        missing_jobs: Vec<String>,
    },

    #[error(
        "Stemcell API version {stemcell_api_version} requires CPI v2.0 or greater, you are using {cpi_api_version}"
    )]
    UnsupportedApiVersion {
        cpi_api_version: u32,
        stemcell_api_version: u32,
    },

    #[error(transparent)]
    Install(#[from] InstallError),
}

/// Gate between the CPI's reported API version and the stemcell's.
pub fn check_api_versions(cpi_api_version: u32, stemcell_api_version: u32) -> Result<(), CpiError> {
    if cpi_api_version != MAX_SUPPORTED_CPI_API_VERSION
        || stemcell_api_version < STEMCELL_NO_REGISTRY_AS_OF_API_VERSION
    {
        return Err(CpiError::UnsupportedApiVersion {
            cpi_api_version,
            stemcell_api_version,
        });
    }
    Ok(())
}

pub struct CpiInstaller {
    releases: ReleaseManager,
    installer: Arc<dyn Installer>,
}

impl CpiInstaller {
    pub fn new(releases: ReleaseManager, installer: Arc<dyn Installer>) -> Self {
        Self {
            releases,
            installer,
        }
    }

    /// Check that exactly one fetched release provides the CPI executable.
    pub async fn validate_cpi_release(
        &self,
        manifest: &InstallationManifest,
        stage: &Stage,
    ) -> Result<(), CpiError> {
        stage
            .perform("Validating cpi release", || async move {
                let mut inspected = Vec::new();
                let mut missing_jobs = Vec::new();
                let mut found = 0;

                for template in &manifest.templates {
                    let release = self
                        .releases
                        .find(&template.release)
                        .ok_or_else(|| CpiError::ReleaseNotFound(template.release.clone()))?;
                    inspected.push(release.name.clone());

                    match release.find_job_by_name(&template.name) {
                        Some(job) if job.renders_to(CPI_BINARY_PATH) => found += 1,
                        Some(_) => {}
                        None => missing_jobs.push(format!(
                            "release '{}' must contain specified job '{}'",
                            release.name, template.name
                        )),
                    }
                }

                if found != 1 {
                    return Err(CpiError::CpiJobCount {
                        found,
                        inspected,
                        missing_jobs,
                    });
                }
                Ok(())
            })
            .await
    }

    /// Install the CPI into `target`, run `body`, then always clean up the
    /// rendered jobs. A cleanup failure is logged and never replaces the
    /// body's result.
    ///
    /// When the install itself fails, every job the manifest names is
    /// removed from the target, since any of them may be partly rendered.
    pub async fn with_installed_cpi_release<T, E, F, Fut>(
        &self,
        manifest: &InstallationManifest,
        target: &Target,
        stage: &Stage,
        body: F,
    ) -> Result<T, E>
    where
        F: FnOnce(Installation) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<CpiError> + Display,
    {
        let installed = stage
            .perform_complex("installing CPI", |sub| async move {
                self.installer
                    .install(manifest, target, &sub)
                    .await
                    .map_err(CpiError::from)
            })
            .await;

        let installation = match installed {
            Ok(installation) => installation,
            Err(e) => {
                self.cleanup(&Installation::declared(manifest, target), stage)
                    .await;
                return Err(e.into());
            }
        };

        let result = body(installation.clone()).await;
        self.cleanup(&installation, stage).await;
        result
    }

    async fn cleanup(&self, installation: &Installation, stage: &Stage) {
        let cleanup = stage
            .perform("Cleaning up rendered CPI jobs", || async move {
                self.installer.cleanup(installation).await
            })
            .await;
        if let Err(e) = cleanup {
            warn!(error = %e, "failed to clean up rendered CPI jobs");
        }
    }
}
