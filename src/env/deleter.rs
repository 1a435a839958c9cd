// ABOUTME: delete-env: tear down the environment's VM, disk, and stemcell.
// ABOUTME: Removes the local installation and the state file once the cloud side is gone.

use super::deps::{EnvDeps, EnvOptions};
use super::error::*;
use crate::blobstore::insecure_http_client;
use crate::cpi::CpiInstaller;
use crate::deployment::DeploymentManager;
use crate::installation::{Installation, Target, TargetProvider, Uninstaller};
use crate::manifest::{InstallationManifest, ReleaseSetAndInstallationManifestParser};
use crate::stage::Stage;
use crate::types::TempRoot;
use snafu::ResultExt;
use std::sync::Arc;
use tracing::warn;

pub struct DeploymentDeleter {
    deps: EnvDeps,
    options: EnvOptions,
}

impl DeploymentDeleter {
    pub fn new(deps: EnvDeps, options: EnvOptions) -> Self {
        Self { deps, options }
    }

    pub async fn delete_deployment(&self, skip_drain: bool, stage: &Stage) -> Result<(), EnvError> {
        let deps = &self.deps;
        deps.ui.print_line(&format!(
            "Deployment state: '{}'",
            deps.state_service.path().display()
        ));
        if !deps.state_service.exists() {
            deps.ui.print_line("No deployment state file found.");
            return Ok(());
        }

        let state = deps.state_service.load().context(LoadStateSnafu)?;
        let target = TargetProvider::new(
            Arc::clone(&deps.state_service),
            Arc::clone(&deps.uuid),
            deps.workspace.clone(),
        )
        .new_target()
        .context(InstallationTargetSnafu)?;
        let temp_root = TempRoot::create(target.tmp_path()).context(TempRootSnafu)?;

        let result = self
            .delete_in_target(&state.director_id, &target, &temp_root, skip_drain, stage)
            .await;

        if let Err(e) = deps.releases.delete_all() {
            warn!(error = %e, "failed to delete extracted releases");
        }
        result
    }

    async fn delete_in_target(
        &self,
        director_id: &str,
        target: &Target,
        temp_root: &TempRoot,
        skip_drain: bool,
        stage: &Stage,
    ) -> Result<(), EnvError> {
        let deps = &self.deps;
        let installation_manifest = stage
            .perform_complex("validating", |sub| async move {
                self.validate(temp_root, &sub).await
            })
            .await?;
        let installation_manifest = &installation_manifest;

        CpiInstaller::new(deps.releases.clone(), Arc::clone(&deps.installer))
            .with_installed_cpi_release(
                installation_manifest,
                target,
                stage,
                |installation| async move {
                    self.find_and_delete_deployment(
                        &installation,
                        director_id,
                        installation_manifest,
                        skip_drain,
                        stage,
                    )
                    .await
                },
            )
            .await?;

        stage
            .perform("Uninstalling local artifacts for CPI and deployment", || async move {
                Uninstaller.uninstall(target).context(UninstallSnafu)?;
                deps.state_service.cleanup().context(DeleteStateSnafu)
            })
            .await
    }

    async fn validate(
        &self,
        temp_root: &TempRoot,
        stage: &Stage,
    ) -> Result<InstallationManifest, EnvError> {
        let deps = &self.deps;
        let opts = &self.options;
        let (release_set, installation_manifest) = stage
            .perform("Validating deployment manifest", || async move {
                ReleaseSetAndInstallationManifestParser::new().release_set_and_installation_manifest(
                    &opts.manifest_path,
                    &opts.vars,
                    &opts.ops,
                )
            })
            .await
            .context(ManifestSnafu)?;

        for release_ref in &release_set.releases {
            deps.release_fetcher
                .download_and_extract(release_ref, temp_root, stage)
                .await
                .context(ReleaseSnafu {
                    name: release_ref.name.as_str(),
                })?;
        }

        CpiInstaller::new(deps.releases.clone(), Arc::clone(&deps.installer))
            .validate_cpi_release(&installation_manifest, stage)
            .await
            .context(InvalidCpiReleaseSnafu {
                release: installation_manifest.cpi_releases().join(", "),
            })?;
        Ok(installation_manifest)
    }

    async fn find_and_delete_deployment(
        &self,
        installation: &Installation,
        director_id: &str,
        installation_manifest: &InstallationManifest,
        skip_drain: bool,
        stage: &Stage,
    ) -> Result<(), EnvError> {
        let manager = self.deployment_manager(installation, director_id, installation_manifest)?;

        if let Some(deployment) = manager.find_current().await.context(DeleteDeploymentSnafu)? {
            stage
                .perform_complex("deleting deployment", |sub| async move {
                    deployment.delete(skip_drain, &sub).await
                })
                .await
                .context(DeleteDeploymentSnafu)?;
        }

        manager.cleanup(stage).await.context(DeleteDeploymentSnafu)
    }

    fn deployment_manager(
        &self,
        installation: &Installation,
        director_id: &str,
        installation_manifest: &InstallationManifest,
    ) -> Result<Arc<dyn DeploymentManager>, EnvError> {
        let deps = &self.deps;
        let stemcell_api_version = deps
            .repos
            .stemcells
            .find_current()
            .context(LoadStateSnafu)?
            .map(|s| s.api_version)
            .filter(|v| *v > 0)
            .unwrap_or(1);

        let cloud = deps
            .cloud_factory
            .new_cloud(installation, director_id, stemcell_api_version)
            .context(NewCloudSnafu)?;
        let agent = deps
            .agent_factory
            .new_agent_client(
                director_id,
                &installation_manifest.mbus,
                &installation_manifest.cert.ca,
            )
            .context(NewAgentClientSnafu)?;
        let http = insecure_http_client().context(HttpClientSnafu)?;
        let blobstore = deps
            .blobstore_factory
            .create(&installation_manifest.mbus, http)
            .context(NewBlobstoreSnafu)?;

        Ok(deps
            .deployment_manager_factory
            .new_manager(Some(cloud), agent, Some(blobstore)))
    }
}
