// ABOUTME: create-env: validate inputs, install the CPI, and converge the environment.
// ABOUTME: Skips the deploy entirely when manifest, releases, and stemcell are unchanged.

use super::deps::{EnvDeps, EnvOptions};
use super::error::*;
use crate::blobstore::insecure_http_client;
use crate::config::{ReleaseVersion, legacy_deployment_state_path};
use crate::cpi::{CpiInstaller, check_api_versions};
use crate::installation::{Installation, Target, TargetProvider};
use crate::manifest::{
    DeploymentManifest, DeploymentManifestParser, InstallationManifest,
    ReleaseSetAndInstallationManifestParser,
};
use crate::stage::Stage;
use crate::stemcell::ExtractedStemcell;
use crate::types::{DiskCid, TempRoot};
use snafu::ResultExt;
use std::sync::Arc;
use tracing::{info, warn};

/// Everything the "validating" stage produces.
struct Validated {
    installation_manifest: InstallationManifest,
    deployment_manifest: DeploymentManifest,
    manifest_sha: String,
    stemcell: ExtractedStemcell,
}

pub struct DeploymentPreparer {
    deps: EnvDeps,
    options: EnvOptions,
}

impl DeploymentPreparer {
    pub fn new(deps: EnvDeps, options: EnvOptions) -> Self {
        Self { deps, options }
    }

    pub async fn prepare_deployment(&self, stage: &Stage) -> Result<(), EnvError> {
        let deps = &self.deps;
        let state_path = deps.state_service.path().to_path_buf();
        deps.ui
            .print_line(&format!("Deployment state: '{}'", state_path.display()));

        if !deps.state_service.exists() {
            let legacy_path = legacy_deployment_state_path(&self.options.manifest_path);
            let migrated = deps
                .legacy_migrator()
                .migrate_if_exists(&legacy_path)
                .context(MigrateLegacyStateSnafu)?;
            if migrated {
                deps.ui.print_line(&format!(
                    "Migrated legacy deployments file: '{}'",
                    legacy_path.display()
                ));
            }
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
            .validate_and_deploy(
                &state.director_id,
                &target,
                &temp_root,
                &state.disk_cids(),
                stage,
            )
            .await;

        if let Err(e) = deps.releases.delete_all() {
            warn!(error = %e, "failed to delete extracted releases");
        }
        result
    }

    async fn validate_and_deploy(
        &self,
        director_id: &str,
        target: &Target,
        temp_root: &TempRoot,
        disk_cids: &[String],
        stage: &Stage,
    ) -> Result<(), EnvError> {
        let validated = stage
            .perform_complex("validating", |sub| async move {
                self.validate(temp_root, &sub).await
            })
            .await?;
        let Validated {
            installation_manifest,
            deployment_manifest,
            manifest_sha,
            stemcell,
        } = validated;

        let result = self
            .converge(
                director_id,
                target,
                &installation_manifest,
                &deployment_manifest,
                &manifest_sha,
                &stemcell,
                disk_cids,
                temp_root,
                stage,
            )
            .await;

        if let Err(e) = stemcell.delete() {
            warn!(error = %e, "failed to delete extracted stemcell");
        }
        result
    }

    async fn validate(&self, temp_root: &TempRoot, stage: &Stage) -> Result<Validated, EnvError> {
        let deps = &self.deps;
        let opts = &self.options;

        let (release_set, installation_manifest) = stage
            .perform("Validating installation manifest", || async move {
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

        let (deployment_manifest, manifest_sha) =
            DeploymentManifestParser::new(deps.releases.clone())
                .get_deployment_manifest(
                    &opts.manifest_path,
                    &opts.vars,
                    &opts.ops,
                    &release_set,
                    stage,
                )
                .await
                .context(ManifestSnafu)?;

        let stemcell = deps
            .stemcell_fetcher
            .get_stemcell(&deployment_manifest, temp_root, stage)
            .await
            .context(StemcellSnafu)?;

        Ok(Validated {
            installation_manifest,
            deployment_manifest,
            manifest_sha,
            stemcell,
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn converge(
        &self,
        director_id: &str,
        target: &Target,
        installation_manifest: &InstallationManifest,
        deployment_manifest: &DeploymentManifest,
        manifest_sha: &str,
        stemcell: &ExtractedStemcell,
        disk_cids: &[String],
        temp_root: &TempRoot,
        stage: &Stage,
    ) -> Result<(), EnvError> {
        let deps = &self.deps;
        let releases: Vec<ReleaseVersion> =
            deps.releases.list().iter().map(|r| r.version()).collect();
        let releases = &releases;

        let deployed = deps
            .deployment_record()
            .is_deployed(manifest_sha, releases, stemcell)
            .context(CheckDeployedSnafu)?;
        if deployed && !self.options.recreate && !self.options.recreate_persistent_disks {
            deps.ui
                .print_line("No deployment, stemcell or release changes. Skipping deploy.");
            return Ok(());
        }

        CpiInstaller::new(deps.releases.clone(), Arc::clone(&deps.installer))
            .with_installed_cpi_release(
                installation_manifest,
                target,
                stage,
                |installation| async move {
                    self.deploy(
                        &installation,
                        director_id,
                        installation_manifest,
                        deployment_manifest,
                        manifest_sha,
                        stemcell,
                        releases,
                        disk_cids,
                        temp_root,
                        stage,
                    )
                    .await
                },
            )
            .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn deploy(
        &self,
        installation: &Installation,
        director_id: &str,
        installation_manifest: &InstallationManifest,
        deployment_manifest: &DeploymentManifest,
        manifest_sha: &str,
        stemcell: &ExtractedStemcell,
        releases: &[ReleaseVersion],
        disk_cids: &[String],
        temp_root: &TempRoot,
        stage: &Stage,
    ) -> Result<(), EnvError> {
        let deps = &self.deps;
        let stemcell_api_version = stemcell.api_version();

        let cloud = deps
            .cloud_factory
            .new_cloud(installation, director_id, stemcell_api_version)
            .context(NewCloudSnafu)?;
        let info = cloud.info().await.context(CpiInfoSnafu)?;
        check_api_versions(info.api_version, stemcell_api_version).context(CpiApiVersionSnafu)?;
        info!(
            cpi_api_version = info.api_version,
            stemcell_api_version, "checked CPI api version"
        );

        let stemcell_manager = deps.stemcell_manager_factory.new_manager(Arc::clone(&cloud));
        let disk_cids: Vec<DiskCid> = disk_cids.iter().map(|c| DiskCid::new(c.as_str())).collect();

        let cloud_ref = &cloud;
        let stemcell_manager_ref = &stemcell_manager;
        let disk_cids = &disk_cids;
        stage
            .perform_complex("deploying", |sub| async move {
                let cloud_stemcell = stemcell_manager_ref
                    .upload(stemcell, &sub)
                    .await
                    .context(UploadStemcellSnafu)?;

                let agent = deps
                    .agent_factory
                    .new_agent_client(
                        director_id,
                        &installation_manifest.mbus,
                        &installation_manifest.cert.ca,
                    )
                    .context(NewAgentClientSnafu)?;
                let vm_manager = deps
                    .vm_manager_factory
                    .new_manager(Arc::clone(cloud_ref), agent);
                let http = insecure_http_client().context(HttpClientSnafu)?;
                let blobstore = deps
                    .blobstore_factory
                    .create(&installation_manifest.mbus, http)
                    .context(NewBlobstoreSnafu)?;

                let record = deps.deployment_record();
                record.clear().context(ClearRecordSnafu)?;
                deps.deployer
                    .deploy(
                        Arc::clone(cloud_ref),
                        deployment_manifest,
                        &cloud_stemcell,
                        vm_manager,
                        blobstore,
                        self.options.skip_drain,
                        disk_cids,
                        temp_root,
                        &sub,
                    )
                    .await
                    .context(DeploySnafu)?;
                record
                    .update(manifest_sha, releases)
                    .context(UpdateRecordSnafu)?;
                Ok::<_, EnvError>(())
            })
            .await?;

        stemcell_manager
            .delete_unused(stage)
            .await
            .context(DeleteUnusedStemcellsSnafu)
    }
}
