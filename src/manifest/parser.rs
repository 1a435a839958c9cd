// ABOUTME: Turns a manifest file plus vars and ops into validated manifests.
// ABOUTME: The release set is parsed before the installation, which refers to it by name.

use super::deployment::{DeploymentManifest, Update};
use super::error::ManifestError;
use super::installation::{InstallationManifest, RawCombinedManifest};
use super::ops::Ops;
use super::release_set::ReleaseSetManifest;
use super::template::{Template, Variables};
use crate::release::ReleaseManager;
use crate::stage::Stage;
use serde::Deserialize;
use std::path::Path;

/// Parses the releases and the CPI installation out of one manifest file.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReleaseSetAndInstallationManifestParser;

impl ReleaseSetAndInstallationManifestParser {
    pub fn new() -> Self {
        Self
    }

    pub fn release_set_and_installation_manifest(
        &self,
        path: &Path,
        vars: &Variables,
        ops: &Ops,
    ) -> Result<(ReleaseSetManifest, InstallationManifest), ManifestError> {
        let interpolated = Template::load(path)
            .and_then(|t| t.evaluate(vars, ops))
            .map_err(ManifestError::in_manifest("Evaluating manifest", path))?;

        let mut release_set: ReleaseSetManifest = interpolated
            .deserialize()
            .map_err(ManifestError::in_manifest("Parsing release set manifest", path))?;
        let base_dir = manifest_dir(path);
        for release in &mut release_set.releases {
            release.url = resolve_file_url(&release.url, base_dir);
        }
        release_set
            .validate()
            .map_err(ManifestError::in_manifest("Validating release set manifest", path))?;

        let raw: RawCombinedManifest = interpolated
            .deserialize()
            .map_err(ManifestError::in_manifest("Parsing installation manifest", path))?;
        let installation = InstallationManifest::from_raw(raw);
        installation
            .validate(&release_set)
            .map_err(ManifestError::in_manifest("Validating installation manifest", path))?;

        Ok((release_set, installation))
    }
}

/// Parses and validates the deployment part of a manifest.
#[derive(Debug, Clone)]
pub struct DeploymentManifestParser {
    release_manager: ReleaseManager,
}

impl DeploymentManifestParser {
    pub fn new(release_manager: ReleaseManager) -> Self {
        Self { release_manager }
    }

    /// Evaluate, parse, and validate the deployment manifest.
    ///
    /// Returns the manifest and the SHA-256 of its interpolated content.
    pub async fn get_deployment_manifest(
        &self,
        path: &Path,
        vars: &Variables,
        ops: &Ops,
        release_set: &ReleaseSetManifest,
        stage: &Stage,
    ) -> Result<(DeploymentManifest, String), ManifestError> {
        stage
            .perform("Validating deployment manifest", || async move {
                let interpolated = Template::load(path)
                    .and_then(|t| t.evaluate(vars, ops))
                    .map_err(ManifestError::in_manifest("Evaluating manifest", path))?;
                let sha = interpolated.sha();

                let mut manifest: DeploymentManifest = interpolated
                    .deserialize()
                    .map_err(ManifestError::in_manifest("Parsing deployment manifest", path))?;
                let base_dir = manifest_dir(path);
                for pool in &mut manifest.resource_pools {
                    pool.stemcell.url = resolve_file_url(&pool.stemcell.url, base_dir);
                }

                manifest
                    .validate(release_set)
                    .map_err(ManifestError::in_manifest("Validating deployment manifest", path))?;
                manifest
                    .validate_release_jobs(&self.release_manager)
                    .map_err(ManifestError::in_manifest(
                        "Validating deployment jobs refer to jobs in release",
                        path,
                    ))?;

                Ok((manifest, sha))
            })
            .await
    }

    /// Only the `update` block, without validation. Used by start and stop.
    pub fn get_deployment_manifest_update(
        &self,
        path: &Path,
        vars: &Variables,
        ops: &Ops,
    ) -> Result<Update, ManifestError> {
        #[derive(Deserialize)]
        struct UpdateOnly {
            #[serde(default)]
            update: Update,
        }

        let interpolated = Template::load(path)
            .and_then(|t| t.evaluate(vars, ops))
            .map_err(ManifestError::in_manifest("Evaluating manifest", path))?;
        let parsed: UpdateOnly = interpolated
            .deserialize()
            .map_err(ManifestError::in_manifest("Parsing deployment manifest", path))?;
        Ok(parsed.update)
    }
}

fn manifest_dir(path: &Path) -> &Path {
    path.parent().unwrap_or_else(|| Path::new("."))
}

/// Make a relative `file://` URL absolute against the manifest's directory.
pub(crate) fn resolve_file_url(url: &str, base_dir: &Path) -> String {
    match url.strip_prefix("file://") {
        Some(rest) if !rest.is_empty() && !Path::new(rest).is_absolute() => {
            let rest = rest.strip_prefix("~/").map_or_else(
                || base_dir.join(rest),
                |home_rel| {
                    std::env::var_os("HOME")
                        .map(|home| Path::new(&home).join(home_rel))
                        .unwrap_or_else(|| base_dir.join(rest))
                },
            );
            format!("file://{}", rest.display())
        }
        _ => url.to_string(),
    }
}
