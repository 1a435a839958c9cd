// ABOUTME: Pipeline errors for create-env, delete-env, start-env, and stop-env.
// ABOUTME: Each variant names the pipeline step that failed, SNAFU style.

use crate::agent::AgentError;
use crate::blobstore::BlobstoreError;
use crate::cloud::CloudError;
use crate::config::StateError;
use crate::cpi::CpiError;
use crate::deployment::DeployError;
use crate::installation::InstallError;
use crate::manifest::ManifestError;
use crate::release::ReleaseError;
use crate::stemcell::StemcellError;
use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum EnvError {
    #[snafu(display("Migrating legacy deployment state file: {source}"))]
    MigrateLegacyState { source: StateError },

    #[snafu(display("Loading deployment state: {source}"))]
    LoadState { source: StateError },

    #[snafu(display("Determining installation target: {source}"))]
    InstallationTarget { source: StateError },

    #[snafu(display("Setting temp root: {source}"))]
    TempRoot { source: std::io::Error },

    #[snafu(display("{source}"))]
    Manifest { source: ManifestError },

    #[snafu(display("Extracting release '{name}': {source}"))]
    Release { name: String, source: ReleaseError },

    #[snafu(display("Invalid CPI release '{release}': {source}"))]
    InvalidCpiRelease { release: String, source: CpiError },

    #[snafu(display("Installing CPI: {source}"))]
    InstallCpi { source: CpiError },

    #[snafu(display("Validating CPI api version: {source}"))]
    CpiApiVersion { source: CpiError },

    #[snafu(display("Extracting stemcell: {source}"))]
    Stemcell { source: StemcellError },

    #[snafu(display("Checking if deployment has changed: {source}"))]
    CheckDeployed { source: StateError },

    #[snafu(display("Creating CPI client from CPI installation: {source}"))]
    NewCloud { source: CloudError },

    #[snafu(display("Validating CPI api version: {source}"))]
    CpiInfo { source: CloudError },

    #[snafu(display("Uploading stemcell: {source}"))]
    UploadStemcell { source: StemcellError },

    #[snafu(display("Creating agent client: {source}"))]
    NewAgentClient { source: AgentError },

    #[snafu(display("Creating blobstore client: {source}"))]
    NewBlobstore { source: BlobstoreError },

    #[snafu(display("Creating blobstore client: {source}"))]
    HttpClient { source: reqwest::Error },

    #[snafu(display("Clearing deployment record: {source}"))]
    ClearRecord { source: StateError },

    #[snafu(display("Deploying: {source}"))]
    Deploy { source: DeployError },

    #[snafu(display("Updating deployment record: {source}"))]
    UpdateRecord { source: StateError },

    #[snafu(display("Deleting unused stemcells: {source}"))]
    DeleteUnusedStemcells { source: StemcellError },

    #[snafu(display("Deleting deployment: {source}"))]
    DeleteDeployment { source: DeployError },

    #[snafu(display("Uninstalling local artifacts for CPI and deployment: {source}"))]
    Uninstall { source: InstallError },

    #[snafu(display("Deleting deployment state file: {source}"))]
    DeleteState { source: StateError },

    #[snafu(display("Stopping environment: {source}"))]
    Stop { source: DeployError },

    #[snafu(display("Starting environment: {source}"))]
    Start { source: DeployError },

    #[snafu(display("{action} environment: No current deployment found"))]
    NoCurrentDeployment { action: &'static str },
}

// The scoped CPI installation only surfaces its own install failures.
impl From<CpiError> for EnvError {
    fn from(source: CpiError) -> Self {
        EnvError::InstallCpi { source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_current_deployment_names_the_action() {
        let err = EnvError::NoCurrentDeployment { action: "Stopping" };
        assert_eq!(
            err.to_string(),
            "Stopping environment: No current deployment found"
        );
    }

    #[test]
    fn context_prefixes_the_cause() {
        let err = EnvError::TempRoot {
            source: std::io::Error::other("read-only file system"),
        };
        assert_eq!(err.to_string(), "Setting temp root: read-only file system");
    }

    #[test]
    fn cpi_errors_name_their_step() {
        let err = EnvError::InvalidCpiRelease {
            release: "bosh-warden-cpi".to_string(),
            source: CpiError::ReleaseNotFound("bosh-warden-cpi".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Invalid CPI release 'bosh-warden-cpi': installation release 'bosh-warden-cpi' must refer to a provided release"
        );

        let err = EnvError::from(CpiError::Install(InstallError::ReleaseNotFound(
            "cpi".to_string(),
        )));
        assert!(err.to_string().starts_with("Installing CPI: "));
    }
}
