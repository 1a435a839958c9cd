// ABOUTME: Deployment state persistence and local workspace configuration.
// ABOUTME: State file service, record repos, legacy migration, and workspace paths.

mod deserialize;
mod error;
mod legacy;
mod repo;
mod service;
mod state;
mod workspace;

pub use error::StateError;
pub use legacy::LegacyDeploymentStateMigrator;
pub use repo::{DeploymentRepo, DiskRepo, ReleaseRepo, Repos, StemcellRepo, VmRepo};
pub use service::{
    DeploymentStateService, FileSystemDeploymentStateService, LEGACY_STATE_FILENAME,
    deployment_state_path, legacy_deployment_state_path,
};
pub use state::{
    DeploymentState, DiskRecord, Properties, ReleaseRecord, ReleaseVersion, StemcellRecord,
};
pub use workspace::{HOME_ENV_VAR, WorkspaceConfig};
