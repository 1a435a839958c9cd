// ABOUTME: Manifest loading: templates, ops, and the three manifest views.
// ABOUTME: One YAML file yields the release set, the installation, and the deployment.

mod deployment;
mod error;
mod installation;
mod ops;
mod parser;
mod release_set;
mod template;

pub use deployment::{
    DeploymentManifest, DiskPool, Job, JobNetwork, NETWORK_DYNAMIC, NETWORK_MANUAL, NETWORK_VIP,
    Network, ResourcePool, StemcellRef, Subnet, Update, WatchTime,
};
pub use error::ManifestError;
pub use installation::{Certificate, InstallationManifest, ReleaseJobRef};
pub use ops::{Op, Ops, OpsPath};
pub use parser::{DeploymentManifestParser, ReleaseSetAndInstallationManifestParser};
pub use release_set::{ReleaseRef, ReleaseSetManifest};
pub use template::{InterpolatedTemplate, Template, Variables};

