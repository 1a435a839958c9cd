// ABOUTME: Deploying the single-VM environment and managing what is deployed.
// ABOUTME: VM, disk, and instance lifecycles plus the persisted deployment record.

mod deployer;
mod disk;
mod error;
mod instance;
mod manager;
mod record;
mod vm;

pub use deployer::{CloudDeployer, Deployer};
pub use disk::DiskDeployer;
pub use error::DeployError;
pub use instance::{Instance, PING_DELAY, PING_TIMEOUT};
pub use manager::{
    CloudDeployment, Deployment, DeploymentManager, DeploymentManagerFactory,
    StateDeploymentManager, StateDeploymentManagerFactory, UNKNOWN_JOB_NAME,
};
pub use record::DeploymentRecord;
pub use vm::{CloudVmManager, RepoVmManagerFactory, Vm, VmManager, VmManagerFactory};
