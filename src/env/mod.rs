// ABOUTME: The environment pipelines behind create-env, delete-env, start-env, and stop-env.
// ABOUTME: Each pipeline runs its steps in sequence and reports them through a Stage.

mod deleter;
mod deps;
mod error;
mod preparer;
mod state_manager;

pub use deleter::DeploymentDeleter;
pub use deps::{EnvDeps, EnvFactory, EnvOptions};
pub use error::EnvError;
pub use preparer::DeploymentPreparer;
pub use state_manager::DeploymentStateManager;
