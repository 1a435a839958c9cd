// ABOUTME: start-env command implementation.
// ABOUTME: Starts the jobs of the environment recorded in the state file.

use super::{CommandContext, env_options};
use crate::cli::ManifestArgs;
use bosh_env::env::DeploymentStateManager;
use bosh_env::error::Result;

pub async fn start_env(ctx: &CommandContext, args: &ManifestArgs) -> Result<()> {
    let options = env_options(args)?;
    let deps = ctx.deps(args, &options)?;
    let stage = ctx.stage();
    DeploymentStateManager::new(deps, options)
        .start_deployment(&stage)
        .await?;

    ctx.output.success("Succeeded");
    Ok(())
}
