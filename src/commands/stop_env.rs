// ABOUTME: stop-env command implementation.
// ABOUTME: Drains and stops the jobs of the environment recorded in the state file.

use super::{CommandContext, env_options};
use crate::cli::ManifestArgs;
use bosh_env::env::DeploymentStateManager;
use bosh_env::error::Result;

pub async fn stop_env(ctx: &CommandContext, args: &ManifestArgs, skip_drain: bool) -> Result<()> {
    let mut options = env_options(args)?;
    options.skip_drain = skip_drain;

    let deps = ctx.deps(args, &options)?;
    let stage = ctx.stage();
    DeploymentStateManager::new(deps, options)
        .stop_deployment(skip_drain, &stage)
        .await?;

    ctx.output.success("Succeeded");
    Ok(())
}
