// ABOUTME: delete-env command implementation.
// ABOUTME: Runs the deployment deleter and reports the outcome.

use super::{CommandContext, env_options};
use crate::cli::ManifestArgs;
use bosh_env::env::DeploymentDeleter;
use bosh_env::error::Result;

pub async fn delete_env(ctx: &CommandContext, args: &ManifestArgs, skip_drain: bool) -> Result<()> {
    let mut options = env_options(args)?;
    options.skip_drain = skip_drain;

    let deps = ctx.deps(args, &options)?;
    let stage = ctx.stage();
    DeploymentDeleter::new(deps, options)
        .delete_deployment(skip_drain, &stage)
        .await?;

    ctx.output.success("Succeeded");
    Ok(())
}
