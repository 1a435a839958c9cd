// ABOUTME: create-env command implementation.
// ABOUTME: Runs the deployment preparer and reports the outcome.

use super::{CommandContext, env_options};
use crate::cli::ManifestArgs;
use bosh_env::env::DeploymentPreparer;
use bosh_env::error::Result;

pub async fn create_env(
    ctx: &CommandContext,
    args: &ManifestArgs,
    recreate: bool,
    recreate_persistent_disks: bool,
    skip_drain: bool,
) -> Result<()> {
    let mut options = env_options(args)?;
    options.recreate = recreate;
    options.recreate_persistent_disks = recreate_persistent_disks;
    options.skip_drain = skip_drain;

    let deps = ctx.deps(args, &options)?;
    let stage = ctx.stage();
    DeploymentPreparer::new(deps, options)
        .prepare_deployment(&stage)
        .await?;

    ctx.output.success("Succeeded");
    Ok(())
}
