// ABOUTME: Command handlers for the bosh-env CLI.
// ABOUTME: Turns parsed arguments into pipeline options and runs one pipeline.

mod create_env;
mod delete_env;
mod start_env;
mod stop_env;

pub use create_env::create_env;
pub use delete_env::delete_env;
pub use start_env::start_env;
pub use stop_env::stop_env;

use crate::cli::ManifestArgs;
use bosh_env::config::{WorkspaceConfig, deployment_state_path};
use bosh_env::env::{EnvDeps, EnvFactory, EnvOptions};
use bosh_env::error::{Error, Result};
use bosh_env::manifest::{Ops, Variables};
use bosh_env::output::{Output, Ui};
use bosh_env::stage::Stage;
use std::path::PathBuf;
use std::sync::Arc;

/// Where output goes and which workspace to use, shared by every command.
pub struct CommandContext {
    pub output: Arc<Output>,
    pub home: Option<PathBuf>,
    pub package_dir: Option<PathBuf>,
}

impl CommandContext {
    fn workspace(&self) -> Result<WorkspaceConfig> {
        let workspace = match &self.home {
            Some(home) => WorkspaceConfig::new(home),
            None => WorkspaceConfig::from_env().ok_or(Error::NoWorkspace)?,
        };
        Ok(match &self.package_dir {
            Some(dir) => workspace.with_package_dir(dir),
            None => workspace,
        })
    }

    fn stage(&self) -> Stage {
        Stage::new(Arc::clone(&self.output) as Arc<dyn Ui>)
    }

    /// Production dependencies for the state file of `options.manifest_path`.
    fn deps(&self, args: &ManifestArgs, options: &EnvOptions) -> Result<EnvDeps> {
        let state_path = deployment_state_path(&options.manifest_path, args.state.as_deref());
        let factory = EnvFactory::new(self.workspace()?, Arc::clone(&self.output) as Arc<dyn Ui>);
        Ok(factory.build(state_path, options)?)
    }
}

/// Assemble variables and ops from the manifest arguments.
///
/// Variable sources apply in order (vars files, env prefixes, var files,
/// then `--var`), so later sources win.
pub fn env_options(args: &ManifestArgs) -> Result<EnvOptions> {
    let mut vars = Variables::new();
    for path in &args.vars_files {
        vars.merge(Variables::from_yaml_file(path)?);
    }
    for prefix in &args.vars_env {
        vars.merge(Variables::from_env_prefix(prefix));
    }
    for arg in &args.var_files {
        let (name, value) = Variables::parse_file_assignment(arg)?;
        vars.insert(name, value);
    }
    for arg in &args.vars {
        let (name, value) = Variables::parse_assignment(arg)?;
        vars.insert(name, value);
    }

    let mut ops = Ops::default();
    for path in &args.ops_files {
        ops.extend(Ops::from_file(path)?);
    }

    let manifest_path = std::path::absolute(&args.manifest)?;
    Ok(EnvOptions {
        manifest_path,
        vars,
        ops,
        ..EnvOptions::default()
    })
}
