// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines the env subcommands and their shared manifest arguments.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "bosh-env")]
#[command(about = "Create, delete, start, and stop single-VM BOSH environments")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Only print the final result
    #[arg(short, long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// Print progress as JSON lines
    #[arg(long, global = true)]
    pub json: bool,

    /// Workspace root for installations and downloaded tarballs
    #[arg(long, global = true, env = "BOSH_ENV_HOME")]
    pub home: Option<PathBuf>,

    /// Compile CPI packages into this directory instead of the installation
    #[arg(long, global = true, value_name = "DIR")]
    pub package_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create or update an environment
    CreateEnv {
        #[command(flatten)]
        manifest: ManifestArgs,

        /// Recreate the VM even when nothing changed
        #[arg(long)]
        recreate: bool,

        /// Recreate the VM and migrate the persistent disk onto a new one
        #[arg(long)]
        recreate_persistent_disks: bool,

        /// Skip running drain scripts before stopping jobs
        #[arg(long)]
        skip_drain: bool,
    },

    /// Delete an environment
    DeleteEnv {
        #[command(flatten)]
        manifest: ManifestArgs,

        /// Skip running drain scripts before stopping jobs
        #[arg(long)]
        skip_drain: bool,
    },

    /// Start the jobs of an existing environment
    StartEnv {
        #[command(flatten)]
        manifest: ManifestArgs,
    },

    /// Stop the jobs of an existing environment
    StopEnv {
        #[command(flatten)]
        manifest: ManifestArgs,

        /// Skip running drain scripts before stopping jobs
        #[arg(long)]
        skip_drain: bool,
    },
}

/// The manifest and how to evaluate it.
#[derive(Args, Debug, Clone)]
pub struct ManifestArgs {
    /// Path to the environment manifest
    pub manifest: PathBuf,

    /// Deployment state file (defaults to <manifest>-state.json beside the manifest)
    #[arg(long)]
    pub state: Option<PathBuf>,

    /// Set a variable (name=value)
    #[arg(short = 'v', long = "var", value_name = "NAME=VALUE")]
    pub vars: Vec<String>,

    /// Load variables from a YAML file
    #[arg(short = 'l', long = "vars-file", value_name = "PATH")]
    pub vars_files: Vec<PathBuf>,

    /// Load variables from environment variables with this prefix (PREFIX_name)
    #[arg(long = "vars-env", value_name = "PREFIX")]
    pub vars_env: Vec<String>,

    /// Set a variable to the contents of a file (name=path)
    #[arg(long = "var-file", value_name = "NAME=PATH")]
    pub var_files: Vec<String>,

    /// Apply an ops file to the manifest
    #[arg(short = 'o', long = "ops-file", value_name = "PATH")]
    pub ops_files: Vec<PathBuf>,
}
