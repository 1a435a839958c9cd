// ABOUTME: Entry point for the bosh-env CLI application.
// ABOUTME: Parses arguments and dispatches to appropriate command handlers.

mod cli;
mod commands;

use bosh_env::error::Result;
use bosh_env::output::{Output, OutputMode};
use clap::Parser;
use cli::{Cli, Commands};
use commands::CommandContext;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins over the verbose flag when set
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("warn")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mode = if cli.json {
        OutputMode::Json
    } else if cli.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Normal
    };
    let mut output = Output::new(mode);
    output.start_timer();
    let ctx = CommandContext {
        output: Arc::new(output),
        home: cli.home.clone(),
        package_dir: cli.package_dir.clone(),
    };

    if let Err(e) = run(cli.command, &ctx).await {
        ctx.output.error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run(command: Commands, ctx: &CommandContext) -> Result<()> {
    match command {
        Commands::CreateEnv {
            manifest,
            recreate,
            recreate_persistent_disks,
            skip_drain,
        } => {
            commands::create_env(ctx, &manifest, recreate, recreate_persistent_disks, skip_drain)
                .await
        }
        Commands::DeleteEnv {
            manifest,
            skip_drain,
        } => commands::delete_env(ctx, &manifest, skip_drain).await,
        Commands::StartEnv { manifest } => commands::start_env(ctx, &manifest).await,
        Commands::StopEnv {
            manifest,
            skip_drain,
        } => commands::stop_env(ctx, &manifest, skip_drain).await,
    }
}
