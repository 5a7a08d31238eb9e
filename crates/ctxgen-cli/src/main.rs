//! ctxgen - generate item-context and user-context features from rating logs.

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ctxgen_cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(format!("ctxgen={level}").parse()?))
        .init();

    match &cli.command {
        Commands::Generate(cmd) => cmd.run()?,
        Commands::Verify(cmd) => cmd.run()?,
        Commands::Inspect(cmd) => cmd.run()?,
    }

    info!("ctxgen completed successfully");
    Ok(())
}
