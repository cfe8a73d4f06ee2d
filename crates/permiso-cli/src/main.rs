//! Permiso CLI
//!
//! Runs permission-coordination demos and scripted scenarios against a
//! simulated host.

use std::io;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;

use permiso_cli::demo::{self, DemoArgs};
use permiso_cli::scenario::{load_scenario, run_scenario};
use permiso_core::config::load_config;
use permiso_core::tracing_init::{default_directive, init_tracing};

#[derive(Debug, Parser)]
#[command(name = "permiso", version, about = "Permission request coordinator demos and scenarios")]
struct Cli {
    /// Run without interactive prompts (grant by default, dismiss dialogs)
    #[arg(long, global = true)]
    non_interactive: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Config file (JSON), applied over the global settings
    #[arg(long, global = true, env = "PERMISO_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run a built-in demo
    Demo(DemoArgs),
    /// Run a scripted scenario file (TOML)
    Run {
        /// Path to the scenario
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    init_tracing(&default_directive(&config.log_level), cli.log_json);
    info!(version = env!("CARGO_PKG_VERSION"), "Starting permiso CLI");

    let transcript = match cli.command {
        Commands::Demo(ref args) => demo::run(args, config, cli.non_interactive).await?,
        Commands::Run { ref file } => {
            let scenario = load_scenario(file)?;
            run_scenario(&scenario, config)?
        }
    };

    transcript.write_to(&mut io::stdout())?;
    Ok(())
}
