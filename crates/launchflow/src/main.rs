mod commands;
mod console;
mod http;
mod image;
mod links;
mod platforms;
mod progress;

use clap::{Parser, Subcommand};
use commands::deploy::DeployArgs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "launch")]
#[command(about = "Idempotent AWS deployments from one deploy.yaml", long_about = None)]
struct Cli {
    /// Debug logging (RUST_LOG still wins when set)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy the app (or remove it with --destroy)
    Deploy(DeployArgs),
    /// Check the deploy file without touching any cloud account
    Validate {
        /// Deploy file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Show version information
    Version,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Version => {
            println!("launchflow {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Validate { config } => commands::validate::handle(config.as_deref()).await,
        Commands::Deploy(args) => commands::deploy::handle(&args).await,
    }
}
