//! Drover CLI - declarative multi-cluster deployment reconciler

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod error;
mod exit_codes;

use error::CliError;

#[derive(Parser)]
#[command(name = "drover")]
#[command(author = "Drover Contributors")]
#[command(version)]
#[command(about = "Declarative multi-cluster deployment reconciler", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// State store directory
    #[arg(long, global = true, env = "DROVER_STATE_DIR", default_value = ".drover")]
    state_dir: PathBuf,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Seed an empty state store
    Init,

    /// Point a deployment at a new version and persist the GDM
    Update {
        /// Source identity: repo,version[,dir]
        source_id: String,

        /// Target cluster name
        #[arg(short, long)]
        cluster: String,

        /// Manifest flavor
        #[arg(long, default_value = "")]
        flavor: String,

        /// Acting user, recorded in the audit log
        #[arg(long, env = "DROVER_USER", default_value = "anonymous")]
        user: String,
    },

    /// List manifests and their per-cluster versions
    Manifests,
}

fn main() {
    if let Err(err) = run() {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

#[tokio::main]
async fn run() -> Result<(), CliError> {
    // Setup miette for nice error display
    miette::set_panic_hook();

    let cli = Cli::parse();

    if cli.debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("drover=debug")),
            )
            .init();
    }

    match cli.command {
        Commands::Init => commands::init::run(&cli.state_dir),
        Commands::Update {
            source_id,
            cluster,
            flavor,
            user,
        } => commands::update::run(&cli.state_dir, &source_id, &cluster, &flavor, &user).await,
        Commands::Manifests => commands::manifests::run(&cli.state_dir).await,
    }
}
