//! Photograph CLI - ingest images into projects, query them by similarity
//! and inspect their 2D/3D projections.

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use commands::{IngestCommand, ProjectArg, QueryCommand};

/// Photograph CLI.
///
/// Data is stored in a redb database (default ~/.photograph/data/photograph.redb)
/// and images/text are encoded by an HTTP encoder service configured in
/// ~/.photograph/config.yaml.
#[derive(Parser)]
#[command(name = "photograph")]
#[command(about = "Image embedding projection and similarity search")]
#[command(version)]
pub struct Cli {
    /// Config file (default is ~/.photograph/config.yaml)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Database file (overrides the config)
    #[arg(long, global = true)]
    pub db: Option<String>,

    /// Output file (default: stdout)
    #[arg(short = 'o', long, global = true)]
    pub output: Option<String>,

    /// Input request file (YAML or JSON)
    #[arg(short = 'f', long = "file", global = true)]
    pub input: Option<String>,

    /// Verbose output
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Embed a batch of items and refresh the project's projection
    Ingest(IngestCommand),
    /// Rank a project's items by similarity to text or a source
    Query(QueryCommand),
    /// Print the projected coordinates of a project
    Points(ProjectArg),
    /// Print a summary of the project's projection model
    Model(ProjectArg),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Commands::Ingest(cmd) => cmd.run(&cli).await,
        Commands::Query(cmd) => cmd.run(&cli).await,
        Commands::Points(args) => commands::run_points(&cli, args),
        Commands::Model(args) => commands::run_model(&cli, args),
    }
}
