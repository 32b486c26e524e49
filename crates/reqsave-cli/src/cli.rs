use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "reqsave",
    about = "Capture HTTP requests and persist them as tar archives",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the request-saving server
    Serve(ServeArgs),
    /// Show the entries of a saved request
    Inspect(InspectArgs),
    /// Print the effective configuration
    Config(ConfigArgs),
}

#[derive(Args)]
pub struct ServeArgs {
    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Override the configured bind address
    #[arg(long)]
    pub bind: Option<SocketAddr>,
}

#[derive(Args)]
pub struct InspectArgs {
    /// Saved archive file
    pub file: PathBuf,
    /// Print body bytes as hex instead of text
    #[arg(long)]
    pub hex: bool,
}

#[derive(Args)]
pub struct ConfigArgs {
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}
