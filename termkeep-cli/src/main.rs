use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod terminal;

#[derive(Parser)]
#[command(name = "termkeep", about = "Terminal sessions that keep their scrollback")]
#[command(version, propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Attach to a pane, spawning its shell if needed
    Attach(commands::attach::AttachArgs),
    /// Manage configuration
    Config(commands::config::ConfigArgs),
    /// Inspect and manage stored scrollback
    History(commands::history::HistoryArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // Logs go to stderr so they never mix with pane output on stdout
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Attach(args) => commands::attach::run(args).await,
        Commands::Config(args) => commands::config::run(args),
        Commands::History(args) => commands::history::run(args).await,
    }
}
