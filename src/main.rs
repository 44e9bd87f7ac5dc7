//! tube-fetch - command-line front end for the downloader

mod commands;

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tube-fetch")]
#[command(about = "Download videos and audio tracks by quality")]
struct Cli {
    /// TOML config file (defaults apply to anything it omits)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: commands::Commands,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    if let Err(e) = commands::handle_command(cli.config, cli.command).await {
        eprintln!("Error: {}", e.user_message());
        std::process::exit(1);
    }
}
