use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use calcpilot::SessionConfig;

#[derive(Parser)]
#[command(name = "calcpilot")]
#[command(about = "MCP server that drives a desktop calculator by clicking")]
#[command(version)]
struct Cli {
    /// Session config (YAML). Defaults plus environment overrides when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Interface map JSON (overrides config)
    #[arg(short, long)]
    map: Option<PathBuf>,

    /// X display to use (overrides config)
    #[arg(long)]
    display: Option<String>,

    /// Verbose logging (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    // stdout carries the protocol.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(false)
        .compact()
        .init();

    let mut config = match cli.config {
        Some(ref path) => SessionConfig::load(path)?,
        None => SessionConfig::from_env()?,
    };
    if let Some(map) = cli.map {
        config.interface_map.path = map;
    }
    if let Some(display) = cli.display {
        config.app.display = Some(display);
    }
    config.validate()?;

    tracing::info!(
        "serving {} with map {}",
        config.app.name,
        config.interface_map.path.display()
    );
    calcpilot::mcp::run_server(config).await
}
