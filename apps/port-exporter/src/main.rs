mod config;
mod serve;
mod signals;

use anyhow::Result;
use clap::{Parser, Subcommand};
use service_export::ServiceExporter;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use crate::config::AppConfig;

/// Port exporter - echo service published by name in the coordination store
#[derive(Parser)]
#[command(name = "port-exporter")]
#[command(about = "Serve an echo service on an anonymous port published by name")]
#[command(version)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print effective configuration (JSON) and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v debug, -vv trace); `RUST_LOG` takes precedence
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Export the service and serve until interrupted
    Run,
    /// Validate configuration and TLS material, then exit
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = cli.config.as_deref()
        && !path.is_file()
    {
        anyhow::bail!("config file does not exist: {}", path.display());
    }

    init_logging(cli.verbose);

    let config = AppConfig::load(cli.config.as_deref())?;

    if cli.print_config {
        println!("{}", config.to_pretty_json()?);
        return Ok(());
    }

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(&config).await,
        Commands::Check => check(&config, cli.config.as_deref()),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn check(config: &AppConfig, source: Option<&Path>) -> Result<()> {
    if let Some(tls) = &config.tls {
        tls.server_config()?;
    }
    match source {
        Some(path) => println!("Configuration '{}' is valid", path.display()),
        None => println!("Configuration is valid"),
    }
    println!("{}", config.to_pretty_json()?);
    Ok(())
}

async fn run(config: &AppConfig) -> Result<()> {
    tracing::info!(service = %config.service.name, "port exporter starting");

    let exporter = ServiceExporter::connect(&config.exporter()).await?;

    let cancel = CancellationToken::new();
    let shutdown = {
        let cancel = cancel.clone();
        tokio::spawn(async move { signals::cancel_on_shutdown(&cancel).await })
    };

    let result = serve::run(&exporter, config, &cancel).await;
    cancel.cancel();
    if let Err(e) = shutdown.await {
        tracing::warn!(error = %e, "signal watcher ended abnormally");
    }
    result
}
