//! # CARLA Helpers CLI
//!
//! Command-line entry point.
//!
//! Provides:
//! - One-shot commands: spawn, spawn-many, autopilot, destroy-all, info
//! - Long-running commands: follow, run (scenario file)
//! - Graceful shutdown on Ctrl+C / SIGTERM

mod cli;
mod commands;

use actor_factory::{CarlaClient, MockCarlaClient};
use anyhow::Result;
use clap::Parser;
use observability::ObservabilityConfig;
use tracing::info;

use cli::{Backend, Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Initialize logging based on CLI options
    init_observability(&cli)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        backend = ?cli.connection.backend,
        "CARLA helpers starting"
    );

    // Execute command
    let result = match cli.connection.backend {
        Backend::Mock => execute(MockCarlaClient::new(), &cli).await,
        Backend::Carla => execute_real(&cli).await,
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}

#[cfg(feature = "real-carla")]
async fn execute_real(cli: &Cli) -> Result<()> {
    execute(actor_factory::RealCarlaClient::new(), cli).await
}

#[cfg(not(feature = "real-carla"))]
async fn execute_real(cli: &Cli) -> Result<()> {
    if let Commands::Validate(ref args) = cli.command {
        return commands::run_validate(args);
    }
    anyhow::bail!("Built without CARLA support; rebuild with `--features real-carla` or pass `--backend mock`")
}

async fn execute<C: CarlaClient + 'static>(client: C, cli: &Cli) -> Result<()> {
    let session = cli.connection.apply(Default::default());

    match &cli.command {
        Commands::Spawn(args) => commands::run_spawn(client, &session, args).await,
        Commands::SpawnMany(args) => commands::run_spawn_many(client, &session, args).await,
        Commands::Autopilot(args) => commands::run_autopilot(client, &session, args).await,
        Commands::DestroyAll => commands::run_destroy_all(client, &session).await,
        Commands::Follow(args) => commands::run_follow(client, &session, args).await,
        Commands::Run(args) => commands::run_scenario(client, &cli.connection, args).await,
        Commands::Validate(args) => commands::run_validate(args),
        Commands::Info(args) => commands::run_info(client, &session, args).await,
    }
}

/// Initialize logging and metrics based on CLI options
fn init_observability(cli: &Cli) -> Result<()> {
    let default_log_level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    observability::init_with_config(ObservabilityConfig {
        log_format: cli.log_format.into(),
        metrics_port: (cli.metrics_port != 0).then_some(cli.metrics_port),
        default_log_level: default_log_level.to_string(),
    })
}
