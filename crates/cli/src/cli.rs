//! CLI argument definitions using clap.

use clap::{Args, Parser, Subcommand, ValueEnum};
use contracts::SessionConfig;
use std::path::PathBuf;
use std::time::Duration;

/// CARLA Helpers - spawn, drive and watch vehicles in a CARLA simulator
#[derive(Parser, Debug)]
#[command(
    name = "carla-helpers",
    author,
    version,
    about = "Helpers for driving a CARLA simulator",
    long_about = "Small helpers around a running CARLA simulator.\n\n\
                  Connects to the server, spawns vehicles at recommended spawn points, \n\
                  toggles autopilot, clears the world and follows a vehicle with the \n\
                  spectator camera."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "CARLA_HELPERS_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "CARLA_HELPERS_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", global = true, env = "CARLA_HELPERS_METRICS_PORT")]
    pub metrics_port: u16,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Simulator connection options, shared by every command
#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// CARLA server host
    #[arg(long, global = true, env = "CARLA_HOST")]
    pub host: Option<String>,

    /// CARLA server port
    #[arg(long, global = true, env = "CARLA_PORT")]
    pub port: Option<u16>,

    /// Connection and request timeout in seconds
    #[arg(long, global = true, env = "CARLA_TIMEOUT")]
    pub timeout: Option<f64>,

    /// Run the simulation in stepped (synchronous, fixed step) mode
    #[arg(long, global = true, env = "CARLA_STEPPED")]
    pub stepped: bool,

    /// Fixed step in seconds when stepped
    #[arg(long, global = true, env = "CARLA_STEP_SIZE")]
    pub step_size: Option<f64>,

    /// Simulator backend
    #[arg(long, value_enum, default_value_t = Backend::default(), global = true, env = "CARLA_HELPERS_BACKEND")]
    pub backend: Backend,
}

impl ConnectionArgs {
    /// Apply the flags given on the command line on top of `base`
    pub fn apply(&self, mut base: SessionConfig) -> SessionConfig {
        if let Some(ref host) = self.host {
            base.host = host.clone();
        }
        if let Some(port) = self.port {
            base.port = port;
        }
        if let Some(timeout) = self.timeout {
            base.timeout_secs = timeout;
        }
        if let Some(step_size) = self.step_size {
            base.step_size = step_size;
        }
        if self.stepped {
            base.stepped_mode = true;
        }
        base
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Spawn one vehicle at a random spawn point
    Spawn(SpawnArgs),

    /// Spawn a batch of vehicles, skipping occupied spawn points
    SpawnMany(SpawnManyArgs),

    /// Enable or disable autopilot on every vehicle
    Autopilot(AutopilotArgs),

    /// Destroy every actor in the world
    DestroyAll,

    /// Follow a vehicle with the spectator camera
    Follow(FollowArgs),

    /// Run a scenario file: spawn a fleet and follow an ego vehicle
    Run(RunArgs),

    /// Validate a scenario file without connecting
    Validate(ValidateArgs),

    /// Show server and world information
    Info(InfoArgs),
}

/// Arguments for the `spawn` command
#[derive(Args, Debug, Clone)]
pub struct SpawnArgs {
    /// Blueprint filter, e.g. "vehicle.tesla.*" (first match is used)
    #[arg(short = 't', long = "type")]
    pub type_filter: Option<String>,

    /// Enable autopilot on the new vehicle
    #[arg(long)]
    pub autopilot: bool,
}

/// Arguments for the `spawn-many` command
#[derive(Args, Debug, Clone)]
pub struct SpawnManyArgs {
    /// Number of spawn attempts
    #[arg(short = 'n', long, default_value = "10")]
    pub count: usize,

    /// Blueprint filters (repeatable); all vehicles when omitted
    #[arg(short = 't', long = "type")]
    pub types: Vec<String>,

    /// Enable autopilot on all vehicles afterwards
    #[arg(long)]
    pub autopilot: bool,
}

/// Arguments for the `autopilot` command
#[derive(Args, Debug, Clone)]
pub struct AutopilotArgs {
    /// Disable instead of enable
    #[arg(long)]
    pub off: bool,
}

/// Arguments for the `follow` command
#[derive(Args, Debug, Clone)]
pub struct FollowArgs {
    /// Id of an existing vehicle; a new one is spawned when omitted
    #[arg(long)]
    pub actor_id: Option<u32>,

    /// Blueprint filter for the spawned vehicle
    #[arg(short = 't', long = "type", conflicts_with = "actor_id")]
    pub type_filter: Option<String>,

    /// Stop after this many seconds (runs until Ctrl+C when omitted)
    #[arg(long)]
    pub duration: Option<f64>,

    /// Pose copy interval in milliseconds
    #[arg(long, default_value = "10")]
    pub poll_interval_ms: u64,
}

impl FollowArgs {
    pub fn duration(&self) -> Option<Duration> {
        self.duration
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }
}

/// Arguments for the `run` command
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Path to scenario file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "scenario.toml",
        env = "CARLA_HELPERS_CONFIG"
    )]
    pub config: PathBuf,

    /// Stop after this many seconds (runs until Ctrl+C when omitted)
    #[arg(long)]
    pub duration: Option<f64>,

    /// Validate the scenario and exit without connecting
    #[arg(long)]
    pub dry_run: bool,
}

impl RunArgs {
    pub fn duration(&self) -> Option<Duration> {
        self.duration
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }
}

/// Arguments for the `validate` command
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Path to scenario file to validate
    #[arg(short, long, default_value = "scenario.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Args, Debug)]
pub struct InfoArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// List every actor
    #[arg(long)]
    pub actors: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

/// Simulator backend
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backend {
    /// In-memory simulator, for trying commands without a server
    Mock,
    /// Real CARLA server (requires the `real-carla` feature)
    Carla,
}

impl Default for Backend {
    fn default() -> Self {
        if cfg!(feature = "real-carla") {
            Self::Carla
        } else {
            Self::Mock
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_spawn_many() {
        let cli = Cli::try_parse_from([
            "carla-helpers",
            "spawn-many",
            "-n",
            "5",
            "-t",
            "vehicle.audi.*",
            "-t",
            "*mustang*",
            "--host",
            "10.0.0.2",
        ])
        .unwrap();

        match cli.command {
            Commands::SpawnMany(args) => {
                assert_eq!(args.count, 5);
                assert_eq!(args.types, vec!["vehicle.audi.*", "*mustang*"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert_eq!(cli.connection.host.as_deref(), Some("10.0.0.2"));
    }

    #[test]
    fn test_connection_args_override_config() {
        let cli = Cli::try_parse_from([
            "carla-helpers",
            "--port",
            "3000",
            "--stepped",
            "--step-size",
            "0.1",
            "destroy-all",
        ])
        .unwrap();

        let config = cli.connection.apply(SessionConfig::new("sim-host", 2000));

        assert_eq!(config.host, "sim-host");
        assert_eq!(config.port, 3000);
        assert!(config.stepped_mode);
        assert_eq!(config.step_size, 0.1);
    }

    #[test]
    fn test_follow_rejects_type_with_actor_id() {
        let result = Cli::try_parse_from([
            "carla-helpers",
            "follow",
            "--actor-id",
            "1000",
            "--type",
            "vehicle.*",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_backend_parses() {
        let cli = Cli::try_parse_from(["carla-helpers", "--backend", "mock", "autopilot", "--off"])
            .unwrap();
        assert_eq!(cli.connection.backend, Backend::Mock);
        assert!(matches!(cli.command, Commands::Autopilot(AutopilotArgs { off: true })));
    }
}
