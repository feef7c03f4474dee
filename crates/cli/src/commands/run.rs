//! `run` command implementation.

use actor_factory::{ActorFactory, CarlaClient, FleetController, Scene, SpawnSummary};
use anyhow::{Context, Result};
use camera_follower::{CameraFollower, CancellationToken, FollowConfig, FollowOutcome};
use contracts::ScenarioConfig;
use tracing::{info, warn};

use super::common;
use super::follow::{print_outcome, spawn_ego};
use crate::cli::{ConnectionArgs, RunArgs};

/// Execute the `run` command
pub async fn run_scenario<C: CarlaClient + 'static>(
    client: C,
    connection_args: &ConnectionArgs,
    args: &RunArgs,
) -> Result<()> {
    let config = load_scenario(connection_args, args)?;

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - scenario is valid, exiting");
        print_config_summary(&config);
        return Ok(());
    }

    let (_connection, scene) = common::connect(client, &config.session).await?;
    let stop = common::stop_token(args.duration());

    info!("Starting scenario...");
    let report = common::with_ticking(&scene, &config.session, stop.clone(), || {
        drive(&scene, &config, stop.clone())
    })
    .await;

    if config.fleet.cleanup_on_exit {
        match FleetController::new(scene.clone()).destroy_all().await {
            Ok(destroyed) => info!(destroyed, "Cleaned up actors"),
            Err(e) => warn!(error = %e, "Cleanup failed"),
        }
    }

    let report = report.context("Scenario failed")?;
    report.print();

    info!("CARLA helpers finished");
    Ok(())
}

/// Load the scenario file and apply command line overrides
fn load_scenario(connection_args: &ConnectionArgs, args: &RunArgs) -> Result<ScenarioConfig> {
    info!(config = %args.config.display(), "Loading scenario");

    if !args.config.exists() {
        anyhow::bail!("Scenario file not found: {}", args.config.display());
    }

    let mut config = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load scenario from {}", args.config.display()))?;

    config.session = connection_args.apply(config.session);
    config_loader::ConfigLoader::validate(&config).context("Invalid scenario after overrides")?;

    info!(
        endpoint = %config.session.endpoint(),
        stepped = config.session.stepped_mode,
        fleet = config.fleet.count,
        camera = config.camera.enabled,
        "Scenario loaded"
    );
    Ok(config)
}

#[derive(Debug)]
struct ScenarioReport {
    fleet: SpawnSummary,
    autopilot: Option<usize>,
    follow: Option<FollowOutcome>,
}

impl ScenarioReport {
    fn print(&self) {
        println!("\n=== Scenario Summary ===\n");
        println!("Fleet: {}", self.fleet);
        if let Some(updated) = self.autopilot {
            println!("Autopilot enabled on {updated} vehicles");
        }
        if let Some(ref outcome) = self.follow {
            print_outcome(outcome);
        }
        println!();
    }
}

/// Spawn the ego vehicle and the fleet, then follow the ego (or idle) until stopped
async fn drive<C: CarlaClient>(
    scene: &Scene<C>,
    config: &ScenarioConfig,
    stop: CancellationToken,
) -> Result<ScenarioReport> {
    // Ego first: its strict spawn must not race the fleet for free points
    let ego = if config.camera.enabled {
        Some(spawn_ego(scene, config.camera.ego_type.as_deref(), false).await?)
    } else {
        None
    };

    let fleet = ActorFactory::new(scene.clone())
        .spawn_many(config.fleet.count, config.fleet.vehicle_types.as_deref())
        .await;

    let autopilot = if config.fleet.autopilot {
        let updated = FleetController::new(scene.clone())
            .set_autopilot(true)
            .await
            .context("Failed to enable autopilot")?;
        Some(updated)
    } else {
        None
    };

    let follow = match ego {
        Some(ego) => {
            info!(ego = %ego, "Following ego vehicle, press Ctrl+C to stop");
            let follower = CameraFollower::new(FollowConfig::from(&config.camera));
            Some(
                follower
                    .follow(scene, &ego, stop)
                    .await
                    .context("Camera follow failed")?,
            )
        }
        None => {
            info!("Camera disabled, running until stopped");
            stop.cancelled().await;
            None
        }
    };

    Ok(ScenarioReport {
        fleet,
        autopilot,
        follow,
    })
}

/// Print scenario summary for dry-run mode
fn print_config_summary(config: &ScenarioConfig) {
    println!("\n=== Scenario Summary ===\n");
    println!("Session:");
    println!("  CARLA: {}", config.session.endpoint());
    println!("  Timeout: {:.1}s", config.session.timeout_secs);
    if config.session.stepped_mode {
        println!("  Stepped: {:.3}s per tick", config.session.step_size);
    } else {
        println!("  Stepped: no");
    }

    println!("\nFleet:");
    println!("  Spawn attempts: {}", config.fleet.count);
    match config.fleet.vehicle_types {
        Some(ref types) => println!("  Vehicle types: {}", types.join(", ")),
        None => println!("  Vehicle types: all vehicles"),
    }
    println!("  Autopilot: {}", config.fleet.autopilot);
    println!("  Cleanup on exit: {}", config.fleet.cleanup_on_exit);

    println!("\nCamera:");
    if config.camera.enabled {
        println!(
            "  Ego vehicle: {}",
            config.camera.ego_type.as_deref().unwrap_or("random vehicle")
        );
        println!("  Blueprint: {}", config.camera.blueprint);
        println!("  Poll interval: {}ms", config.camera.poll_interval_ms);
    } else {
        println!("  Disabled");
    }

    println!();
}
