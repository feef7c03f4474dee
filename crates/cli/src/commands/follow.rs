//! `follow` command implementation.

use std::time::Duration;

use actor_factory::{Actor, ActorFactory, CarlaClient, Scene};
use anyhow::{Context, Result};
use camera_follower::{CameraFollower, CancellationToken, FollowConfig, FollowOutcome, StopReason};
use contracts::SessionConfig;
use tracing::info;

use super::common;
use crate::cli::FollowArgs;

/// Execute the `follow` command
pub async fn run_follow<C: CarlaClient + 'static>(
    client: C,
    session: &SessionConfig,
    args: &FollowArgs,
) -> Result<()> {
    let (_connection, scene) = common::connect(client, session).await?;
    let stop = common::stop_token(args.duration());

    let follower = CameraFollower::new(FollowConfig {
        poll_interval: Duration::from_millis(args.poll_interval_ms.max(1)),
        ..Default::default()
    });

    let outcome = common::with_ticking(&scene, session, stop.clone(), || {
        follow_target(&scene, args, &follower, stop.clone())
    })
    .await?;

    print_outcome(&outcome);
    Ok(())
}

async fn follow_target<C: CarlaClient>(
    scene: &Scene<C>,
    args: &FollowArgs,
    follower: &CameraFollower,
    stop: CancellationToken,
) -> Result<FollowOutcome> {
    let target = match args.actor_id {
        Some(actor_id) => common::find_vehicle(scene, actor_id).await?,
        None => spawn_ego(scene, args.type_filter.as_deref(), true).await?,
    };
    info!(target = %target, "Following vehicle, press Ctrl+C to stop");

    follower
        .follow(scene, &target, stop)
        .await
        .context("Camera follow failed")
}

/// Spawn the vehicle to follow
pub async fn spawn_ego<C: CarlaClient>(
    scene: &Scene<C>,
    type_filter: Option<&str>,
    autopilot: bool,
) -> Result<Actor> {
    let ego = ActorFactory::new(scene.clone())
        .spawn_one(type_filter)
        .await
        .context("Failed to spawn ego vehicle")?;

    if autopilot {
        scene
            .set_autopilot(&ego, true)
            .await
            .with_context(|| format!("Failed to enable autopilot on {ego}"))?;
    }
    Ok(ego)
}

pub fn print_outcome(outcome: &FollowOutcome) {
    let reason = match outcome.reason {
        StopReason::Cancelled => "stopped",
        StopReason::ActorLost => "target lost",
    };
    println!(
        "Camera follow {reason} after {} updates (camera {} left in place)",
        outcome.iterations, outcome.camera
    );
    println!("  Pose copy latency (ms): {}", outcome.copy_latency);
}
