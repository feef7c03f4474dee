//! Chase camera loop
//!
//! Attaches a camera behind the target and keeps copying its world pose
//! onto the spectator until told to stop.

use std::time::{Duration, Instant};

use actor_factory::{Actor, CarlaClient, Scene};
use contracts::{default_camera_offset, CameraConfig, Transform};
use observability::{RunningStats, StatsSummary};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use crate::error::{FollowError, Result};

/// Follow loop settings
#[derive(Debug, Clone, PartialEq)]
pub struct FollowConfig {
    /// Blueprint of the attached camera
    pub camera_blueprint: String,
    /// Camera pose relative to the target
    pub offset: Transform,
    /// Wait between two pose copies
    pub poll_interval: Duration,
}

impl Default for FollowConfig {
    fn default() -> Self {
        Self {
            camera_blueprint: "sensor.camera.rgb".to_string(),
            offset: default_camera_offset(),
            poll_interval: Duration::from_millis(10),
        }
    }
}

impl From<&CameraConfig> for FollowConfig {
    fn from(config: &CameraConfig) -> Self {
        Self {
            camera_blueprint: config.blueprint.clone(),
            offset: config.offset,
            poll_interval: config.poll_interval(),
        }
    }
}

/// Why the follow loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Stop token fired
    Cancelled,
    /// Camera or target disappeared from the scene
    ActorLost,
}

/// Result of a completed follow
#[derive(Debug, Clone)]
pub struct FollowOutcome {
    /// Pose copies performed
    pub iterations: u64,
    /// The attached camera; left in the scene
    pub camera: Actor,
    pub reason: StopReason,
    /// Time spent per pose copy (milliseconds)
    pub copy_latency: StatsSummary,
}

/// Camera Follower
#[derive(Debug, Clone, Default)]
pub struct CameraFollower {
    config: FollowConfig,
}

impl CameraFollower {
    pub fn new(config: FollowConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FollowConfig {
        &self.config
    }

    /// Follow `target` with the spectator until `stop` is cancelled
    ///
    /// Setup spawns the camera attached to `target` and snaps the spectator
    /// onto it. Each iteration then copies the camera's world pose onto the
    /// spectator and waits one poll interval; cancellation interrupts the
    /// wait. A failed copy ends the loop with `StopReason::ActorLost`.
    ///
    /// The camera is not destroyed when the loop ends.
    ///
    /// # Errors
    /// Only setup failures; the loop itself always yields a `FollowOutcome`.
    #[instrument(
        name = "camera_follower_follow",
        skip(self, scene, target, stop),
        fields(target_id = target.id(), target_type = %target.type_id())
    )]
    pub async fn follow<C: CarlaClient>(
        &self,
        scene: &Scene<C>,
        target: &Actor,
        stop: CancellationToken,
    ) -> Result<FollowOutcome> {
        let (spectator, camera) = self.setup(scene, target).await.inspect_err(|e| {
            error!(error = %e, "camera follow setup failed");
        })?;
        info!(
            camera_id = camera.id(),
            interval_ms = self.config.poll_interval.as_millis() as u64,
            "following target"
        );

        observability::set_follow_active(true);
        let mut latency = RunningStats::default();
        let mut iterations = 0u64;

        let reason = loop {
            if stop.is_cancelled() {
                break StopReason::Cancelled;
            }

            let started = Instant::now();
            if let Err(e) = copy_pose(scene, &camera, &spectator).await {
                error!(error = %e, iterations, "lost camera or target, stopping");
                break StopReason::ActorLost;
            }
            let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
            latency.push(elapsed_ms);
            observability::record_follow_iteration(elapsed_ms);
            iterations += 1;

            let cancelled = tokio::select! {
                _ = stop.cancelled() => true,
                _ = tokio::time::sleep(self.config.poll_interval) => false,
            };
            if cancelled {
                break StopReason::Cancelled;
            }
        };
        observability::set_follow_active(false);

        let copy_latency = latency.summary();
        info!(iterations, ?reason, copy_latency_ms = %copy_latency, "camera follow stopped");

        Ok(FollowOutcome {
            iterations,
            camera,
            reason,
            copy_latency,
        })
    }

    async fn setup<C: CarlaClient>(&self, scene: &Scene<C>, target: &Actor) -> Result<(Actor, Actor)> {
        let spectator = scene.spectator().await.map_err(FollowError::Spectator)?;

        let camera = scene
            .spawn_attached(&self.config.camera_blueprint, self.config.offset, target)
            .await
            .map_err(|source| FollowError::CameraAttach {
                actor_id: target.id(),
                source,
            })?;
        debug!(camera_id = camera.id(), "camera attached");

        copy_pose(scene, &camera, &spectator)
            .await
            .map_err(FollowError::Snap)?;

        Ok((spectator, camera))
    }
}

async fn copy_pose<C: CarlaClient>(
    scene: &Scene<C>,
    camera: &Actor,
    spectator: &Actor,
) -> actor_factory::Result<()> {
    let pose = scene.transform(camera).await?;
    scene.set_transform(spectator, pose).await
}
