//! Fleet control
//!
//! Bulk operations over the actors currently in the scene.

use tracing::{error, info, instrument};

use crate::client::CarlaClient;
use crate::error::{ActorFactoryError, Result};
use crate::session::{Actor, Scene};

/// Actor filter selecting every vehicle
const VEHICLE_FILTER: &str = "*vehicle*";

/// Fleet Controller
///
/// Operations stop at the first per-actor failure. The error reports how
/// many actors were handled before it; those changes are not rolled back.
pub struct FleetController<C: CarlaClient> {
    scene: Scene<C>,
}

impl<C: CarlaClient> FleetController<C> {
    pub fn new(scene: Scene<C>) -> Self {
        Self { scene }
    }

    /// Enable or disable autopilot on every vehicle in the scene
    ///
    /// Returns the number of vehicles updated.
    #[instrument(name = "fleet_set_autopilot", skip(self))]
    pub async fn set_autopilot(&self, enabled: bool) -> Result<usize> {
        let vehicles = self
            .scene
            .actors(Some(VEHICLE_FILTER))
            .await
            .inspect_err(|e| error!(error = %e, "failed to list vehicles"))?;
        let total = vehicles.len();

        let applied = self
            .for_each("set_autopilot", &vehicles, |actor| async move {
                self.scene.set_autopilot(actor, enabled).await?;
                observability::record_autopilot_update(enabled);
                Ok::<(), ActorFactoryError>(())
            })
            .await?;

        info!(vehicles = total, enabled, "autopilot updated");
        Ok(applied)
    }

    /// Destroy every actor in the scene
    ///
    /// The spectator is not an enumerated actor and survives. Returns the
    /// number of actors destroyed.
    #[instrument(name = "fleet_destroy_all", skip(self))]
    pub async fn destroy_all(&self) -> Result<usize> {
        let actors = self
            .scene
            .actors(None)
            .await
            .inspect_err(|e| error!(error = %e, "failed to list actors"))?;
        let total = actors.len();

        let destroyed = self
            .for_each("destroy_all", &actors, |actor| async move {
                self.scene.destroy(actor).await?;
                observability::record_actor_destroyed();
                Ok::<(), ActorFactoryError>(())
            })
            .await?;

        info!(actors = total, "all actors destroyed");
        Ok(destroyed)
    }

    async fn for_each<'a, F, Fut>(
        &self,
        operation: &'static str,
        actors: &'a [Actor],
        mut apply: F,
    ) -> Result<usize>
    where
        F: FnMut(&'a Actor) -> Fut,
        Fut: std::future::Future<Output = Result<()>>,
    {
        let total = actors.len();

        for (applied, actor) in actors.iter().enumerate() {
            if let Err(e) = apply(actor).await {
                error!(
                    operation,
                    actor_id = actor.id(),
                    type_id = actor.type_id(),
                    applied,
                    total,
                    error = %e,
                    "fleet operation stopped"
                );
                return Err(ActorFactoryError::PartialFleetUpdate {
                    operation,
                    applied,
                    total,
                    source: Box::new(e),
                });
            }
        }

        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::ActorFactory;
    use crate::mock_client::{MockCarlaClient, MockConfig};
    use crate::session::Session;
    use contracts::{SessionConfig, Transform};

    async fn scene_with(config: MockConfig) -> (Scene<MockCarlaClient>, MockCarlaClient) {
        let client = MockCarlaClient::with_config(config);
        let probe = client.clone();
        let (_connection, scene) = Session::connect(client, &SessionConfig::default())
            .await
            .unwrap();
        (scene, probe)
    }

    #[tokio::test]
    async fn test_set_autopilot_applies_to_all_vehicles() {
        let (scene, probe) = scene_with(MockConfig::default()).await;
        let factory = ActorFactory::with_seed(scene.clone(), 1);
        let summary = factory.spawn_many(8, None).await;
        let fleet = FleetController::new(scene.clone());

        let updated = fleet.set_autopilot(true).await.unwrap();

        assert_eq!(updated, summary.spawned);
        for actor in scene.actors(Some("vehicle.*")).await.unwrap() {
            assert_eq!(probe.autopilot_enabled(actor.id()), Some(true));
        }

        fleet.set_autopilot(false).await.unwrap();
        for id in probe.all_actor_ids() {
            assert_eq!(probe.autopilot_enabled(id), Some(false));
        }
    }

    #[tokio::test]
    async fn test_set_autopilot_skips_non_vehicles() {
        let (scene, probe) = scene_with(MockConfig::default()).await;
        let vehicle = scene
            .spawn("vehicle.audi.tt", Transform::default())
            .await
            .unwrap();
        let camera = scene
            .spawn_attached("sensor.camera.rgb", Transform::default(), &vehicle)
            .await
            .unwrap();

        let updated = FleetController::new(scene).set_autopilot(true).await.unwrap();

        assert_eq!(updated, 1);
        assert_eq!(probe.autopilot_enabled(vehicle.id()), Some(true));
        assert_eq!(probe.autopilot_enabled(camera.id()), Some(false));
    }

    #[tokio::test]
    async fn test_set_autopilot_empty_scene() {
        let (scene, _probe) = scene_with(MockConfig::default()).await;
        assert_eq!(FleetController::new(scene).set_autopilot(true).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_set_autopilot_reports_partial_update() {
        // Ids are handed out from 1000 in spawn order
        let (scene, probe) = scene_with(MockConfig {
            fail_autopilot: vec![1001],
            ..Default::default()
        })
        .await;
        let factory = ActorFactory::with_seed(scene.clone(), 3);
        factory.spawn_one(Some("vehicle.audi.a2")).await.unwrap();
        let mut spawned = 1;
        while spawned < 3 {
            if factory.spawn_one(Some("vehicle.audi.a2")).await.is_ok() {
                spawned += 1;
            }
        }

        let err = FleetController::new(scene).set_autopilot(true).await.unwrap_err();

        match err {
            ActorFactoryError::PartialFleetUpdate {
                operation,
                applied,
                total,
                ..
            } => {
                assert_eq!(operation, "set_autopilot");
                assert_eq!(applied, 1);
                assert_eq!(total, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(probe.autopilot_enabled(1000), Some(true));
        assert_eq!(probe.autopilot_enabled(1002), Some(false));
    }

    #[tokio::test]
    async fn test_destroy_all_empties_scene() {
        let (scene, probe) = scene_with(MockConfig::default()).await;
        let factory = ActorFactory::with_seed(scene.clone(), 5);
        let summary = factory.spawn_many(6, None).await;
        let spectator = scene.spectator().await.unwrap();

        let destroyed = FleetController::new(scene.clone()).destroy_all().await.unwrap();

        assert_eq!(destroyed, summary.spawned);
        assert_eq!(probe.actor_count(), 0);
        assert!(scene.actors(None).await.unwrap().is_empty());
        assert!(scene.transform(&spectator).await.is_ok());
    }

    #[tokio::test]
    async fn test_destroy_all_reports_partial_update() {
        let (scene, probe) = scene_with(MockConfig {
            fail_destroy: vec![1000],
            ..Default::default()
        })
        .await;
        scene.spawn("vehicle.audi.tt", Transform::default()).await.unwrap();

        let err = FleetController::new(scene).destroy_all().await.unwrap_err();

        assert!(matches!(
            err,
            ActorFactoryError::PartialFleetUpdate { applied: 0, total: 1, .. }
        ));
        assert_eq!(probe.actor_count(), 1);
    }

    #[tokio::test]
    async fn test_list_failure_is_returned() {
        let (scene, probe) = scene_with(MockConfig {
            fail_actor_list: true,
            ..Default::default()
        })
        .await;
        scene.spawn("vehicle.audi.tt", Transform::default()).await.unwrap();
        let fleet = FleetController::new(scene);

        assert!(matches!(
            fleet.set_autopilot(true).await,
            Err(ActorFactoryError::ConnectionFailed { .. })
        ));
        assert!(matches!(
            fleet.destroy_all().await,
            Err(ActorFactoryError::ConnectionFailed { .. })
        ));
        assert_eq!(probe.autopilot_enabled(1000), Some(false));
        assert_eq!(probe.actor_count(), 1);
    }
}
