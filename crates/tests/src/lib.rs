//! # Integration Tests
//!
//! End-to-end flows against the mock simulator.
//!
//! Covers:
//! - Contract snapshot checks
//! - Session -> provisioner -> fleet / follower flows (no CARLA required)

#[cfg(test)]
mod contract_tests {
    use contracts::{default_camera_offset, ScenarioConfig};

    #[test]
    fn test_scenario_defaults() {
        let config = ScenarioConfig::default();
        assert_eq!(config.session.endpoint(), "localhost:2000");
        assert_eq!(config.camera.blueprint, "sensor.camera.rgb");
        assert_eq!(config.camera.offset, default_camera_offset());
        assert!(config_loader::ConfigLoader::validate(&config).is_ok());
    }

    #[test]
    fn test_scenario_serialization_roundtrip() {
        let config = ScenarioConfig::default();
        let toml = config_loader::ConfigLoader::to_toml(&config).unwrap();
        let parsed =
            config_loader::ConfigLoader::load_from_str(&toml, config_loader::ConfigFormat::Toml)
                .unwrap();
        assert_eq!(parsed.session, config.session);
        assert_eq!(parsed.camera.offset, config.camera.offset);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::time::{Duration, Instant};

    use actor_factory::{
        ActorFactory, ActorFactoryError, FleetController, MockCarlaClient, MockConfig, Session,
    };
    use camera_follower::{CameraFollower, CancellationToken, FollowConfig, StopReason};
    use contracts::{EpisodeSettings, SessionConfig};

    async fn connect(config: MockConfig) -> (actor_factory::Scene<MockCarlaClient>, MockCarlaClient) {
        let client = MockCarlaClient::with_config(config);
        let probe = client.clone();
        let (_connection, scene) = Session::connect(client, &SessionConfig::default())
            .await
            .unwrap();
        (scene, probe)
    }

    /// Connect succeeds against a reachable server, fails cleanly otherwise
    #[tokio::test]
    async fn test_connect_success_and_failure() {
        let config = SessionConfig::new("localhost", 2000).with_timeout(Duration::from_secs(5));
        let (connection, _scene) = Session::connect(MockCarlaClient::new(), &config)
            .await
            .unwrap();
        assert_eq!(connection.timeout(), Duration::from_secs(5));

        let unreachable = MockCarlaClient::with_config(MockConfig {
            unreachable: true,
            ..Default::default()
        });
        let result = Session::connect(unreachable, &config).await;
        assert!(matches!(
            result,
            Err(ActorFactoryError::ConnectionFailed { .. })
        ));
    }

    /// Stepped connect leaves exactly the requested fixed step
    #[tokio::test]
    async fn test_stepped_connect_sets_fixed_step() {
        for step in [0.01, 0.05, 0.1] {
            let config = SessionConfig::default().with_stepped_mode(step);
            let (_connection, scene) = Session::connect(MockCarlaClient::new(), &config)
                .await
                .unwrap();
            assert_eq!(scene.settings().await.unwrap(), EpisodeSettings::stepped(step));
        }
    }

    #[tokio::test]
    async fn test_spawn_one_without_candidates_fails() {
        let (scene, probe) = connect(MockConfig::default()).await;
        let factory = ActorFactory::new(scene);

        let result = factory.spawn_one(Some("*.does_not_exist")).await;

        assert!(matches!(result, Err(ActorFactoryError::SpawnRejected { .. })));
        assert_eq!(probe.actor_count(), 0);
    }

    /// Exactly `count` attempts, each failing when the map has no spawn points
    #[tokio::test]
    async fn test_spawn_many_without_spawn_points() {
        let (scene, probe) = connect(MockConfig {
            spawn_points: Vec::new(),
            ..Default::default()
        })
        .await;

        let summary = ActorFactory::new(scene).spawn_many(5, None).await;

        assert_eq!(summary.attempted, 5);
        assert_eq!(summary.failed, 5);
        assert_eq!(probe.actor_count(), 0);
    }

    #[tokio::test]
    async fn test_fleet_autopilot_then_destroy_all() {
        let (scene, probe) = connect(MockConfig::default()).await;
        let factory = ActorFactory::with_seed(scene.clone(), 11);
        let fleet = FleetController::new(scene.clone());

        let summary = factory.spawn_many(12, None).await;
        assert_eq!(summary.attempted, 12);

        let updated = fleet.set_autopilot(true).await.unwrap();
        let vehicles = scene.actors(Some("*vehicle*")).await.unwrap();
        assert_eq!(updated, vehicles.len());
        assert!(vehicles
            .iter()
            .all(|v| probe.autopilot_enabled(v.id()) == Some(true)));

        // Autopilot vehicles move once the simulation advances
        let before = scene.transform(&vehicles[0]).await.unwrap();
        scene.tick().await.unwrap();
        assert_ne!(scene.transform(&vehicles[0]).await.unwrap(), before);

        let destroyed = fleet.destroy_all().await.unwrap();
        assert_eq!(destroyed, summary.spawned);
        assert_eq!(scene.actors(None).await.unwrap().len(), 0);
    }

    /// Spectator matches the camera while running; cancel stops within one interval
    #[tokio::test]
    async fn test_follow_converges_and_stops_promptly() {
        let (scene, probe) = connect(MockConfig::default()).await;
        let ego = ActorFactory::with_seed(scene.clone(), 2)
            .spawn_one(Some("vehicle.lincoln.*"))
            .await
            .unwrap();
        scene.set_autopilot(&ego, true).await.unwrap();

        let interval = Duration::from_millis(10);
        let follower = CameraFollower::new(FollowConfig {
            poll_interval: interval,
            ..Default::default()
        });
        let stop = CancellationToken::new();

        let handle = {
            let scene = scene.clone();
            let ego = ego.clone();
            let stop = stop.clone();
            tokio::spawn(async move { follower.follow(&scene, &ego, stop).await })
        };

        // Move the target, then check the spectator caught up
        for _ in 0..5 {
            scene.tick().await.unwrap();
            tokio::time::sleep(interval * 3).await;
            let target = scene.transform(&ego).await.unwrap();
            let expected = target.compose(&FollowConfig::default().offset);
            assert_eq!(probe.spectator_transform(), expected);
        }

        let cancelled_at = Instant::now();
        stop.cancel();
        let outcome = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("follow loop did not stop")
            .unwrap()
            .unwrap();
        let elapsed = cancelled_at.elapsed();

        assert_eq!(outcome.reason, StopReason::Cancelled);
        assert!(outcome.iterations >= 5);
        assert!(elapsed < interval * 5, "stopped after {elapsed:?}");
        assert_eq!(outcome.copy_latency.count, outcome.iterations);
        // Camera survives the follow
        assert!(scene.transform(&outcome.camera).await.is_ok());
    }

    #[tokio::test]
    async fn test_follow_ends_when_target_destroyed() {
        let (scene, _probe) = connect(MockConfig::default()).await;
        let ego = ActorFactory::new(scene.clone()).spawn_one(None).await.unwrap();
        let stop = CancellationToken::new();

        let handle = {
            let scene = scene.clone();
            let ego = ego.clone();
            let stop = stop.clone();
            tokio::spawn(async move { CameraFollower::default().follow(&scene, &ego, stop).await })
        };

        tokio::time::sleep(Duration::from_millis(30)).await;
        FleetController::new(scene.clone()).destroy_all().await.unwrap();

        let outcome = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("follow loop did not stop")
            .unwrap()
            .unwrap();
        assert_eq!(outcome.reason, StopReason::ActorLost);
    }

    /// Scenario file -> session -> fleet -> follow -> cleanup
    #[tokio::test]
    async fn test_scenario_flow_from_config() {
        let config = config_loader::ConfigLoader::load_from_str(
            r#"
[session]
stepped_mode = true
step_size = 0.02

[fleet]
count = 8
vehicle_types = ["vehicle.tesla.*", "vehicle.audi.*"]

[camera]
ego_type = "vehicle.ford.mustang"
poll_interval_ms = 5
"#,
            config_loader::ConfigFormat::Toml,
        )
        .unwrap();

        let client = MockCarlaClient::new();
        let probe = client.clone();
        let (_connection, scene) = Session::connect(client, &config.session).await.unwrap();
        assert!(probe.settings().synchronous_mode);

        let factory = ActorFactory::with_seed(scene.clone(), 4);
        let ego = factory
            .spawn_one(config.camera.ego_type.as_deref())
            .await
            .unwrap();
        let summary = factory
            .spawn_many(config.fleet.count, config.fleet.vehicle_types.as_deref())
            .await;
        assert_eq!(summary.attempted, 8);

        let fleet = FleetController::new(scene.clone());
        let updated = fleet.set_autopilot(config.fleet.autopilot).await.unwrap();
        assert_eq!(updated, summary.spawned + 1);

        let types: Vec<String> = scene
            .actors(None)
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.type_id().to_string())
            .collect();
        assert!(types.iter().all(|t| t == "vehicle.ford.mustang"
            || t == "vehicle.tesla.cybertruck"
            || t == "vehicle.audi.a2"));

        let stop = CancellationToken::new();
        let canceller = {
            let stop = stop.clone();
            let scene = scene.clone();
            async move {
                for _ in 0..5 {
                    scene.tick().await.unwrap();
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
                stop.cancel();
            }
        };
        let follower = CameraFollower::new(FollowConfig::from(&config.camera));
        let (outcome, _) = tokio::join!(follower.follow(&scene, &ego, stop.clone()), canceller);
        assert_eq!(outcome.unwrap().reason, StopReason::Cancelled);

        scene
            .set_stepped_mode(false, config.session.step_size)
            .await
            .unwrap();
        assert_eq!(probe.settings(), EpisodeSettings::free_running());

        fleet.destroy_all().await.unwrap();
        assert_eq!(probe.actor_count(), 0);
    }
}
