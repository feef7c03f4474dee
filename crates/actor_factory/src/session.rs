//! Session management
//!
//! `Session::connect` is the only way to obtain a `Connection` and a
//! `Scene`; actors are only produced by scene operations. Handles carry
//! no local state besides ids, the simulator stays the source of truth.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use contracts::{ActorId, ActorRecord, EpisodeSettings, SessionConfig, Transform};
use tracing::{debug, error, info, instrument};

use crate::client::CarlaClient;
use crate::error::{ActorFactoryError, Result};

/// Handle to an actor placed in the scene (vehicle, sensor or spectator)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Actor {
    id: ActorId,
    type_id: String,
}

impl Actor {
    pub(crate) fn from_record(record: ActorRecord) -> Self {
        Self {
            id: record.id,
            type_id: record.type_id,
        }
    }

    /// Simulator actor id
    pub fn id(&self) -> ActorId {
        self.id
    }

    /// Blueprint-derived type id, e.g. `vehicle.tesla.model3`
    pub fn type_id(&self) -> &str {
        &self.type_id
    }

    pub fn is_vehicle(&self) -> bool {
        self.type_id.starts_with("vehicle.")
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.type_id, self.id)
    }
}

/// Network session with the simulator
pub struct Connection<C: CarlaClient> {
    client: Arc<C>,
    host: String,
    port: u16,
    timeout: Duration,
}

impl<C: CarlaClient> Connection<C> {
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Timeout applied to the handshake and every request
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Server version reported by the simulator
    pub async fn server_version(&self) -> Result<String> {
        self.client.server_version().await
    }

    /// Handle to the current scene
    pub fn scene(&self) -> Scene<C> {
        Scene {
            client: self.client.clone(),
        }
    }
}

/// Handle to the simulator's current world
pub struct Scene<C: CarlaClient> {
    client: Arc<C>,
}

impl<C: CarlaClient> Clone for Scene<C> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
        }
    }
}

impl<C: CarlaClient> Scene<C> {
    /// Current time-stepping settings
    pub async fn settings(&self) -> Result<EpisodeSettings> {
        self.client.episode_settings().await
    }

    /// Switch between stepped (synchronous, fixed step) and free-running mode
    ///
    /// Only the time-stepping fields are touched. `step_size` is ignored when
    /// disabling.
    #[instrument(name = "scene_set_stepped_mode", skip(self))]
    pub async fn set_stepped_mode(&self, enabled: bool, step_size: f64) -> Result<()> {
        if enabled && !(step_size.is_finite() && step_size > 0.0) {
            return Err(ActorFactoryError::SettingsFailed {
                message: format!("step size must be a positive number of seconds, got {step_size}"),
            });
        }

        let mut settings = self.client.episode_settings().await?;
        settings.synchronous_mode = enabled;
        settings.fixed_delta_seconds = enabled.then_some(step_size);
        self.client.apply_episode_settings(settings).await?;

        debug!(?settings, "episode settings applied");
        Ok(())
    }

    /// Advance one step; required after every step in stepped mode
    pub async fn tick(&self) -> Result<u64> {
        self.client.tick().await
    }

    /// Blueprint ids matching a wildcard (id or tag)
    pub async fn find_blueprints(&self, pattern: &str) -> Result<Vec<String>> {
        self.client.find_blueprints(pattern).await
    }

    /// Recommended spawn points
    pub async fn spawn_points(&self) -> Result<Vec<Transform>> {
        self.client.spawn_points().await
    }

    /// Strict spawn: fails if the location is occupied
    pub async fn spawn(&self, blueprint: &str, transform: Transform) -> Result<Actor> {
        self.client
            .spawn_actor(blueprint, transform, None)
            .await
            .map(Actor::from_record)
    }

    /// Lenient spawn: `Ok(None)` if the location is occupied
    pub async fn try_spawn(&self, blueprint: &str, transform: Transform) -> Result<Option<Actor>> {
        Ok(self
            .client
            .try_spawn_actor(blueprint, transform)
            .await?
            .map(Actor::from_record))
    }

    /// Spawn attached to `parent` at a pose relative to it
    pub async fn spawn_attached(
        &self,
        blueprint: &str,
        relative: Transform,
        parent: &Actor,
    ) -> Result<Actor> {
        self.client
            .spawn_actor(blueprint, relative, Some(parent.id))
            .await
            .map(Actor::from_record)
    }

    /// Actors in the scene, optionally filtered by a wildcard on type id
    pub async fn actors(&self, pattern: Option<&str>) -> Result<Vec<Actor>> {
        Ok(self
            .client
            .actors(pattern)
            .await?
            .into_iter()
            .map(Actor::from_record)
            .collect())
    }

    /// The viewpoint actor used for on-screen viewing
    pub async fn spectator(&self) -> Result<Actor> {
        self.client.spectator().await.map(Actor::from_record)
    }

    /// World pose of an actor
    pub async fn transform(&self, actor: &Actor) -> Result<Transform> {
        self.client.actor_transform(actor.id).await
    }

    /// Teleport an actor
    pub async fn set_transform(&self, actor: &Actor, transform: Transform) -> Result<()> {
        self.client.set_actor_transform(actor.id, transform).await
    }

    pub async fn set_autopilot(&self, actor: &Actor, enabled: bool) -> Result<()> {
        self.client.set_autopilot(actor.id, enabled).await
    }

    pub async fn destroy(&self, actor: &Actor) -> Result<()> {
        self.client.destroy_actor(actor.id).await
    }
}

/// Session manager
pub struct Session;

impl Session {
    /// Connect to the simulator and fetch the current scene
    ///
    /// With `config.stepped_mode` the scene is switched to synchronous mode
    /// with a fixed step of `config.step_size` seconds. The caller then owns
    /// ticking the simulation.
    ///
    /// # Errors
    /// Any failure (refused, timed out, incompatible server, settings rejected)
    /// is logged and returned as `ConnectionFailed`; no partial handles escape.
    #[instrument(
        name = "session_connect",
        skip(client, config),
        fields(endpoint = %config.endpoint(), stepped = config.stepped_mode)
    )]
    pub async fn connect<C: CarlaClient>(
        client: C,
        config: &SessionConfig,
    ) -> Result<(Connection<C>, Scene<C>)> {
        let result = Self::establish(client, config).await;

        observability::record_connection(result.is_ok());
        if let Err(ref e) = result {
            error!(error = %e, "error connecting to CARLA");
        }
        result
    }

    async fn establish<C: CarlaClient>(
        mut client: C,
        config: &SessionConfig,
    ) -> Result<(Connection<C>, Scene<C>)> {
        let timeout = config.timeout().ok_or_else(|| {
            ActorFactoryError::connection(format!(
                "invalid timeout {}s, expected a positive number of seconds",
                config.timeout_secs
            ))
        })?;
        client
            .connect(&config.host, config.port, timeout)
            .await
            .map_err(|e| match e {
                ActorFactoryError::ConnectionFailed { .. } => e,
                other => ActorFactoryError::connection(other.to_string()),
            })?;

        let connection = Connection {
            client: Arc::new(client),
            host: config.host.clone(),
            port: config.port,
            timeout,
        };
        let scene = connection.scene();

        if config.stepped_mode {
            scene
                .set_stepped_mode(true, config.step_size)
                .await
                .map_err(|e| {
                    ActorFactoryError::connection(format!("failed to enable stepped mode: {e}"))
                })?;
            info!(
                step_size = config.step_size,
                "CARLA running in synchronous mode with fixed time step"
            );
        }

        info!(timeout_ms = timeout.as_millis() as u64, "connected to CARLA");
        Ok((connection, scene))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_client::{MockCarlaClient, MockConfig};

    #[tokio::test]
    async fn test_connect_returns_handles() {
        let client = MockCarlaClient::new();
        let probe = client.clone();
        let config = SessionConfig::new("localhost", 2000).with_timeout(Duration::from_secs(3));

        let (connection, scene) = Session::connect(client, &config).await.unwrap();

        assert_eq!(connection.host(), "localhost");
        assert_eq!(connection.port(), 2000);
        assert_eq!(connection.timeout(), Duration::from_secs(3));
        assert_eq!(probe.timeout(), Some(Duration::from_secs(3)));
        assert_eq!(connection.server_version().await.unwrap(), "0.9.15");
        assert!(scene.actors(None).await.unwrap().is_empty());
        assert!(!probe.settings().synchronous_mode);
    }

    #[tokio::test]
    async fn test_connect_unreachable_returns_failure() {
        let client = MockCarlaClient::with_config(MockConfig {
            unreachable: true,
            ..Default::default()
        });
        let config = SessionConfig::new("10.255.255.1", 2000);

        let result = Session::connect(client, &config).await;
        assert!(matches!(
            result,
            Err(ActorFactoryError::ConnectionFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_connect_rejects_invalid_timeout() {
        for invalid in [0.0, -2.5, f64::NAN] {
            let client = MockCarlaClient::new();
            let probe = client.clone();
            let mut config = SessionConfig::default();
            config.timeout_secs = invalid;

            let result = Session::connect(client, &config).await;

            assert!(matches!(
                result,
                Err(ActorFactoryError::ConnectionFailed { .. })
            ));
            // Rejected before reaching the server
            assert_eq!(probe.timeout(), None);
        }
    }

    #[tokio::test]
    async fn test_connect_stepped_mode_applies_settings() {
        let client = MockCarlaClient::new();
        let probe = client.clone();
        let config = SessionConfig::new("localhost", 2000).with_stepped_mode(0.1);

        let (_connection, scene) = Session::connect(client, &config).await.unwrap();

        let settings = scene.settings().await.unwrap();
        assert!(settings.synchronous_mode);
        assert_eq!(settings.fixed_delta_seconds, Some(0.1));
        assert_eq!(probe.settings(), EpisodeSettings::stepped(0.1));
        // Connecting never ticks
        assert_eq!(probe.frame(), 0);
    }

    #[tokio::test]
    async fn test_connect_fails_when_settings_rejected() {
        let client = MockCarlaClient::with_config(MockConfig {
            reject_settings: true,
            ..Default::default()
        });
        let config = SessionConfig::default().with_stepped_mode(0.05);

        let err = Session::connect(client, &config).await.err().unwrap();
        assert!(matches!(err, ActorFactoryError::ConnectionFailed { .. }));
        assert!(err.to_string().contains("stepped mode"));
    }

    #[tokio::test]
    async fn test_set_stepped_mode_rejects_bad_step() {
        let (_connection, scene) = Session::connect(MockCarlaClient::new(), &SessionConfig::default())
            .await
            .unwrap();
        assert!(scene.set_stepped_mode(true, 0.0).await.is_err());
        assert!(scene.set_stepped_mode(true, f64::NAN).await.is_err());
    }

    #[tokio::test]
    async fn test_disable_stepped_mode_restores_free_running() {
        let config = SessionConfig::default().with_stepped_mode(0.05);
        let (_connection, scene) = Session::connect(MockCarlaClient::new(), &config)
            .await
            .unwrap();

        scene.set_stepped_mode(false, 0.05).await.unwrap();
        assert_eq!(scene.settings().await.unwrap(), EpisodeSettings::free_running());
    }
}
