//! Real CARLA client implementation
//!
//! Connects to CARLA server using carla-rust crate.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use carla::client::{Actor, ActorBase, Client, Vehicle, World};
use carla::geom::{Location as CarlaLocation, Rotation as CarlaRotation, Transform as CarlaTransform};
use contracts::wildcard;
use contracts::{ActorId, ActorRecord, EpisodeSettings, Location, Rotation, Transform};
use tokio::net::TcpStream;
use tracing::{debug, info, instrument};

use crate::client::CarlaClient;
use crate::error::{ActorFactoryError, Result};

/// Real CARLA client
///
/// Wraps carla-rust's Client, implements CarlaClient trait.
/// Uses Mutex for interior mutability, allowing `&self` methods to modify World.
#[derive(Default, Clone)]
pub struct RealCarlaClient {
    client: Arc<Mutex<Option<Client>>>,
    world: Arc<Mutex<Option<World>>>,
    timeout: Duration,
}

impl RealCarlaClient {
    /// Create new client (disconnected state)
    pub fn new() -> Self {
        Self::default()
    }

    /// Access World with mutable reference, ensuring connected
    fn with_world_mut<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut World) -> Result<R>,
    {
        let mut world_guard = self.world.lock().unwrap_or_else(PoisonError::into_inner);
        let world = world_guard
            .as_mut()
            .ok_or_else(|| ActorFactoryError::connection("not connected to CARLA server"))?;
        f(world)
    }

    fn with_client<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Client) -> R,
    {
        let client_guard = self.client.lock().unwrap_or_else(PoisonError::into_inner);
        let client = client_guard
            .as_ref()
            .ok_or_else(|| ActorFactoryError::connection("not connected to CARLA server"))?;
        Ok(f(client))
    }

    fn find_actor(world: &World, actor_id: ActorId) -> Result<Actor> {
        world
            .actor(actor_id)
            .ok_or(ActorFactoryError::ActorNotFound { actor_id })
    }

    fn record(actor: &Actor) -> ActorRecord {
        ActorRecord::new(actor.id(), actor.type_id())
    }

    /// Reachability check before the handshake: the RPC layer aborts
    /// instead of returning an error when the server is absent.
    async fn probe(host: &str, port: u16, timeout: Duration) -> Result<()> {
        match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(ActorFactoryError::connection(format!(
                "{host}:{port} unreachable: {e}"
            ))),
            Err(_) => Err(ActorFactoryError::connection(format!(
                "{host}:{port} did not answer within {timeout:?}"
            ))),
        }
    }
}

/// Convert internal Transform to CARLA Transform
fn to_carla_transform(transform: &Transform) -> CarlaTransform {
    let location = CarlaLocation {
        x: transform.location.x as f32,
        y: transform.location.y as f32,
        z: transform.location.z as f32,
    };
    let rotation = CarlaRotation {
        pitch: transform.rotation.pitch as f32,
        yaw: transform.rotation.yaw as f32,
        roll: transform.rotation.roll as f32,
    };
    CarlaTransform { location, rotation }
}

fn from_carla_transform(transform: &CarlaTransform) -> Transform {
    Transform {
        location: Location::new(
            transform.location.x as f64,
            transform.location.y as f64,
            transform.location.z as f64,
        ),
        rotation: Rotation::new(
            transform.rotation.pitch as f64,
            transform.rotation.yaw as f64,
            transform.rotation.roll as f64,
        ),
    }
}

impl CarlaClient for RealCarlaClient {
    #[instrument(name = "real_carla_connect", skip(self), fields(host = %host, port))]
    async fn connect(&mut self, host: &str, port: u16, timeout: Duration) -> Result<()> {
        Self::probe(host, port, timeout).await?;

        let mut client = Client::connect(host, port, None);
        client.set_timeout(timeout);
        let world = client.world();

        info!(
            map = %world.map().name(),
            server_version = %client.server_version(),
            "connected to CARLA server"
        );

        self.timeout = timeout;
        *self.client.lock().unwrap_or_else(PoisonError::into_inner) = Some(client);
        *self.world.lock().unwrap_or_else(PoisonError::into_inner) = Some(world);

        Ok(())
    }

    async fn server_version(&self) -> Result<String> {
        self.with_client(|client| client.server_version())
    }

    async fn episode_settings(&self) -> Result<EpisodeSettings> {
        self.with_world_mut(|world| {
            let settings = world.settings();
            Ok(EpisodeSettings {
                synchronous_mode: settings.synchronous_mode,
                fixed_delta_seconds: settings.fixed_delta_seconds,
            })
        })
    }

    #[instrument(name = "real_carla_apply_settings", skip(self))]
    async fn apply_episode_settings(&self, settings: EpisodeSettings) -> Result<()> {
        let timeout = self.timeout;
        self.with_world_mut(|world| {
            let mut carla_settings = world.settings();
            carla_settings.synchronous_mode = settings.synchronous_mode;
            carla_settings.fixed_delta_seconds = settings.fixed_delta_seconds;
            let frame = world.apply_settings(&carla_settings, timeout);
            debug!(frame, "episode settings applied");
            Ok(())
        })
    }

    async fn tick(&self) -> Result<u64> {
        self.with_world_mut(|world| Ok(world.tick()))
    }

    async fn find_blueprints(&self, pattern: &str) -> Result<Vec<String>> {
        self.with_world_mut(|world| {
            Ok(world
                .blueprint_library()
                .filter(pattern)
                .iter()
                .map(|bp| bp.id())
                .collect())
        })
    }

    async fn spawn_points(&self) -> Result<Vec<Transform>> {
        self.with_world_mut(|world| {
            Ok(world
                .map()
                .recommended_spawn_points()
                .iter()
                .map(from_carla_transform)
                .collect())
        })
    }

    #[instrument(
        name = "real_carla_spawn_actor",
        skip(self, transform),
        fields(blueprint = %blueprint, parent)
    )]
    async fn spawn_actor(
        &self,
        blueprint: &str,
        transform: Transform,
        parent: Option<ActorId>,
    ) -> Result<ActorRecord> {
        self.with_world_mut(|world| {
            let bp = world.blueprint_library().find(blueprint).ok_or_else(|| {
                ActorFactoryError::spawn_rejected(blueprint, "blueprint not found")
            })?;
            let carla_transform = to_carla_transform(&transform);

            let actor = match parent {
                Some(parent_id) => {
                    let parent_actor = Self::find_actor(world, parent_id)?;
                    world.spawn_actor_attached(&bp, &carla_transform, &parent_actor, None)
                }
                None => world.spawn_actor(&bp, &carla_transform),
            }
            .map_err(|e| ActorFactoryError::spawn_rejected(blueprint, e.to_string()))?;

            debug!(actor_id = actor.id(), "actor spawned");
            Ok(Self::record(&actor))
        })
    }

    async fn try_spawn_actor(
        &self,
        blueprint: &str,
        transform: Transform,
    ) -> Result<Option<ActorRecord>> {
        self.with_world_mut(|world| {
            let bp = world.blueprint_library().find(blueprint).ok_or_else(|| {
                ActorFactoryError::spawn_rejected(blueprint, "blueprint not found")
            })?;
            Ok(world
                .spawn_actor(&bp, &to_carla_transform(&transform))
                .ok()
                .map(|actor| Self::record(&actor)))
        })
    }

    async fn actors(&self, pattern: Option<&str>) -> Result<Vec<ActorRecord>> {
        self.with_world_mut(|world| {
            let spectator_id = world.spectator().id();
            Ok(world
                .actors()
                .iter()
                .filter(|actor| actor.id() != spectator_id)
                .filter(|actor| pattern.map_or(true, |p| wildcard::actor_matches(&actor.type_id(), p)))
                .map(|actor| Self::record(&actor))
                .collect())
        })
    }

    async fn spectator(&self) -> Result<ActorRecord> {
        self.with_world_mut(|world| Ok(Self::record(&world.spectator())))
    }

    async fn actor_transform(&self, actor_id: ActorId) -> Result<Transform> {
        self.with_world_mut(|world| {
            let actor = Self::find_actor(world, actor_id)?;
            Ok(from_carla_transform(&actor.transform()))
        })
    }

    async fn set_actor_transform(&self, actor_id: ActorId, transform: Transform) -> Result<()> {
        self.with_world_mut(|world| {
            let actor = Self::find_actor(world, actor_id)?;
            actor.set_transform(&to_carla_transform(&transform));
            Ok(())
        })
    }

    #[instrument(name = "real_carla_set_autopilot", skip(self), fields(actor_id, enabled))]
    async fn set_autopilot(&self, actor_id: ActorId, enabled: bool) -> Result<()> {
        self.with_world_mut(|world| {
            let actor = Self::find_actor(world, actor_id)?;
            let vehicle = Vehicle::try_from(actor).map_err(|_| ActorFactoryError::AutopilotFailed {
                actor_id,
                message: "actor is not a vehicle".to_string(),
            })?;
            vehicle.set_autopilot(enabled);
            Ok(())
        })
    }

    #[instrument(name = "real_carla_destroy_actor", skip(self), fields(actor_id))]
    async fn destroy_actor(&self, actor_id: ActorId) -> Result<()> {
        self.with_world_mut(|world| {
            let actor = Self::find_actor(world, actor_id)?;
            if actor.destroy() {
                debug!(actor_id, "actor destroyed");
                Ok(())
            } else {
                Err(ActorFactoryError::DestroyFailed {
                    actor_id,
                    message: "server refused to destroy actor".to_string(),
                })
            }
        })
    }
}

#[cfg(test)]
mod tests {
    // Real client tests require CARLA server running
    // These tests are marked as ignore, only run when server is available

    use super::*;

    #[test]
    fn test_transform_conversion_keeps_values() {
        let transform = Transform::new(Location::new(1.5, -2.0, 3.25), Rotation::new(-25.0, 90.0, 0.0));
        let back = from_carla_transform(&to_carla_transform(&transform));
        assert_eq!(back, transform);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_connection_failure() {
        let mut client = RealCarlaClient::new();
        let result = client
            .connect("127.0.0.1", 1, Duration::from_millis(200))
            .await;
        assert!(matches!(result, Err(ActorFactoryError::ConnectionFailed { .. })));
    }

    #[tokio::test]
    #[ignore = "requires CARLA server"]
    async fn test_real_client_connect() {
        let mut client = RealCarlaClient::new();
        client
            .connect("localhost", 2000, Duration::from_secs(10))
            .await
            .unwrap();
        assert!(!client.server_version().await.unwrap().is_empty());
    }
}
