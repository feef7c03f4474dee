//! CARLA client abstraction
//!
//! Defines the requests the helpers issue to the simulator, supporting the
//! real implementation and an in-memory mock for testing.

use std::future::Future;
use std::time::Duration;

use contracts::{ActorId, ActorRecord, EpisodeSettings, Transform};

use crate::error::Result;

/// CARLA client trait
///
/// Every method is a single request/response round trip to the simulator.
/// Implementations keep no ownership registry: the simulator is the source
/// of truth for which actors exist, so a stale id surfaces as
/// `ActorFactoryError::ActorNotFound` on the next request that uses it.
pub trait CarlaClient: Send + Sync {
    /// Connect to CARLA server
    ///
    /// `timeout` bounds the handshake and every later request on this client.
    fn connect(
        &mut self,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Server version string
    fn server_version(&self) -> impl Future<Output = Result<String>> + Send;

    /// Current episode settings
    fn episode_settings(&self) -> impl Future<Output = Result<EpisodeSettings>> + Send;

    /// Apply episode settings
    fn apply_episode_settings(
        &self,
        settings: EpisodeSettings,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Advance the simulation one step (synchronous mode), returns the frame number
    fn tick(&self) -> impl Future<Output = Result<u64>> + Send;

    /// Blueprint ids matching a wildcard pattern (against id or tags),
    /// in library order
    fn find_blueprints(&self, pattern: &str) -> impl Future<Output = Result<Vec<String>>> + Send;

    /// Recommended spawn points of the current map
    fn spawn_points(&self) -> impl Future<Output = Result<Vec<Transform>>> + Send;

    /// Spawn actor, failing if the location is occupied or the blueprint unknown
    ///
    /// # Arguments
    /// * `blueprint` - Blueprint id, e.g. "vehicle.tesla.model3"
    /// * `transform` - World pose, or pose relative to `parent` when attached
    /// * `parent` - Actor to attach to
    fn spawn_actor(
        &self,
        blueprint: &str,
        transform: Transform,
        parent: Option<ActorId>,
    ) -> impl Future<Output = Result<ActorRecord>> + Send;

    /// Spawn actor, returning `Ok(None)` instead of failing on a collision
    fn try_spawn_actor(
        &self,
        blueprint: &str,
        transform: Transform,
    ) -> impl Future<Output = Result<Option<ActorRecord>>> + Send;

    /// Actors in the world, optionally filtered by a wildcard on type id.
    ///
    /// The spectator is not included.
    fn actors(
        &self,
        pattern: Option<&str>,
    ) -> impl Future<Output = Result<Vec<ActorRecord>>> + Send;

    /// The spectator (on-screen viewpoint) actor
    fn spectator(&self) -> impl Future<Output = Result<ActorRecord>> + Send;

    /// World pose of an actor
    fn actor_transform(&self, actor_id: ActorId)
        -> impl Future<Output = Result<Transform>> + Send;

    /// Teleport an actor to a world pose
    fn set_actor_transform(
        &self,
        actor_id: ActorId,
        transform: Transform,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Hand a vehicle to (or take it back from) the traffic manager
    fn set_autopilot(
        &self,
        actor_id: ActorId,
        enabled: bool,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Destroy actor
    fn destroy_actor(&self, actor_id: ActorId) -> impl Future<Output = Result<()>> + Send;
}
