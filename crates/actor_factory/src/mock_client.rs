//! Mock CARLA 客户端
//!
//! 用于单元测试的内存 world：蓝图库、spawn points、占用检测、
//! attach、spectator，支持注入失败场景。

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use contracts::wildcard;
use contracts::{ActorId, ActorRecord, EpisodeSettings, Location, Rotation, Transform};
use tracing::instrument;

use crate::client::CarlaClient;
use crate::error::{ActorFactoryError, Result};

/// Mock spectator 的 ID
pub const SPECTATOR_ID: ActorId = 1;

/// Actor ID 从 1000 开始，便于和 spectator 区分
const FIRST_ACTOR_ID: ActorId = 1000;

/// 两个根 actor 距离小于该值即视为碰撞
const OCCUPANCY_RADIUS: f64 = 2.0;

/// Distance an autopilot vehicle covers per simulated second
const AUTOPILOT_SPEED: f64 = 10.0;

/// Step used by `tick` when no fixed step is configured
const DEFAULT_TICK_SECONDS: f64 = 0.05;

/// Mock 客户端配置
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// 拒绝所有连接请求
    pub unreachable: bool,
    /// Reported server version
    pub server_version: String,
    /// Blueprint library, in library order
    pub blueprints: Vec<String>,
    /// Recommended spawn points of the map
    pub spawn_points: Vec<Transform>,
    /// Refuse to read or apply episode settings
    pub reject_settings: bool,
    /// autopilot 请求应该失败的 actor IDs
    pub fail_autopilot: Vec<ActorId>,
    /// 应该失败的 destroy actor IDs
    pub fail_destroy: Vec<ActorId>,
    /// 所有 actor 列表请求都失败
    pub fail_actor_list: bool,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            unreachable: false,
            server_version: "0.9.15".to_string(),
            blueprints: default_blueprints(),
            spawn_points: grid_spawn_points(16),
            reject_settings: false,
            fail_autopilot: Vec::new(),
            fail_destroy: Vec::new(),
            fail_actor_list: false,
        }
    }
}

/// A small blueprint library: vehicles, sensors and walkers
pub fn default_blueprints() -> Vec<String> {
    [
        "vehicle.audi.a2",
        "vehicle.audi.tt",
        "vehicle.bmw.grandtourer",
        "vehicle.ford.mustang",
        "vehicle.lincoln.mkz_2017",
        "vehicle.tesla.cybertruck",
        "vehicle.tesla.model3",
        "sensor.camera.rgb",
        "sensor.camera.depth",
        "sensor.lidar.ray_cast",
        "sensor.other.gnss",
        "walker.pedestrian.0001",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// `count` spawn points on a grid, 10 m apart along x, rows 20 m apart along y
pub fn grid_spawn_points(count: usize) -> Vec<Transform> {
    (0..count)
        .map(|i| Transform {
            location: Location::new((i % 8) as f64 * 10.0, (i / 8) as f64 * 20.0, 0.3),
            rotation: Rotation::default(),
        })
        .collect()
}

#[derive(Debug, Clone)]
struct MockActor {
    type_id: String,
    /// World pose for root actors, pose relative to `parent` when attached
    transform: Transform,
    parent: Option<ActorId>,
    autopilot: bool,
}

#[derive(Debug)]
struct MockWorld {
    connected: bool,
    timeout: Option<Duration>,
    settings: EpisodeSettings,
    frame: u64,
    next_actor_id: ActorId,
    actors: BTreeMap<ActorId, MockActor>,
    spectator: Transform,
    spawn_requests: usize,
}

impl MockWorld {
    fn new() -> Self {
        Self {
            connected: false,
            timeout: None,
            settings: EpisodeSettings::free_running(),
            frame: 0,
            next_actor_id: FIRST_ACTOR_ID,
            actors: BTreeMap::new(),
            spectator: Transform::default(),
            spawn_requests: 0,
        }
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.connected {
            Ok(())
        } else {
            Err(ActorFactoryError::connection("not connected"))
        }
    }

    fn world_transform(&self, actor_id: ActorId) -> Result<Transform> {
        if actor_id == SPECTATOR_ID {
            return Ok(self.spectator);
        }

        let actor = self
            .actors
            .get(&actor_id)
            .ok_or(ActorFactoryError::ActorNotFound { actor_id })?;

        match actor.parent {
            None => Ok(actor.transform),
            Some(parent) => Ok(self.world_transform(parent)?.compose(&actor.transform)),
        }
    }

    fn is_occupied(&self, location: &Location) -> bool {
        self.actors
            .values()
            .filter(|a| a.parent.is_none())
            .any(|a| a.transform.location.distance(location) < OCCUPANCY_RADIUS)
    }

    fn insert_actor(
        &mut self,
        blueprint: &str,
        transform: Transform,
        parent: Option<ActorId>,
    ) -> ActorRecord {
        let actor_id = self.next_actor_id;
        self.next_actor_id += 1;
        self.actors.insert(
            actor_id,
            MockActor {
                type_id: blueprint.to_string(),
                transform,
                parent,
                autopilot: false,
            },
        );
        ActorRecord::new(actor_id, blueprint)
    }
}

/// Mock CARLA client
///
/// Cheap to clone; clones share one world, so a test can keep a handle for
/// inspection after moving the client into a session.
#[derive(Clone)]
pub struct MockCarlaClient {
    /// 配置（可注入失败场景）
    config: Arc<MockConfig>,
    /// 共享的 world 状态
    world: Arc<Mutex<MockWorld>>,
}

impl MockCarlaClient {
    /// 创建默认 mock 客户端
    pub fn new() -> Self {
        Self::with_config(MockConfig::default())
    }

    /// 使用配置创建 mock 客户端
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            config: Arc::new(config),
            world: Arc::new(Mutex::new(MockWorld::new())),
        }
    }

    fn world(&self) -> MutexGuard<'_, MockWorld> {
        self.world.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of actors in the world (spectator excluded)
    pub fn actor_count(&self) -> usize {
        self.world().actors.len()
    }

    /// All actor ids in the world (spectator excluded)
    pub fn all_actor_ids(&self) -> Vec<ActorId> {
        self.world().actors.keys().copied().collect()
    }

    /// Autopilot flag of an actor, `None` if it doesn't exist
    pub fn autopilot_enabled(&self, actor_id: ActorId) -> Option<bool> {
        self.world().actors.get(&actor_id).map(|a| a.autopilot)
    }

    /// Parent of an attached actor
    pub fn attached_to(&self, actor_id: ActorId) -> Option<ActorId> {
        self.world().actors.get(&actor_id).and_then(|a| a.parent)
    }

    /// Current episode settings
    pub fn settings(&self) -> EpisodeSettings {
        self.world().settings
    }

    /// Timeout given at connect
    pub fn timeout(&self) -> Option<Duration> {
        self.world().timeout
    }

    /// Frames advanced by `tick`
    pub fn frame(&self) -> u64 {
        self.world().frame
    }

    /// Number of spawn requests received, successful or not
    pub fn spawn_requests(&self) -> usize {
        self.world().spawn_requests
    }

    /// Current spectator pose
    pub fn spectator_transform(&self) -> Transform {
        self.world().spectator
    }

    fn check_blueprint(&self, blueprint: &str) -> Result<()> {
        if self.config.blueprints.iter().any(|b| b == blueprint) {
            Ok(())
        } else {
            Err(ActorFactoryError::spawn_rejected(
                blueprint,
                "blueprint not found in library",
            ))
        }
    }
}

impl Default for MockCarlaClient {
    fn default() -> Self {
        Self::new()
    }
}

impl CarlaClient for MockCarlaClient {
    #[instrument(name = "mock_carla_connect", skip(self), fields(host = %host, port))]
    async fn connect(&mut self, host: &str, port: u16, timeout: Duration) -> Result<()> {
        if self.config.unreachable {
            return Err(ActorFactoryError::connection(format!(
                "connection to {host}:{port} refused"
            )));
        }

        let mut world = self.world();
        world.connected = true;
        world.timeout = Some(timeout);
        Ok(())
    }

    async fn server_version(&self) -> Result<String> {
        self.world().ensure_connected()?;
        Ok(self.config.server_version.clone())
    }

    async fn episode_settings(&self) -> Result<EpisodeSettings> {
        let world = self.world();
        world.ensure_connected()?;
        if self.config.reject_settings {
            return Err(ActorFactoryError::SettingsFailed {
                message: "mock failure".into(),
            });
        }
        Ok(world.settings)
    }

    #[instrument(name = "mock_carla_apply_settings", skip(self))]
    async fn apply_episode_settings(&self, settings: EpisodeSettings) -> Result<()> {
        let mut world = self.world();
        world.ensure_connected()?;
        if self.config.reject_settings {
            return Err(ActorFactoryError::SettingsFailed {
                message: "mock failure".into(),
            });
        }
        world.settings = settings;
        Ok(())
    }

    async fn tick(&self) -> Result<u64> {
        let mut world = self.world();
        world.ensure_connected()?;

        let dt = world
            .settings
            .fixed_delta_seconds
            .unwrap_or(DEFAULT_TICK_SECONDS);
        for actor in world
            .actors
            .values_mut()
            .filter(|a| a.autopilot && a.parent.is_none())
        {
            let forward = actor
                .transform
                .rotation
                .rotate_vector(&Location::new(AUTOPILOT_SPEED * dt, 0.0, 0.0));
            actor.transform.location.x += forward.x;
            actor.transform.location.y += forward.y;
        }

        world.frame += 1;
        Ok(world.frame)
    }

    async fn find_blueprints(&self, pattern: &str) -> Result<Vec<String>> {
        self.world().ensure_connected()?;
        Ok(self
            .config
            .blueprints
            .iter()
            .filter(|id| wildcard::blueprint_matches(id, pattern))
            .cloned()
            .collect())
    }

    async fn spawn_points(&self) -> Result<Vec<Transform>> {
        self.world().ensure_connected()?;
        Ok(self.config.spawn_points.clone())
    }

    #[instrument(
        name = "mock_carla_spawn_actor",
        skip(self, transform),
        fields(blueprint = %blueprint, parent = ?parent)
    )]
    async fn spawn_actor(
        &self,
        blueprint: &str,
        transform: Transform,
        parent: Option<ActorId>,
    ) -> Result<ActorRecord> {
        let mut world = self.world();
        world.ensure_connected()?;
        world.spawn_requests += 1;
        self.check_blueprint(blueprint)?;

        match parent {
            Some(parent_id) => {
                if !world.actors.contains_key(&parent_id) {
                    return Err(ActorFactoryError::ActorNotFound {
                        actor_id: parent_id,
                    });
                }
            }
            None => {
                if world.is_occupied(&transform.location) {
                    return Err(ActorFactoryError::spawn_rejected(
                        blueprint,
                        "spawn failed because of collision at spawn position",
                    ));
                }
            }
        }

        Ok(world.insert_actor(blueprint, transform, parent))
    }

    #[instrument(
        name = "mock_carla_try_spawn_actor",
        skip(self, transform),
        fields(blueprint = %blueprint)
    )]
    async fn try_spawn_actor(
        &self,
        blueprint: &str,
        transform: Transform,
    ) -> Result<Option<ActorRecord>> {
        let mut world = self.world();
        world.ensure_connected()?;
        world.spawn_requests += 1;
        self.check_blueprint(blueprint)?;

        if world.is_occupied(&transform.location) {
            return Ok(None);
        }
        Ok(Some(world.insert_actor(blueprint, transform, None)))
    }

    async fn actors(&self, pattern: Option<&str>) -> Result<Vec<ActorRecord>> {
        let world = self.world();
        world.ensure_connected()?;
        if self.config.fail_actor_list {
            return Err(ActorFactoryError::connection("actor list request timed out"));
        }
        Ok(world
            .actors
            .iter()
            .filter(|(_, a)| pattern.map_or(true, |p| wildcard::actor_matches(&a.type_id, p)))
            .map(|(id, a)| ActorRecord::new(*id, a.type_id.clone()))
            .collect())
    }

    async fn spectator(&self) -> Result<ActorRecord> {
        self.world().ensure_connected()?;
        Ok(ActorRecord::new(SPECTATOR_ID, "spectator"))
    }

    async fn actor_transform(&self, actor_id: ActorId) -> Result<Transform> {
        let world = self.world();
        world.ensure_connected()?;
        world.world_transform(actor_id)
    }

    async fn set_actor_transform(&self, actor_id: ActorId, transform: Transform) -> Result<()> {
        let mut world = self.world();
        world.ensure_connected()?;

        if actor_id == SPECTATOR_ID {
            world.spectator = transform;
            return Ok(());
        }

        // Attached actors keep their pose relative to the parent
        let actor = world
            .actors
            .get_mut(&actor_id)
            .ok_or(ActorFactoryError::ActorNotFound { actor_id })?;
        actor.transform = transform;
        Ok(())
    }

    #[instrument(name = "mock_carla_set_autopilot", skip(self), fields(actor_id, enabled))]
    async fn set_autopilot(&self, actor_id: ActorId, enabled: bool) -> Result<()> {
        let mut world = self.world();
        world.ensure_connected()?;

        let actor = world
            .actors
            .get_mut(&actor_id)
            .ok_or(ActorFactoryError::ActorNotFound { actor_id })?;

        if self.config.fail_autopilot.contains(&actor_id) {
            return Err(ActorFactoryError::AutopilotFailed {
                actor_id,
                message: "mock failure".into(),
            });
        }
        if !actor.type_id.starts_with("vehicle.") {
            return Err(ActorFactoryError::AutopilotFailed {
                actor_id,
                message: format!("'{}' is not a vehicle", actor.type_id),
            });
        }

        actor.autopilot = enabled;
        Ok(())
    }

    #[instrument(name = "mock_carla_destroy_actor", skip(self), fields(actor_id))]
    async fn destroy_actor(&self, actor_id: ActorId) -> Result<()> {
        let mut world = self.world();
        world.ensure_connected()?;

        if self.config.fail_destroy.contains(&actor_id) {
            return Err(ActorFactoryError::DestroyFailed {
                actor_id,
                message: "mock failure".into(),
            });
        }

        world
            .actors
            .remove(&actor_id)
            .map(|_| ())
            .ok_or(ActorFactoryError::ActorNotFound { actor_id })
    }
}
