//! ActorFactory 核心实现
//!
//! 在随机的推荐 spawn point 上放置车辆：单个 spawn（严格）或批量 spawn（宽松）。

use std::fmt;
use std::sync::{Mutex, PoisonError};

use observability::SpawnOutcome;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::SeedableRng;
use tracing::{debug, error, info, instrument, warn};

use crate::client::CarlaClient;
use crate::error::{ActorFactoryError, Result};
use crate::session::{Actor, Scene};

/// Blueprint filter for single spawns without a type: the vehicle tag
const VEHICLE_CATEGORY: &str = "vehicle";

/// Blueprint filter for batch spawns without types
const ALL_VEHICLES: &str = "*vehicle*";

/// 批量 spawn 的结果计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpawnSummary {
    /// Attempts made; zero when the vehicle types could not be resolved
    pub attempted: usize,
    pub spawned: usize,
    /// Attempts that hit an occupied spawn point
    pub skipped: usize,
    pub failed: usize,
}

impl fmt::Display for SpawnSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} attempted, {} spawned, {} skipped, {} failed",
            self.attempted, self.spawned, self.skipped, self.failed
        )
    }
}

/// Actor Factory
///
/// Random choices come from an owned RNG; `with_seed` makes them repeatable.
pub struct ActorFactory<C: CarlaClient> {
    scene: Scene<C>,
    rng: Mutex<StdRng>,
}

impl<C: CarlaClient> ActorFactory<C> {
    pub fn new(scene: Scene<C>) -> Self {
        Self {
            scene,
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// 使用固定种子创建 ActorFactory（结果可复现）
    pub fn with_seed(scene: Scene<C>, seed: u64) -> Self {
        Self {
            scene,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Scene the factory spawns into
    pub fn scene(&self) -> &Scene<C> {
        &self.scene
    }

    /// Spawn a single vehicle at a random recommended spawn point
    ///
    /// With `type_filter`, the first blueprint matching it is used; otherwise
    /// a random blueprint of the vehicle category.
    ///
    /// # Errors
    /// `SpawnRejected` when nothing matches the filter, the map has no spawn
    /// points or the chosen location is occupied. The failure is logged.
    #[instrument(
        name = "actor_factory_spawn_one",
        skip(self),
        fields(filter = type_filter.unwrap_or(VEHICLE_CATEGORY))
    )]
    pub async fn spawn_one(&self, type_filter: Option<&str>) -> Result<Actor> {
        let result = self.spawn_one_inner(type_filter).await;

        match &result {
            Ok(actor) => {
                observability::record_spawn_attempt(SpawnOutcome::Spawned);
                info!(actor_id = actor.id(), type_id = actor.type_id(), "spawned vehicle");
            }
            Err(e) => {
                observability::record_spawn_attempt(SpawnOutcome::Failed);
                error!(error = %e, "failed to spawn vehicle");
            }
        }

        result
    }

    async fn spawn_one_inner(&self, type_filter: Option<&str>) -> Result<Actor> {
        let candidates: Vec<String> = match type_filter {
            Some(filter) => self
                .scene
                .find_blueprints(filter)
                .await?
                .into_iter()
                .take(1)
                .collect(),
            None => self.scene.find_blueprints(VEHICLE_CATEGORY).await?,
        };

        let blueprint = self.choose(&candidates).cloned().ok_or_else(|| {
            ActorFactoryError::spawn_rejected(
                type_filter.unwrap_or(VEHICLE_CATEGORY),
                "no blueprint matches the filter",
            )
        })?;

        let spawn_points = self.scene.spawn_points().await?;
        let transform = self.choose(&spawn_points).copied().ok_or_else(|| {
            ActorFactoryError::spawn_rejected(&blueprint, "map has no recommended spawn points")
        })?;

        self.scene.spawn(&blueprint, transform).await
    }

    /// Make exactly `count` spawn attempts, skipping occupied locations
    ///
    /// Each attempt draws a blueprint and a spawn point independently, with
    /// replacement. Without filters (or with an empty list) every vehicle
    /// blueprint is a candidate; with filters, the first match of each one.
    /// A filter that matches nothing aborts the batch before any attempt.
    /// Per-attempt failures are logged and the batch continues.
    #[instrument(
        name = "actor_factory_spawn_many",
        skip(self, type_filters),
        fields(filters = type_filters.map_or(0, |f| f.len()))
    )]
    pub async fn spawn_many(&self, count: usize, type_filters: Option<&[String]>) -> SpawnSummary {
        let mut summary = SpawnSummary::default();

        let candidates = match self.resolve_candidates(type_filters).await {
            Ok(candidates) => candidates,
            Err(e) => {
                error!(error = %e, "failed to resolve vehicle types, nothing spawned");
                return summary;
            }
        };
        debug!(candidates = ?candidates, "resolved vehicle blueprints");

        for attempt in 0..count {
            summary.attempted += 1;
            match self.spawn_attempt(&candidates).await {
                Ok(Some(actor)) => {
                    summary.spawned += 1;
                    observability::record_spawn_attempt(SpawnOutcome::Spawned);
                    debug!(attempt, actor_id = actor.id(), type_id = actor.type_id(), "spawned vehicle");
                }
                Ok(None) => {
                    summary.skipped += 1;
                    observability::record_spawn_attempt(SpawnOutcome::Skipped);
                    debug!(attempt, "spawn point occupied, skipped");
                }
                Err(e) => {
                    summary.failed += 1;
                    observability::record_spawn_attempt(SpawnOutcome::Failed);
                    warn!(attempt, error = %e, "spawn attempt failed");
                }
            }
        }

        info!(
            attempted = summary.attempted,
            spawned = summary.spawned,
            skipped = summary.skipped,
            failed = summary.failed,
            "spawn_many completed"
        );
        summary
    }

    async fn resolve_candidates(&self, type_filters: Option<&[String]>) -> Result<Vec<String>> {
        let Some(filters) = type_filters.filter(|f| !f.is_empty()) else {
            return self.scene.find_blueprints(ALL_VEHICLES).await;
        };

        let mut candidates = Vec::with_capacity(filters.len());
        for filter in filters {
            let first = self
                .scene
                .find_blueprints(filter)
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| {
                    ActorFactoryError::spawn_rejected(filter, "no blueprint matches the vehicle type")
                })?;
            candidates.push(first);
        }
        Ok(candidates)
    }

    async fn spawn_attempt(&self, candidates: &[String]) -> Result<Option<Actor>> {
        let blueprint = self
            .choose(candidates)
            .cloned()
            .ok_or_else(|| ActorFactoryError::spawn_rejected(ALL_VEHICLES, "no vehicle blueprints"))?;

        let spawn_points = self.scene.spawn_points().await?;
        let transform = self.choose(&spawn_points).copied().ok_or_else(|| {
            ActorFactoryError::spawn_rejected(&blueprint, "map has no recommended spawn points")
        })?;

        self.scene.try_spawn(&blueprint, transform).await
    }

    fn choose<'a, T>(&self, items: &'a [T]) -> Option<&'a T> {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        items.choose(&mut *rng)
    }
}
