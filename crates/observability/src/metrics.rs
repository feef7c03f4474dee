//! Helper-layer metrics
//!
//! Counters for every request the helpers issue to the simulator, plus
//! online statistics used by the camera follower.

use metrics::{counter, gauge, histogram};

/// 单次 spawn 尝试的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnOutcome {
    /// Actor created
    Spawned,
    /// Lenient spawn skipped an occupied location
    Skipped,
    /// Request failed
    Failed,
}

impl SpawnOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Spawned => "spawned",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }
}

/// 记录一次连接尝试
pub fn record_connection(success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "carla_helpers_connections_total",
        "status" => status.to_string()
    )
    .increment(1);
}

/// 记录一次 spawn 尝试
pub fn record_spawn_attempt(outcome: SpawnOutcome) {
    counter!(
        "carla_helpers_spawn_attempts_total",
        "outcome" => outcome.as_str().to_string()
    )
    .increment(1);
}

/// Record an autopilot flag change on one vehicle
pub fn record_autopilot_update(enabled: bool) {
    counter!(
        "carla_helpers_autopilot_updates_total",
        "enabled" => enabled.to_string()
    )
    .increment(1);
}

/// Record one destroyed actor
pub fn record_actor_destroyed() {
    counter!("carla_helpers_actors_destroyed_total").increment(1);
}

/// Record one follow loop iteration and the time spent copying the pose
pub fn record_follow_iteration(copy_latency_ms: f64) {
    counter!("carla_helpers_follow_iterations_total").increment(1);
    histogram!("carla_helpers_follow_copy_latency_ms").record(copy_latency_ms);
}

/// Mark the follow loop as running / stopped
pub fn set_follow_active(active: bool) {
    gauge!("carla_helpers_follow_active").set(if active { 1.0 } else { 0.0 });
}

/// Statistics summary
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计（Welford 算法）
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// Add a sample
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn summary(&self) -> StatsSummary {
        StatsSummary::from(self)
    }
}
