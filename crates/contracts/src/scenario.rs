//! ScenarioConfig - Config Loader output
//!
//! Describes one helper session: where the simulator is, how many vehicles to
//! provision, and how the chase camera trails the ego vehicle.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{Location, Rotation, Transform};

/// Complete scenario configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct ScenarioConfig {
    /// Connection and time-stepping settings
    #[serde(default)]
    #[validate(nested)]
    pub session: SessionConfig,

    /// Background traffic
    #[serde(default)]
    #[validate(nested)]
    pub fleet: FleetConfig,

    /// Chase camera
    #[serde(default)]
    #[validate(nested)]
    pub camera: CameraConfig,
}

/// Connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct SessionConfig {
    /// CARLA server host
    #[serde(default = "default_carla_host")]
    #[validate(length(min = 1))]
    pub host: String,

    /// CARLA server port
    #[serde(default = "default_carla_port")]
    #[validate(range(min = 1))]
    pub port: u16,

    /// Handshake and per-request timeout (seconds)
    #[serde(default = "default_timeout_secs")]
    #[validate(range(exclusive_min = 0.0))]
    pub timeout_secs: f64,

    /// Switch the server to synchronous (stepped) mode on connect
    #[serde(default)]
    pub stepped_mode: bool,

    /// Fixed step size in seconds, used when `stepped_mode` is set
    #[serde(default = "default_step_size")]
    #[validate(range(exclusive_min = 0.0))]
    pub step_size: f64,
}

fn default_carla_host() -> String {
    "localhost".to_string()
}

fn default_carla_port() -> u16 {
    2000
}

fn default_timeout_secs() -> f64 {
    10.0
}

fn default_step_size() -> f64 {
    0.05
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            host: default_carla_host(),
            port: default_carla_port(),
            timeout_secs: default_timeout_secs(),
            stepped_mode: false,
            step_size: default_step_size(),
        }
    }
}

impl SessionConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs_f64();
        self
    }

    pub fn with_stepped_mode(mut self, step_size: f64) -> Self {
        self.stepped_mode = true;
        self.step_size = step_size;
        self
    }

    /// Timeout as a `Duration`, `None` unless positive and finite
    pub fn timeout(&self) -> Option<Duration> {
        Duration::try_from_secs_f64(self.timeout_secs)
            .ok()
            .filter(|d| !d.is_zero())
    }

    /// `host:port`
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Background traffic settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct FleetConfig {
    /// Number of spawn attempts
    #[serde(default)]
    pub count: usize,

    /// Blueprint filters (e.g. "model3"); `None` = any vehicle
    #[serde(default)]
    pub vehicle_types: Option<Vec<String>>,

    /// Enable autopilot on every vehicle once spawned
    #[serde(default = "default_true")]
    pub autopilot: bool,

    /// Destroy every actor when the session ends
    #[serde(default)]
    pub cleanup_on_exit: bool,
}

fn default_true() -> bool {
    true
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            count: 0,
            vehicle_types: None,
            autopilot: true,
            cleanup_on_exit: false,
        }
    }
}

/// Chase camera settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CameraConfig {
    /// Spawn an ego vehicle and follow it
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Blueprint filter for the ego vehicle; `None` = random vehicle
    #[serde(default)]
    pub ego_type: Option<String>,

    /// Blueprint of the attached camera
    #[serde(default = "default_camera_blueprint")]
    #[validate(length(min = 1))]
    pub blueprint: String,

    /// Camera pose relative to the followed vehicle
    #[serde(default = "default_camera_offset")]
    pub offset: Transform,

    /// Pose copy interval (milliseconds)
    #[serde(default = "default_poll_interval_ms")]
    #[validate(range(min = 1))]
    pub poll_interval_ms: u64,
}

fn default_camera_blueprint() -> String {
    "sensor.camera.rgb".to_string()
}

/// Behind and above, pitched down at the vehicle
pub fn default_camera_offset() -> Transform {
    Transform {
        location: Location::new(-4.0, 0.0, 4.0),
        rotation: Rotation::new(-25.0, 0.0, 0.0),
    }
}

fn default_poll_interval_ms() -> u64 {
    10
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ego_type: None,
            blueprint: default_camera_blueprint(),
            offset: default_camera_offset(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl CameraConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
