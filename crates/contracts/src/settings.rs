//! Episode time-stepping settings

use serde::{Deserialize, Serialize};

/// Time-stepping settings of the current episode.
///
/// In synchronous ("stepped") mode the server only advances when a client
/// ticks, by `fixed_delta_seconds` each time.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EpisodeSettings {
    /// Advance only on explicit tick
    pub synchronous_mode: bool,

    /// Fixed step size in seconds, `None` = variable (real time)
    pub fixed_delta_seconds: Option<f64>,
}

impl EpisodeSettings {
    /// Stepped mode with a fixed step
    pub fn stepped(step_size: f64) -> Self {
        Self {
            synchronous_mode: true,
            fixed_delta_seconds: Some(step_size),
        }
    }

    /// Free-running real-time mode
    pub fn free_running() -> Self {
        Self {
            synchronous_mode: false,
            fixed_delta_seconds: None,
        }
    }
}
