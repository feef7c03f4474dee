//! Actor Factory error types

use contracts::{ActorId, ContractError};
use thiserror::Error;

/// Actor Factory specific error
#[derive(Debug, Error)]
pub enum ActorFactoryError {
    /// CARLA connection error: unreachable, handshake timeout, incompatible server
    #[error("failed to connect to CARLA: {message}")]
    ConnectionFailed { message: String },

    /// Episode settings could not be read or applied
    #[error("failed to apply episode settings: {message}")]
    SettingsFailed { message: String },

    /// Spawn request rejected: occupied location, unknown blueprint, nothing to pick from
    #[error("failed to spawn '{blueprint}': {message}")]
    SpawnRejected { blueprint: String, message: String },

    /// Handle refers to an actor no longer present in the world
    #[error("actor {actor_id} not found")]
    ActorNotFound { actor_id: ActorId },

    /// Autopilot request failed
    #[error("failed to set autopilot on actor {actor_id}: {message}")]
    AutopilotFailed { actor_id: ActorId, message: String },

    /// Transform query or update failed
    #[error("failed to access transform of actor {actor_id}: {message}")]
    TransformFailed { actor_id: ActorId, message: String },

    /// Destroy error
    #[error("failed to destroy actor {actor_id}: {message}")]
    DestroyFailed { actor_id: ActorId, message: String },

    /// Fleet-wide operation stopped after a per-actor failure
    #[error("{operation} stopped after {applied}/{total} actors: {source}")]
    PartialFleetUpdate {
        operation: &'static str,
        applied: usize,
        total: usize,
        #[source]
        source: Box<ActorFactoryError>,
    },

    /// Contract error
    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl ActorFactoryError {
    /// Create connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            message: message.into(),
        }
    }

    /// Create spawn rejection
    pub fn spawn_rejected(blueprint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SpawnRejected {
            blueprint: blueprint.into(),
            message: message.into(),
        }
    }

    /// Whether the error means the actor handle went stale
    pub fn is_actor_lost(&self) -> bool {
        matches!(self, Self::ActorNotFound { .. })
    }
}

/// Result alias
pub type Result<T> = std::result::Result<T, ActorFactoryError>;
