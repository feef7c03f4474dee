//! Camera Follower error types

use actor_factory::{ActorFactoryError, ActorId};
use thiserror::Error;

/// Follow setup failure; nothing is left running when one is returned
#[derive(Debug, Error)]
pub enum FollowError {
    #[error("failed to get spectator: {0}")]
    Spectator(#[source] ActorFactoryError),

    #[error("failed to attach camera to actor {actor_id}: {source}")]
    CameraAttach {
        actor_id: ActorId,
        #[source]
        source: ActorFactoryError,
    },

    /// Initial spectator placement failed
    #[error("failed to move spectator to camera: {0}")]
    Snap(#[source] ActorFactoryError),
}

pub type Result<T> = std::result::Result<T, FollowError>;
