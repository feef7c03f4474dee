//! # Camera Follower
//!
//! Keeps the simulator spectator behind a vehicle by polling the pose of a
//! camera attached to it. Stopping is driven by a `CancellationToken`.

pub mod error;
pub mod follower;

pub use error::{FollowError, Result};
pub use follower::{CameraFollower, FollowConfig, FollowOutcome, StopReason};
pub use tokio_util::sync::CancellationToken;
