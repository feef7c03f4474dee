//! # Actor Factory
//!
//! CARLA session and actor management.
//!
//! Responsibilities:
//! - Connect to the simulator and switch time-stepping mode (`Session`)
//! - Spawn vehicles at recommended spawn points (`ActorFactory`)
//! - Toggle autopilot and tear down actors in bulk (`FleetController`)
//! - Support a Mock simulator for tests and offline runs
//!
//! ## Feature Flags
//!
//! - `real-carla`: Enable real CARLA client (requires carla crate)

pub mod client;
pub mod error;
pub mod factory;
pub mod fleet;
pub mod mock_client;
pub mod session;

#[cfg(feature = "real-carla")]
pub mod carla_client;

pub use client::CarlaClient;
pub use contracts::{ActorId, Transform};
pub use error::{ActorFactoryError, Result};
pub use factory::{ActorFactory, SpawnSummary};
pub use fleet::FleetController;
pub use mock_client::{MockCarlaClient, MockConfig};
pub use session::{Actor, Connection, Scene, Session};

#[cfg(feature = "real-carla")]
pub use carla_client::RealCarlaClient;
