//! # Contracts
//!
//! Shared data structures for the CARLA helper crates.
//! All business crates depend on this crate, reverse dependencies are prohibited.
//!
//! ## Units
//! - Locations in meters, rotations in degrees (CARLA / UE4 convention)
//! - Durations as `std::time::Duration`, step sizes as seconds (f64)

mod error;
mod geometry;
mod runtime;
mod scenario;
mod settings;
pub mod wildcard;

pub use error::*;
pub use geometry::*;
pub use runtime::*;
pub use scenario::*;
pub use settings::*;
