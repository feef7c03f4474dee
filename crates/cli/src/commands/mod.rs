//! Command implementations.

mod common;
mod fleet;
mod follow;
mod info;
mod run;
mod spawn;
mod validate;

pub use fleet::{run_autopilot, run_destroy_all};
pub use follow::run_follow;
pub use info::run_info;
pub use run::run_scenario;
pub use spawn::{run_spawn, run_spawn_many};
pub use validate::run_validate;
