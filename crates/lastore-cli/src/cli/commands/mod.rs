//! CLI command handlers, one per file.

mod config;
mod lanes;
mod replay;

pub use config::run_config;
pub use lanes::run_lanes;
pub use replay::run_replay;
