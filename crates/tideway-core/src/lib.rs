//! tideway-core — shared configuration and command execution for Tideway.

pub mod config;
pub mod exec;

pub use config::TidewayConfig;
pub use exec::{CommandError, CommandResult, run_combined};
