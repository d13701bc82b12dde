//! parcel-track command line: config resolution and subcommand handlers.

pub mod commands;
pub mod config;

pub use config::{load_config, resolve_config_path};
