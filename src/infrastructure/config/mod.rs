//! Application configuration.

/// Config file schema and path resolution.
pub mod app_config;
/// Command-line arguments.
pub mod args;
/// Config file loading and saving.
pub mod storage;

pub use app_config::{AppConfig, ImageConfig, LogLevel};
pub use args::CliArgs;
pub use storage::{ConfigError, StorageManager};
