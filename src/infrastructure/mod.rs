//! Infrastructure layer with external service adapters.

/// Application configuration.
pub mod config;
/// Card artwork loading and caching.
pub mod image;

pub use config::{AppConfig, CliArgs, ImageConfig, LogLevel, StorageManager};
pub use image::{
    CacheStats, CacheStore, CardArtSource, DiskCache, HttpTransport, ImageService,
    ImageServiceConfig, LoadRequest,
};
