//! Card artwork pipeline.
//!
//! This module provides:
//! - Memory tiers for thumbnails and full-size bitmaps
//! - A `<id>.png` disk cache
//! - Per-URL fetch coalescing behind a FIFO concurrency gate
//! - Bounded background decoding
//! - Generation-based invalidation of stale requests

pub mod card_cdn;
pub mod coordinator;
pub mod decode_pool;
pub mod disk_cache;
pub mod download_queue;
pub mod generation;
pub mod http_transport;
pub mod loader;
pub mod memory_cache;
pub mod request;

pub use card_cdn::{CardArtSource, DEFAULT_URL_TEMPLATE};
pub use coordinator::{CoordinatorStats, DownloadCoordinator};
pub use decode_pool::{DecodeWorkerPool, scale_to_thumbnail};
pub use disk_cache::DiskCache;
pub use download_queue::{DownloadQueue, MAX_CONCURRENT};
pub use generation::GenerationCounter;
pub use http_transport::HttpTransport;
pub use loader::{ImageService, ImageServiceConfig, default_decode_workers};
pub use memory_cache::{CacheStats, CacheStore};
pub use request::{LoadRequest, TrackingRegistry};
