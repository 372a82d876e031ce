//! Artwork loading service.
//!
//! Owns every piece of the pipeline (memory tiers, disk cache, generation
//! counter, download gate, decode pool) and exposes the request API used by
//! UI call sites. Create it once with [`ImageService::new`] and tear it down
//! with [`ImageService::shutdown`].

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

use crate::domain::entities::{Bitmap, CardId, ImageTier, ThumbnailSize};
use crate::domain::errors::CacheResult;
use crate::domain::ports::ImageTransport;

use super::card_cdn::CardArtSource;
use super::coordinator::{CoordinatorStats, DownloadCoordinator};
use super::decode_pool::{DecodeWorkerPool, scale_to_thumbnail};
use super::disk_cache::DiskCache;
use super::download_queue::{DownloadQueue, MAX_CONCURRENT};
use super::generation::GenerationCounter;
use super::memory_cache::{CacheStats, CacheStore};
use super::request::{LoadRequest, TrackedRequest, TrackingRegistry};

/// Configuration for the image service.
#[derive(Debug, Clone)]
pub struct ImageServiceConfig {
    /// Directory holding `<id>.png` files.
    pub cache_dir: PathBuf,
    /// Card id to URL mapping.
    pub source: CardArtSource,
    /// Maximum simultaneous fetches.
    pub max_concurrent: usize,
    /// Maximum simultaneous decodes.
    pub decode_workers: usize,
    /// Size of thumbnail renditions.
    pub thumbnail: ThumbnailSize,
    /// Per-tier memory capacity; `None` never evicts.
    pub memory_cache_capacity: Option<usize>,
}

impl ImageServiceConfig {
    /// Creates a configuration with defaults for everything but the cache directory.
    #[must_use]
    pub fn new(cache_dir: PathBuf) -> Self {
        Self {
            cache_dir,
            source: CardArtSource::default(),
            max_concurrent: MAX_CONCURRENT,
            decode_workers: default_decode_workers(),
            thumbnail: ThumbnailSize::default(),
            memory_cache_capacity: None,
        }
    }
}

/// Number of decode workers when not configured.
#[must_use]
pub fn default_decode_workers() -> usize {
    std::thread::available_parallelism().map_or(2, NonZeroUsize::get)
}

/// Entry point for loading card artwork into UI targets.
pub struct ImageService {
    cache: Arc<CacheStore>,
    disk: Arc<DiskCache>,
    generation: Arc<GenerationCounter>,
    registry: Arc<TrackingRegistry>,
    coordinator: DownloadCoordinator,
    config: ImageServiceConfig,
}

impl std::fmt::Debug for ImageService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ImageService {
    /// Initializes the service: creates the cache directory and wires the pipeline.
    /// Fetches run on the current tokio runtime, so the returned service may be
    /// used from threads outside it.
    ///
    /// # Errors
    /// Returns error if the cache directory cannot be created.
    pub async fn new(
        config: ImageServiceConfig,
        transport: Arc<dyn ImageTransport>,
    ) -> CacheResult<Self> {
        let disk = Arc::new(DiskCache::new(config.cache_dir.clone()).await?);
        let cache = Arc::new(CacheStore::new(config.memory_cache_capacity));
        let generation = Arc::new(GenerationCounter::new());
        let decoder =
            DecodeWorkerPool::new(config.decode_workers, config.thumbnail, generation.clone());

        let coordinator = DownloadCoordinator::new(
            transport,
            cache.clone(),
            disk.clone(),
            generation.clone(),
            decoder,
            DownloadQueue::new(config.max_concurrent),
            Handle::current(),
        );

        info!(
            cache_dir = %config.cache_dir.display(),
            max_concurrent = config.max_concurrent,
            decode_workers = config.decode_workers,
            "Image service initialized"
        );

        Ok(Self {
            cache,
            disk,
            generation,
            registry: TrackingRegistry::new(),
            coordinator,
            config,
        })
    }

    /// Submits a load of `url` into `request`'s target.
    ///
    /// The service takes ownership of the request: it is stamped with the
    /// current generation, its weak handles are registered, and it joins the
    /// in-flight fetch for `url` or starts (or queues) a new one. The request
    /// resolves exactly once. Callers check the caches first; see [`Self::cached`].
    pub fn load_image_async(&self, url: impl Into<String>, mut request: LoadRequest) {
        request.generation = self.generation.current();
        let url = url.into();
        debug!(url = %url, generation = request.generation, cache_id = ?request.cache_id(), "Load requested");
        let tracked = TrackedRequest::new(request, &self.registry);
        self.coordinator.submit(url, tracked);
    }

    /// Submits a load of a card's artwork from the configured source.
    pub fn load_card_async(&self, id: CardId, request: LoadRequest) {
        self.load_image_async(self.config.source.url_for(id), request);
    }

    /// Looks a card up in the memory tier, then on disk.
    /// A disk hit is scaled if needed and promoted into the memory tier.
    pub async fn cached(&self, id: CardId, tier: ImageTier) -> Option<Bitmap> {
        if let Some(image) = self.cache.get(tier, id) {
            return Some(image);
        }

        let full = self.disk.load(id).await?;
        let image = match tier {
            ImageTier::FullSize => full,
            ImageTier::Thumbnail => {
                let size = self.config.thumbnail;
                match tokio::task::spawn_blocking(move || scale_to_thumbnail(&full, size)).await {
                    Ok(scaled) => Arc::new(scaled),
                    Err(e) => {
                        error!(card_id = %id, error = %e, "Thumbnail task panicked");
                        return None;
                    }
                }
            }
        };
        self.cache.put(tier, id, image.clone());
        Some(image)
    }

    /// Starts a new search session: in-flight loads stop touching the UI and
    /// queued loads from the old session are discarded. Returns the new generation.
    pub fn cancel_all_pending(&self) -> u64 {
        self.coordinator.cancel_all_pending()
    }

    /// Current search generation.
    #[must_use]
    pub fn current_generation(&self) -> u64 {
        self.generation.current()
    }

    /// Memory tiers.
    #[must_use]
    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// Disk tier.
    #[must_use]
    pub fn disk(&self) -> &DiskCache {
        &self.disk
    }

    /// Card id to URL mapping.
    #[must_use]
    pub fn source(&self) -> &CardArtSource {
        &self.config.source
    }

    /// Weak-handle registrations held by unresolved requests.
    #[must_use]
    pub fn live_registrations(&self) -> usize {
        self.registry.live()
    }

    /// Coordinator activity counters.
    #[must_use]
    pub fn stats(&self) -> CoordinatorStats {
        self.coordinator.stats()
    }

    /// Memory cache statistics.
    #[must_use]
    pub fn memory_cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Waits until every submitted request has resolved and disk writes finished.
    pub async fn wait_idle(&self) {
        self.coordinator.wait_idle().await;
    }

    /// Tears the service down: drains the queue, lets in-flight work settle
    /// without touching the UI, and releases every registration.
    pub async fn shutdown(&self) {
        self.coordinator.shutdown().await;
        let live = self.registry.live();
        if live > 0 {
            warn!(live, "Registrations still live after shutdown");
        }
        info!(stats = ?self.coordinator.stats(), "Image service shut down");
    }

    /// Clears all caches.
    pub async fn clear_all(&self) {
        self.cache.clear();
        if let Err(e) = self.disk.clear().await {
            warn!(error = %e, "Failed to clear disk cache");
        }
        info!("Cleared all image caches");
    }
}
