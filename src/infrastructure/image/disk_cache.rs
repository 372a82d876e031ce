//! Disk-based artwork cache for persistence across sessions.
//!
//! One PNG file per card at `<cache_dir>/<id>.png`. The disk tier is an
//! optimization only: reads never fail loudly and writes are best-effort.

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tracing::{debug, error, trace, warn};

use crate::domain::entities::{Bitmap, CardId};
use crate::domain::errors::{CacheError, CacheResult};

const CACHE_EXTENSION: &str = "png";

/// Persistent cache directory holding encoded artwork.
#[derive(Debug)]
pub struct DiskCache {
    cache_dir: PathBuf,
}

impl DiskCache {
    /// Opens (and creates if needed) a disk cache in `cache_dir`.
    ///
    /// # Errors
    /// Returns error if the cache directory cannot be created.
    pub async fn new(cache_dir: PathBuf) -> CacheResult<Self> {
        fs::create_dir_all(&cache_dir)
            .await
            .map_err(|e| CacheError::Io(format!("Failed to create cache dir: {e}")))?;
        debug!(path = %cache_dir.display(), "Disk cache ready");
        Ok(Self { cache_dir })
    }

    /// Returns the cache directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Returns the file path for a card.
    #[must_use]
    pub fn path_for(&self, id: CardId) -> PathBuf {
        self.cache_dir.join(format!("{id}.{CACHE_EXTENSION}"))
    }

    /// Loads and decodes a cached bitmap.
    /// Missing files and undecodable files both yield `None`.
    pub async fn load(&self, id: CardId) -> Option<Bitmap> {
        let path = self.path_for(id);
        let Ok(bytes) = fs::read(&path).await else {
            trace!(card_id = %id, "Disk cache miss");
            return None;
        };
        trace!(card_id = %id, path = %path.display(), "Disk cache hit");

        let result = tokio::task::spawn_blocking(move || image::load_from_memory(&bytes)).await;

        match result {
            Ok(Ok(img)) => {
                debug!(card_id = %id, "Decoded image from disk cache");
                Some(Arc::new(img))
            }
            Ok(Err(e)) => {
                warn!(card_id = %id, error = %e, "Failed to decode cached image");
                None
            }
            Err(e) => {
                error!(card_id = %id, error = %e, "Decode task panicked");
                None
            }
        }
    }

    /// Persists a bitmap. Failures are logged and otherwise ignored.
    pub async fn save(&self, id: CardId, image: &Bitmap) {
        if let Err(e) = self.try_save(id, image).await {
            warn!(card_id = %id, error = %e, "Failed to cache to disk");
        }
    }

    /// Encodes and writes a bitmap, replacing any existing file atomically.
    /// Each write goes through its own temporary file, so concurrent saves of
    /// one card never clobber each other.
    ///
    /// # Errors
    /// Returns error if encoding or any file operation fails.
    pub async fn try_save(&self, id: CardId, image: &Bitmap) -> CacheResult<()> {
        let image = image.clone();
        let dir = self.cache_dir.clone();
        let path = self.path_for(id);
        let target = path.clone();

        let size = tokio::task::spawn_blocking(move || -> CacheResult<usize> {
            let mut buf = Cursor::new(Vec::new());
            image.write_to(&mut buf, image::ImageFormat::Png)?;
            let encoded = buf.into_inner();

            let mut temp_file = tempfile::NamedTempFile::new_in(&dir)
                .map_err(|e| CacheError::Io(format!("Failed to create cache file: {e}")))?;
            temp_file
                .write_all(&encoded)
                .map_err(|e| CacheError::Io(format!("Failed to write cache file: {e}")))?;
            temp_file.persist(&target).map_err(|e| {
                CacheError::Io(format!("Failed to move cache file into place: {}", e.error))
            })?;
            Ok(encoded.len())
        })
        .await
        .map_err(|e| CacheError::Encode(format!("Encode task panicked: {e}")))??;

        debug!(card_id = %id, path = %path.display(), size, "Stored image in disk cache");
        Ok(())
    }

    /// Checks if a card is cached.
    pub async fn contains(&self, id: CardId) -> bool {
        fs::try_exists(self.path_for(id)).await.unwrap_or(false)
    }

    /// Removes a card from disk cache.
    pub async fn evict(&self, id: CardId) {
        if let Err(e) = fs::remove_file(self.path_for(id)).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(card_id = %id, error = %e, "Failed to evict from disk cache");
            }
        } else {
            debug!(card_id = %id, "Evicted from disk cache");
        }
    }

    /// Counts cached files.
    pub async fn len(&self) -> usize {
        let Ok(mut entries) = fs::read_dir(&self.cache_dir).await else {
            return 0;
        };
        let mut count = 0;
        while let Ok(Some(entry)) = entries.next_entry().await {
            if entry
                .path()
                .extension()
                .is_some_and(|ext| ext == CACHE_EXTENSION)
            {
                count += 1;
            }
        }
        count
    }

    /// Returns true if no file is cached.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Clears the entire disk cache.
    ///
    /// # Errors
    /// Returns error if the cache directory cannot be read.
    pub async fn clear(&self) -> CacheResult<()> {
        let mut entries = fs::read_dir(&self.cache_dir)
            .await
            .map_err(|e| CacheError::Io(format!("Failed to read cache dir: {e}")))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CacheError::Io(format!("Failed to read entry: {e}")))?
        {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == CACHE_EXTENSION)
                && fs::remove_file(&path).await.is_err()
            {
                warn!(path = %path.display(), "Failed to remove cache file");
            }
        }
        debug!("Cleared disk cache");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn create_test_cache() -> (DiskCache, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let cache = DiskCache::new(temp_dir.path().to_path_buf()).await.unwrap();
        (cache, temp_dir)
    }

    fn id(raw: u32) -> CardId {
        CardId::new(raw).unwrap()
    }

    fn checkerboard() -> Bitmap {
        let img = image::RgbaImage::from_fn(6, 4, |x, y| {
            if (x + y) % 2 == 0 {
                image::Rgba([255, 0, 0, 255])
            } else {
                image::Rgba([0, 0, 255, 128])
            }
        });
        Arc::new(image::DynamicImage::ImageRgba8(img))
    }

    #[tokio::test]
    async fn test_save_then_load_same_pixels() {
        let (cache, _temp) = create_test_cache().await;
        let original = checkerboard();

        cache.save(id(42), &original).await;
        let loaded = cache.load(id(42)).await.unwrap();

        assert_eq!(loaded.to_rgba8(), original.to_rgba8());
    }

    #[tokio::test]
    async fn test_missing_file_is_none() {
        let (cache, _temp) = create_test_cache().await;
        assert!(cache.load(id(42)).await.is_none());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_none() {
        let (cache, _temp) = create_test_cache().await;
        std::fs::write(cache.path_for(id(9)), b"definitely not a png").unwrap();

        assert!(cache.load(id(9)).await.is_none());
    }

    #[tokio::test]
    async fn test_path_layout() {
        let (cache, temp) = create_test_cache().await;
        assert_eq!(cache.dir(), temp.path());
        assert_eq!(cache.path_for(id(1234)), temp.path().join("1234.png"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_saves_of_same_card_all_succeed() {
        let (cache, _temp) = create_test_cache().await;
        let first = Arc::new(image::DynamicImage::new_rgb8(600, 800));
        let second = checkerboard();

        for _ in 0..10 {
            let (a, b) = tokio::join!(cache.try_save(id(42), &first), cache.try_save(id(42), &second));
            assert!(a.is_ok());
            assert!(b.is_ok());

            let loaded = cache.load(id(42)).await.unwrap();
            assert!(loaded.width() == 600 || loaded.width() == 6);
        }
        assert_eq!(std::fs::read_dir(cache.dir()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_save_failure_is_swallowed() {
        let (cache, temp) = create_test_cache().await;
        drop(temp);

        cache.save(id(5), &checkerboard()).await;
        assert!(cache.try_save(id(5), &checkerboard()).await.is_err());
    }

    #[tokio::test]
    async fn test_evict_and_clear() {
        let (cache, _temp) = create_test_cache().await;
        cache.save(id(1), &checkerboard()).await;
        cache.save(id(2), &checkerboard()).await;
        assert_eq!(cache.len().await, 2);

        cache.evict(id(1)).await;
        assert!(!cache.contains(id(1)).await);
        assert!(cache.contains(id(2)).await);

        cache.clear().await.unwrap();
        assert!(cache.is_empty().await);
    }
}
