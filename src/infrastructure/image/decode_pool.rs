//! Background decoding of fetched artwork.
//!
//! Decoding runs on tokio's blocking pool, bounded by a semaphore so a burst
//! of completions cannot occupy every blocking thread at once.

use std::sync::Arc;

use bytes::Bytes;
use image::imageops::FilterType;
use tokio::sync::Semaphore;
use tracing::{debug, error, warn};

use crate::domain::entities::{Bitmap, ThumbnailSize};

use super::generation::GenerationCounter;

/// Bytes to decode plus the generation that requested them.
#[derive(Debug, Clone)]
pub struct DecodeJob {
    /// Encoded image bytes.
    pub bytes: Bytes,
    /// Newest generation among the requests waiting on these bytes.
    pub generation: u64,
    /// Decode even if stale, because a cache tier still wants the result.
    pub keep_when_stale: bool,
    /// Produce the thumbnail rendition as well.
    pub want_thumbnail: bool,
}

/// A decoded bitmap and, when requested, its thumbnail rendition.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    /// Unscaled bitmap.
    pub full: Bitmap,
    /// Bitmap scaled to the thumbnail size.
    pub thumbnail: Option<Bitmap>,
}

impl DecodedImage {
    /// Picks the rendition a request asked for, falling back to the full bitmap.
    #[must_use]
    pub fn rendition(&self, thumbnail: bool) -> &Bitmap {
        match &self.thumbnail {
            Some(scaled) if thumbnail => scaled,
            _ => &self.full,
        }
    }
}

/// Result of a decode job.
#[derive(Debug, Clone)]
pub enum DecodeOutcome {
    /// Bytes decoded successfully.
    Decoded(DecodedImage),
    /// Skipped because every requester went stale.
    Stale,
    /// Bytes were corrupt or truncated.
    Failed,
}

impl DecodeOutcome {
    /// Returns the decoded image, if any.
    #[must_use]
    pub fn into_image(self) -> Option<DecodedImage> {
        match self {
            Self::Decoded(image) => Some(image),
            Self::Stale | Self::Failed => None,
        }
    }
}

/// Bounded pool that turns bytes into bitmaps off the calling thread.
#[derive(Debug)]
pub struct DecodeWorkerPool {
    permits: Arc<Semaphore>,
    thumbnail: ThumbnailSize,
    generation: Arc<GenerationCounter>,
}

impl DecodeWorkerPool {
    /// Creates a pool running at most `workers` decodes at once (at least one).
    #[must_use]
    pub fn new(workers: usize, thumbnail: ThumbnailSize, generation: Arc<GenerationCounter>) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(workers.max(1))),
            thumbnail,
            generation,
        }
    }

    /// Decodes `job.bytes`, skipping the work if the job went stale first.
    pub async fn decode(&self, job: DecodeJob) -> DecodeOutcome {
        if self.should_skip(&job) {
            debug!(generation = job.generation, "Skipping decode for stale request");
            return DecodeOutcome::Stale;
        }

        let Ok(_permit) = self.permits.clone().acquire_owned().await else {
            return DecodeOutcome::Failed;
        };

        if self.should_skip(&job) {
            debug!(generation = job.generation, "Skipping decode for stale request");
            return DecodeOutcome::Stale;
        }

        let size = job.want_thumbnail.then_some(self.thumbnail);
        let result = tokio::task::spawn_blocking(move || decode_bytes(&job.bytes, size)).await;

        match result {
            Ok(Ok(decoded)) => DecodeOutcome::Decoded(decoded),
            Ok(Err(e)) => {
                warn!(error = %e, "Failed to decode artwork");
                DecodeOutcome::Failed
            }
            Err(e) => {
                error!(error = %e, "Decode task panicked");
                DecodeOutcome::Failed
            }
        }
    }

    /// Adds the thumbnail rendition to an image decoded without one.
    pub async fn add_thumbnail(&self, image: DecodedImage) -> DecodedImage {
        if image.thumbnail.is_some() {
            return image;
        }
        let Ok(_permit) = self.permits.clone().acquire_owned().await else {
            return image;
        };

        let size = self.thumbnail;
        let full = image.full.clone();
        match tokio::task::spawn_blocking(move || scale_to_thumbnail(&full, size)).await {
            Ok(scaled) => DecodedImage {
                thumbnail: Some(Arc::new(scaled)),
                ..image
            },
            Err(e) => {
                error!(error = %e, "Thumbnail task panicked");
                image
            }
        }
    }

    fn should_skip(&self, job: &DecodeJob) -> bool {
        !job.keep_when_stale && self.generation.is_stale(job.generation)
    }
}

fn decode_bytes(
    bytes: &[u8],
    thumbnail: Option<ThumbnailSize>,
) -> Result<DecodedImage, image::ImageError> {
    let full = image::load_from_memory(bytes)?;
    let thumbnail = thumbnail.map(|size| Arc::new(scale_to_thumbnail(&full, size)));
    Ok(DecodedImage {
        full: Arc::new(full),
        thumbnail,
    })
}

/// Scales a bitmap to the slot thumbnail size. CPU-bound; call off the UI thread.
#[must_use]
pub fn scale_to_thumbnail(image: &image::DynamicImage, size: ThumbnailSize) -> image::DynamicImage {
    if image.width() == size.width && image.height() == size.height {
        image.clone()
    } else {
        image.resize_exact(size.width, size.height, FilterType::Lanczos3)
    }
}

#[cfg(test)]
pub(crate) fn encode_png(width: u32, height: u32) -> Bytes {
    let img = image::DynamicImage::new_rgb8(width, height);
    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
    Bytes::from(buf.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(generation: &Arc<GenerationCounter>) -> DecodeWorkerPool {
        DecodeWorkerPool::new(2, ThumbnailSize::default(), generation.clone())
    }

    #[tokio::test]
    async fn test_decodes_full_and_thumbnail() {
        let generation = Arc::new(GenerationCounter::new());
        let job = DecodeJob {
            bytes: encode_png(421, 614),
            generation: generation.current(),
            keep_when_stale: false,
            want_thumbnail: true,
        };

        let decoded = pool(&generation).decode(job).await.into_image().unwrap();
        assert_eq!((decoded.full.width(), decoded.full.height()), (421, 614));
        let thumbnail = decoded.thumbnail.as_ref().unwrap();
        assert_eq!(
            (thumbnail.width(), thumbnail.height()),
            (ThumbnailSize::SLOT_WIDTH, ThumbnailSize::SLOT_HEIGHT)
        );
        assert!(Arc::ptr_eq(decoded.rendition(false), &decoded.full));
        assert!(Arc::ptr_eq(decoded.rendition(true), thumbnail));
    }

    #[tokio::test]
    async fn test_full_size_only_skips_scaling() {
        let generation = Arc::new(GenerationCounter::new());
        let pool = pool(&generation);
        let job = DecodeJob {
            bytes: encode_png(421, 614),
            generation: generation.current(),
            keep_when_stale: false,
            want_thumbnail: false,
        };

        let decoded = pool.decode(job).await.into_image().unwrap();
        assert!(decoded.thumbnail.is_none());
        assert!(Arc::ptr_eq(decoded.rendition(true), &decoded.full));

        let scaled = pool.add_thumbnail(decoded).await;
        assert_eq!(
            scaled.rendition(true).width(),
            ThumbnailSize::SLOT_WIDTH
        );
    }

    #[tokio::test]
    async fn test_corrupt_bytes_fail_quietly() {
        let generation = Arc::new(GenerationCounter::new());
        let job = DecodeJob {
            bytes: Bytes::from_static(b"\x89PNG truncated"),
            generation: generation.current(),
            keep_when_stale: false,
            want_thumbnail: true,
        };

        assert!(matches!(pool(&generation).decode(job).await, DecodeOutcome::Failed));
    }

    #[tokio::test]
    async fn test_stale_job_is_skipped() {
        let generation = Arc::new(GenerationCounter::new());
        let job = DecodeJob {
            bytes: encode_png(4, 4),
            generation: generation.current(),
            keep_when_stale: false,
            want_thumbnail: false,
        };
        generation.bump();

        assert!(matches!(pool(&generation).decode(job).await, DecodeOutcome::Stale));
    }

    #[tokio::test]
    async fn test_stale_job_kept_for_cache() {
        let generation = Arc::new(GenerationCounter::new());
        let job = DecodeJob {
            bytes: encode_png(4, 4),
            generation: generation.current(),
            keep_when_stale: true,
            want_thumbnail: false,
        };
        generation.bump();

        assert!(pool(&generation).decode(job).await.into_image().is_some());
    }
}
