//! Domain types for card artwork.

use std::num::NonZeroU32;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Decoded artwork shared between cache tiers and every waiter of a fetch.
pub type Bitmap = Arc<image::DynamicImage>;

/// Identifier of a card's artwork.
/// Used as the cache key and to address the remote resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(NonZeroU32);

impl CardId {
    /// Creates a `CardId`, rejecting zero.
    #[must_use]
    pub const fn new(raw: u32) -> Option<Self> {
        match NonZeroU32::new(raw) {
            Some(value) => Some(Self(value)),
            None => None,
        }
    }

    /// Returns the raw numeric id.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0.get()
    }
}

impl std::fmt::Display for CardId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error returned when a string is not a valid card id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid card id '{input}': expected a positive integer")]
pub struct ParseCardIdError {
    input: String,
}

impl FromStr for CardId {
    type Err = ParseCardIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u32>()
            .ok()
            .and_then(Self::new)
            .ok_or_else(|| ParseCardIdError {
                input: s.to_string(),
            })
    }
}

impl TryFrom<u32> for CardId {
    type Error = ParseCardIdError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| ParseCardIdError {
            input: value.to_string(),
        })
    }
}

/// Memory cache tier an entry lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageTier {
    /// Scaled bitmaps for search rows and deck slots.
    Thumbnail,
    /// Unscaled bitmaps for the preview pane.
    FullSize,
}

impl std::fmt::Display for ImageTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Thumbnail => write!(f, "thumbnail"),
            Self::FullSize => write!(f, "fullsize"),
        }
    }
}

/// Pixel size thumbnails are scaled to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThumbnailSize {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl ThumbnailSize {
    /// Deck slot thumbnail width.
    pub const SLOT_WIDTH: u32 = 68;
    /// Deck slot thumbnail height.
    pub const SLOT_HEIGHT: u32 = 99;

    /// Creates a thumbnail size, clamping zero dimensions to one pixel.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self {
            width: if width == 0 { 1 } else { width },
            height: if height == 0 { 1 } else { height },
        }
    }
}

impl Default for ThumbnailSize {
    fn default() -> Self {
        Self::new(Self::SLOT_WIDTH, Self::SLOT_HEIGHT)
    }
}

/// Why a request ended without an image reaching its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// A newer search session started before the request resolved.
    Stale,
    /// The UI target was destroyed.
    TargetGone,
    /// Fetch or decode failed.
    Failed,
    /// The service was torn down before the request ran.
    Shutdown,
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stale => write!(f, "stale"),
            Self::TargetGone => write!(f, "target gone"),
            Self::Failed => write!(f, "failed"),
            Self::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// The single outcome of a submitted load request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The bitmap was handed to the target.
    Delivered,
    /// The request was dropped silently.
    Dropped(DropReason),
}

impl LoadOutcome {
    /// Returns true if the target received a bitmap.
    #[must_use]
    pub const fn is_delivered(self) -> bool {
        matches!(self, Self::Delivered)
    }
}

impl std::fmt::Display for LoadOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Delivered => write!(f, "delivered"),
            Self::Dropped(reason) => write!(f, "dropped ({reason})"),
        }
    }
}
