//! Domain layer with core entities and port definitions.

/// Entity definitions.
pub mod entities;
/// Error types.
pub mod errors;
/// Port definitions.
pub mod ports;

pub use entities::{Bitmap, CardId, DropReason, ImageTier, LoadOutcome, ThumbnailSize};
pub use errors::{CacheError, CacheResult, TransportError};
pub use ports::{ImageStack, ImageTarget, ImageTransport};
