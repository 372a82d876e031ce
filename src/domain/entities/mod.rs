//! Domain entity definitions.

mod card_image;

pub use card_image::{
    Bitmap, CardId, DropReason, ImageTier, LoadOutcome, ParseCardIdError, ThumbnailSize,
};
