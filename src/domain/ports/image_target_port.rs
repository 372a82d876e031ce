//! Ports for UI elements that display artwork.
//!
//! The engine never owns UI elements. Requests hold weak handles to these
//! traits and call the hooks only while the element is still alive.

use crate::domain::entities::Bitmap;

/// A UI element that displays a bitmap (deck slot, search row, preview picture).
pub trait ImageTarget: Send + Sync {
    /// Replaces the displayed bitmap.
    fn set_image(&self, image: Bitmap);
}

/// A container that switches from a placeholder to the picture once loaded.
pub trait ImageStack: Send + Sync {
    /// Makes the picture page visible.
    fn show_picture(&self);
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Target that records every bitmap it receives.
    #[derive(Default)]
    pub struct RecordingTarget {
        images: Mutex<Vec<Bitmap>>,
    }

    impl RecordingTarget {
        /// Creates an empty recording target.
        pub fn new() -> Self {
            Self::default()
        }

        /// Number of times the mutation hook fired.
        pub fn set_count(&self) -> usize {
            self.images.lock().len()
        }

        /// Last bitmap received.
        pub fn last(&self) -> Option<Bitmap> {
            self.images.lock().last().cloned()
        }
    }

    impl ImageTarget for RecordingTarget {
        fn set_image(&self, image: Bitmap) {
            self.images.lock().push(image);
        }
    }

    /// Stack that counts page switches.
    #[derive(Default)]
    pub struct RecordingStack {
        shown: AtomicUsize,
    }

    impl RecordingStack {
        /// Creates a new recording stack.
        pub fn new() -> Self {
            Self::default()
        }

        /// Number of times the picture page was shown.
        pub fn shown(&self) -> usize {
            self.shown.load(Ordering::SeqCst)
        }
    }

    impl ImageStack for RecordingStack {
        fn show_picture(&self) {
            self.shown.fetch_add(1, Ordering::SeqCst);
        }
    }
}
