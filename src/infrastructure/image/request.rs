//! Load requests and their weak-handle tracking.
//!
//! A request never owns its UI target. It holds weak handles that resolve to
//! nothing once the element is destroyed. Every submitted request carries a
//! [`Registration`] that is released exactly once when the request resolves,
//! whatever the outcome.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use tokio::sync::oneshot;

use crate::domain::entities::{Bitmap, CardId, DropReason, LoadOutcome};
use crate::domain::ports::{ImageStack, ImageTarget};

/// What a UI call site wants loaded and how the result should be cached.
pub struct LoadRequest {
    pub(crate) target: Weak<dyn ImageTarget>,
    pub(crate) stack: Option<Weak<dyn ImageStack>>,
    pub(crate) scale_to_thumbnail: bool,
    pub(crate) cache_id: Option<CardId>,
    pub(crate) add_to_thumb_cache: bool,
    pub(crate) is_local_file: bool,
    pub(crate) generation: u64,
    pub(crate) on_resolved: Option<oneshot::Sender<LoadOutcome>>,
}

impl LoadRequest {
    /// Creates a full-size, uncached request for `target`.
    #[must_use]
    pub fn new<T: ImageTarget + 'static>(target: &Arc<T>) -> Self {
        let target: Weak<dyn ImageTarget> = Arc::<T>::downgrade(target);
        Self {
            target,
            stack: None,
            scale_to_thumbnail: false,
            cache_id: None,
            add_to_thumb_cache: false,
            is_local_file: false,
            generation: 0,
            on_resolved: None,
        }
    }

    /// Request for a deck slot or search row: thumbnail, cached in every tier.
    #[must_use]
    pub fn for_slot<T: ImageTarget + 'static>(target: &Arc<T>, id: CardId) -> Self {
        Self::new(target)
            .scale_to_thumbnail(true)
            .cache_as(id)
            .add_to_thumb_cache(true)
    }

    /// Request for the preview pane: full size, cached in the full-size and disk tiers.
    #[must_use]
    pub fn for_preview<T, S>(target: &Arc<T>, stack: &Arc<S>, id: CardId) -> Self
    where
        T: ImageTarget + 'static,
        S: ImageStack + 'static,
    {
        Self::new(target).with_stack(stack).cache_as(id)
    }

    /// Switches `stack` to its picture page on delivery.
    #[must_use]
    pub fn with_stack<S: ImageStack + 'static>(mut self, stack: &Arc<S>) -> Self {
        let stack: Weak<dyn ImageStack> = Arc::<S>::downgrade(stack);
        self.stack = Some(stack);
        self
    }

    /// Delivers the thumbnail rendition instead of the full-size one.
    #[must_use]
    pub const fn scale_to_thumbnail(mut self, enabled: bool) -> Self {
        self.scale_to_thumbnail = enabled;
        self
    }

    /// Caches the result under `id` in the full-size and disk tiers.
    #[must_use]
    pub const fn cache_as(mut self, id: CardId) -> Self {
        self.cache_id = Some(id);
        self
    }

    /// Also stores the thumbnail rendition in the thumbnail tier.
    #[must_use]
    pub const fn add_to_thumb_cache(mut self, enabled: bool) -> Self {
        self.add_to_thumb_cache = enabled;
        self
    }

    /// Treats the locator as a local file path instead of a URL.
    #[must_use]
    pub const fn local_file(mut self, enabled: bool) -> Self {
        self.is_local_file = enabled;
        self
    }

    /// Reports the request's single outcome on `tx`.
    #[must_use]
    pub fn on_resolved(mut self, tx: oneshot::Sender<LoadOutcome>) -> Self {
        self.on_resolved = Some(tx);
        self
    }

    /// Cache id, if caching was requested.
    #[must_use]
    pub const fn cache_id(&self) -> Option<CardId> {
        self.cache_id
    }

    /// Generation captured at submission.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns true while the target is alive.
    #[must_use]
    pub fn target_alive(&self) -> bool {
        self.target.strong_count() > 0
    }

    fn handle_count(&self) -> usize {
        1 + usize::from(self.stack.is_some())
    }
}

impl std::fmt::Debug for LoadRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadRequest")
            .field("target_alive", &self.target_alive())
            .field("has_stack", &self.stack.is_some())
            .field("scale_to_thumbnail", &self.scale_to_thumbnail)
            .field("cache_id", &self.cache_id)
            .field("add_to_thumb_cache", &self.add_to_thumb_cache)
            .field("is_local_file", &self.is_local_file)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

/// Counts weak-handle registrations held by unresolved requests.
#[derive(Debug, Default)]
pub struct TrackingRegistry {
    live: AtomicUsize,
    released: AtomicUsize,
}

impl TrackingRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers `handles` weak handles; they are released when the guard drops.
    #[must_use]
    pub fn register(self: &Arc<Self>, handles: usize) -> Registration {
        self.live.fetch_add(handles, Ordering::AcqRel);
        Registration {
            registry: self.clone(),
            handles,
        }
    }

    /// Handles currently registered.
    #[must_use]
    pub fn live(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    /// Handles released since creation.
    #[must_use]
    pub fn released(&self) -> usize {
        self.released.load(Ordering::Acquire)
    }
}

/// Guard for a request's weak-handle registrations.
#[derive(Debug)]
pub struct Registration {
    registry: Arc<TrackingRegistry>,
    handles: usize,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.live.fetch_sub(self.handles, Ordering::AcqRel);
        self.registry
            .released
            .fetch_add(self.handles, Ordering::AcqRel);
    }
}

/// A submitted request with its tracking installed.
/// Resolving consumes it, so cleanup happens exactly once.
#[derive(Debug)]
pub(crate) struct TrackedRequest {
    request: LoadRequest,
    _registration: Registration,
}

impl TrackedRequest {
    pub(crate) fn new(request: LoadRequest, registry: &Arc<TrackingRegistry>) -> Self {
        let registration = registry.register(request.handle_count());
        Self {
            request,
            _registration: registration,
        }
    }

    pub(crate) const fn request(&self) -> &LoadRequest {
        &self.request
    }

    pub(crate) fn target_alive(&self) -> bool {
        self.request.target_alive()
    }

    /// Hands `image` to the target if it is still alive, then releases tracking.
    pub(crate) fn deliver(mut self, image: &Bitmap) -> LoadOutcome {
        let outcome = match self.request.target.upgrade() {
            Some(target) => {
                target.set_image(image.clone());
                if let Some(stack) = self.request.stack.as_ref().and_then(Weak::upgrade) {
                    stack.show_picture();
                }
                LoadOutcome::Delivered
            }
            None => LoadOutcome::Dropped(DropReason::TargetGone),
        };
        self.report(outcome);
        outcome
    }

    /// Releases tracking without touching the target.
    pub(crate) fn drop_with(mut self, reason: DropReason) -> LoadOutcome {
        let outcome = LoadOutcome::Dropped(reason);
        self.report(outcome);
        outcome
    }

    fn report(&mut self, outcome: LoadOutcome) {
        if let Some(tx) = self.request.on_resolved.take() {
            let _ = tx.send(outcome);
        }
    }
}

impl Drop for TrackedRequest {
    fn drop(&mut self) {
        self.report(LoadOutcome::Dropped(DropReason::Shutdown));
    }
}
