//! Fetch dispatch, per-URL coalescing and completion handling.
//!
//! Each URL is either idle (no entry) or fetching (an entry holding every
//! request waiting on it). The first request for a URL creates the entry and
//! either takes a download slot or queues; later requests join the entry.
//! When the fetch completes, all waiters resolve in one pass and the slot is
//! handed to the next queued fetch before the completion handler returns.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;
use reqwest::Url;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::domain::entities::{Bitmap, CardId, DropReason, LoadOutcome};
use crate::domain::errors::TransportError;
use crate::domain::ports::ImageTransport;

use super::decode_pool::{DecodeJob, DecodeOutcome, DecodeWorkerPool, DecodedImage};
use super::disk_cache::DiskCache;
use super::download_queue::{Admission, DownloadQueue};
use super::generation::GenerationCounter;
use super::memory_cache::CacheStore;
use super::request::TrackedRequest;

/// Requests waiting on one in-flight fetch.
struct PendingFetch {
    waiters: Vec<TrackedRequest>,
    is_local: bool,
}

#[derive(Debug, Default)]
struct Counters {
    fetches_started: AtomicU64,
    coalesced: AtomicU64,
    failed_fetches: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

/// Snapshot of coordinator activity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoordinatorStats {
    /// Fetches handed to the transport (or local file reader).
    pub fetches_started: u64,
    /// Requests that joined an existing fetch instead of starting one.
    pub coalesced: u64,
    /// Fetches that ended in a transport or locator error.
    pub failed_fetches: u64,
    /// Requests whose target received a bitmap.
    pub delivered: u64,
    /// Requests resolved without touching their target.
    pub dropped: u64,
    /// Fetches currently holding a slot.
    pub active: usize,
    /// Fetches waiting for a slot.
    pub queued: usize,
    /// Highest number of simultaneous fetches observed.
    pub peak_active: usize,
}

struct Shared {
    transport: Arc<dyn ImageTransport>,
    cache: Arc<CacheStore>,
    disk: Arc<DiskCache>,
    generation: Arc<GenerationCounter>,
    decoder: DecodeWorkerPool,
    queue: DownloadQueue,
    pending: Mutex<HashMap<String, PendingFetch>>,
    runtime: Handle,
    disk_writes: AtomicUsize,
    closed: AtomicBool,
    idle: Notify,
    counters: Counters,
}

/// Orchestrates fetches, coalescing, queue draining and cache population.
pub struct DownloadCoordinator {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for DownloadCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadCoordinator")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl DownloadCoordinator {
    /// Creates a coordinator. Fetch tasks are spawned on `runtime`.
    #[must_use]
    pub fn new(
        transport: Arc<dyn ImageTransport>,
        cache: Arc<CacheStore>,
        disk: Arc<DiskCache>,
        generation: Arc<GenerationCounter>,
        decoder: DecodeWorkerPool,
        queue: DownloadQueue,
        runtime: Handle,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                transport,
                cache,
                disk,
                generation,
                decoder,
                queue,
                pending: Mutex::new(HashMap::new()),
                runtime,
                disk_writes: AtomicUsize::new(0),
                closed: AtomicBool::new(false),
                idle: Notify::new(),
                counters: Counters::default(),
            }),
        }
    }

    /// Adds `request` to the fetch for `url`, starting or queueing it if none is in flight.
    pub(crate) fn submit(&self, url: String, request: TrackedRequest) {
        let shared = &self.shared;
        if shared.closed.load(Ordering::Acquire) {
            shared.record(request.drop_with(DropReason::Shutdown));
            return;
        }

        {
            let mut pending = shared.pending.lock();
            if let Some(fetch) = pending.get_mut(&url) {
                fetch.waiters.push(request);
                shared.counters.coalesced.fetch_add(1, Ordering::Relaxed);
                debug!(url = %url, waiters = fetch.waiters.len(), "Joined in-flight fetch");
                return;
            }
            let is_local = request.request().is_local_file;
            pending.insert(
                url.clone(),
                PendingFetch {
                    waiters: vec![request],
                    is_local,
                },
            );
        }

        match shared.queue.admit(url.clone()) {
            Admission::Start => shared.spawn_fetch(url),
            Admission::Queued(position) => {
                debug!(url = %url, position, "Download slots busy, fetch queued");
            }
        }
    }

    /// Starts a new search session.
    /// Queued fetches whose waiters are all stale are discarded; in-flight
    /// fetches finish normally but no longer touch the UI.
    pub fn cancel_all_pending(&self) -> u64 {
        let shared = &self.shared;
        let generation = shared.generation.bump();

        let mut discarded = Vec::new();
        {
            let mut pending = shared.pending.lock();
            let counter = &shared.generation;
            let removed = shared.queue.retain(|url| {
                let Some(fetch) = pending.get_mut(url) else {
                    return false;
                };
                let (stale, fresh): (Vec<_>, Vec<_>) = fetch
                    .waiters
                    .drain(..)
                    .partition(|w| counter.is_stale(w.request().generation()));
                discarded.extend(stale);
                fetch.waiters = fresh;
                !fetch.waiters.is_empty()
            });
            for url in &removed {
                pending.remove(url);
            }
        }

        let count = discarded.len();
        for waiter in discarded {
            shared.record(waiter.drop_with(DropReason::Stale));
        }
        debug!(generation, discarded = count, "Cancelled pending artwork loads");
        shared.idle.notify_waiters();
        generation
    }

    /// Refuses new work, discards everything queued and waits for in-flight work to settle.
    pub async fn shutdown(&self) {
        let shared = &self.shared;
        shared.closed.store(true, Ordering::Release);
        self.cancel_all_pending();

        let drained = shared.queue.drain();
        let waiters: Vec<TrackedRequest> = {
            let mut pending = shared.pending.lock();
            drained
                .iter()
                .filter_map(|url| pending.remove(url))
                .flat_map(|fetch| fetch.waiters)
                .collect()
        };
        for waiter in waiters {
            shared.record(waiter.drop_with(DropReason::Shutdown));
        }
        shared.idle.notify_waiters();

        self.wait_idle().await;
        info!("Download coordinator shut down");
    }

    /// Resolves once nothing is active, queued, pending or being written to disk.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.shared.idle.notified();
            if self.shared.is_idle() {
                return;
            }
            notified.await;
        }
    }

    /// Returns true if no work is outstanding.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.shared.is_idle()
    }

    /// Returns true once shut down.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Number of distinct URLs currently fetching or queued.
    #[must_use]
    pub fn pending_urls(&self) -> usize {
        self.shared.pending.lock().len()
    }

    /// Returns activity counters.
    #[must_use]
    pub fn stats(&self) -> CoordinatorStats {
        let shared = &self.shared;
        let c = &shared.counters;
        CoordinatorStats {
            fetches_started: c.fetches_started.load(Ordering::Relaxed),
            coalesced: c.coalesced.load(Ordering::Relaxed),
            failed_fetches: c.failed_fetches.load(Ordering::Relaxed),
            delivered: c.delivered.load(Ordering::Relaxed),
            dropped: c.dropped.load(Ordering::Relaxed),
            active: shared.queue.active(),
            queued: shared.queue.queued(),
            peak_active: shared.queue.peak_active(),
        }
    }
}

impl Shared {
    fn is_idle(&self) -> bool {
        self.queue.active() == 0
            && self.queue.queued() == 0
            && self.pending.lock().is_empty()
            && self.disk_writes.load(Ordering::Acquire) == 0
    }

    fn record(&self, outcome: LoadOutcome) {
        let counter = if outcome.is_delivered() {
            &self.counters.delivered
        } else {
            &self.counters.dropped
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn spawn_fetch(self: &Arc<Self>, url: String) {
        self.counters.fetches_started.fetch_add(1, Ordering::Relaxed);
        let shared = Arc::clone(self);
        self.runtime.spawn(async move {
            shared.run_fetch(url).await;
        });
    }

    async fn run_fetch(self: Arc<Self>, url: String) {
        let is_local = self.pending.lock().get(&url).is_some_and(|f| f.is_local);

        let (bytes, mut decoded) = match self.acquire(&url, is_local).await {
            Ok(bytes) => {
                let job = self.decode_job(&url, bytes.clone());
                let outcome = self.decoder.decode(job).await;
                (Some(bytes), outcome)
            }
            Err(e) => {
                self.counters.failed_fetches.fetch_add(1, Ordering::Relaxed);
                if e.is_cancellation() {
                    debug!(url = %url, "Artwork fetch cancelled");
                } else {
                    warn!(url = %url, error = %e, "Artwork fetch failed");
                }
                (None, DecodeOutcome::Failed)
            }
        };

        let waiters = self
            .pending
            .lock()
            .remove(&url)
            .map(|fetch| fetch.waiters)
            .unwrap_or_default();

        // A fresh request may have joined after the decode was skipped.
        if let Some(bytes) = bytes.filter(|_| matches!(decoded, DecodeOutcome::Stale)) {
            let job = job_for(&waiters, bytes);
            if job.keep_when_stale || !self.generation.is_stale(job.generation) {
                decoded = self.decoder.decode(job).await;
            }
        }

        // A thumbnail waiter may have joined after a full-size-only decode.
        let decoded = match decoded.into_image() {
            Some(image) if image.thumbnail.is_none() && waiters.iter().any(wants_thumbnail) => {
                Some(self.decoder.add_thumbnail(image).await)
            }
            other => other,
        };

        self.resolve(&url, waiters, decoded);
        self.finish_slot();
    }

    async fn acquire(&self, locator: &str, is_local: bool) -> Result<Bytes, TransportError> {
        if is_local {
            debug!(path = %locator, "Reading local artwork");
            return tokio::fs::read(locator)
                .await
                .map(Bytes::from)
                .map_err(|e| TransportError::LocalFile {
                    message: format!("{locator}: {e}"),
                });
        }

        let url = Url::parse(locator)
            .map_err(|e| TransportError::invalid_url(locator, e.to_string()))?;
        debug!(url = %url, "Downloading artwork");
        self.transport.get(&url).await
    }

    fn decode_job(&self, url: &str, bytes: Bytes) -> DecodeJob {
        let pending = self.pending.lock();
        let waiters = pending.get(url).map_or(&[][..], |f| f.waiters.as_slice());
        job_for(waiters, bytes)
    }

    fn resolve(self: &Arc<Self>, url: &str, waiters: Vec<TrackedRequest>, decoded: Option<DecodedImage>) {
        let Some(decoded) = decoded else {
            for waiter in waiters {
                let reason = if self.generation.is_stale(waiter.request().generation()) {
                    DropReason::Stale
                } else {
                    DropReason::Failed
                };
                self.record(waiter.drop_with(reason));
            }
            return;
        };

        self.populate_caches(&waiters, &decoded);

        let total = waiters.len();
        let mut delivered = 0usize;
        for waiter in waiters {
            let outcome = if self.generation.is_stale(waiter.request().generation()) {
                waiter.drop_with(DropReason::Stale)
            } else {
                let thumbnail = waiter.request().scale_to_thumbnail;
                waiter.deliver(decoded.rendition(thumbnail))
            };
            if outcome.is_delivered() {
                delivered += 1;
            }
            self.record(outcome);
        }
        debug!(url = %url, waiters = total, delivered, "Artwork fetch resolved");
    }

    /// Writes the decoded bitmap to every tier the waiters asked for, stale or not.
    fn populate_caches(self: &Arc<Self>, waiters: &[TrackedRequest], decoded: &DecodedImage) {
        let mut persisted: HashSet<CardId> = HashSet::new();
        for waiter in waiters {
            let request = waiter.request();
            let Some(id) = request.cache_id else {
                continue;
            };
            if request.add_to_thumb_cache
                && let Some(thumbnail) = &decoded.thumbnail
            {
                self.cache.put_thumb(id, thumbnail.clone());
            }
            if persisted.insert(id) {
                self.cache.put_fullsize(id, decoded.full.clone());
                self.spawn_disk_write(id, decoded.full.clone());
            }
        }
    }

    fn spawn_disk_write(self: &Arc<Self>, id: CardId, image: Bitmap) {
        self.disk_writes.fetch_add(1, Ordering::AcqRel);
        let shared = Arc::clone(self);
        self.runtime.spawn(async move {
            shared.disk.save(id, &image).await;
            shared.disk_writes.fetch_sub(1, Ordering::AcqRel);
            shared.idle.notify_waiters();
        });
    }

    /// Releases the finished fetch's slot and starts queued fetches while slots are free.
    fn finish_slot(self: &Arc<Self>) {
        self.queue.release();
        while let Some(url) = self.queue.next_ready() {
            if self.discard_abandoned(&url) {
                self.queue.release();
                continue;
            }
            self.spawn_fetch(url);
        }
        self.idle.notify_waiters();
    }

    /// Drops a queued fetch whose every target has been destroyed.
    fn discard_abandoned(&self, url: &str) -> bool {
        let waiters = {
            let mut pending = self.pending.lock();
            let abandoned = pending
                .get(url)
                .is_none_or(|fetch| fetch.waiters.iter().all(|w| !w.target_alive()));
            if !abandoned {
                return false;
            }
            pending.remove(url).map(|fetch| fetch.waiters).unwrap_or_default()
        };

        debug!(url = %url, waiters = waiters.len(), "Skipping queued fetch, targets destroyed");
        for waiter in waiters {
            self.record(waiter.drop_with(DropReason::TargetGone));
        }
        true
    }
}

fn job_for(waiters: &[TrackedRequest], bytes: Bytes) -> DecodeJob {
    DecodeJob {
        bytes,
        generation: waiters
            .iter()
            .map(|w| w.request().generation())
            .max()
            .unwrap_or_default(),
        keep_when_stale: waiters.iter().any(|w| w.request().cache_id.is_some()),
        want_thumbnail: waiters.iter().any(wants_thumbnail),
    }
}

fn wants_thumbnail(waiter: &TrackedRequest) -> bool {
    let request = waiter.request();
    request.scale_to_thumbnail || request.add_to_thumb_cache
}
