use std::sync::Arc;

use clap::Parser;
use color_eyre::eyre::Result;
use futures_util::future::join_all;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use cardart::domain::{Bitmap, CardId, ImageTarget, ImageTier, LoadOutcome};
use cardart::infrastructure::config::ConfigError;
use cardart::infrastructure::{
    AppConfig, CliArgs, HttpTransport, ImageService, LoadRequest, StorageManager,
};

/// Records the size of the bitmap delivered for one card.
#[derive(Default)]
struct ArtTarget {
    size: Mutex<Option<(u32, u32)>>,
}

impl ImageTarget for ArtTarget {
    fn set_image(&self, image: Bitmap) {
        *self.size.lock() = Some((image.width(), image.height()));
    }
}

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string()));

    if let Some(log_path) = config.effective_log_path() {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .init();

        info!(path = %log_path.display(), "Logging initialized");
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    Ok(())
}

fn load_config(args: &CliArgs) -> Result<AppConfig> {
    let storage = StorageManager::new()?;
    let mut config = storage.load_config(args.config.as_deref())?;
    config.merge_with_args(args);
    Ok(config)
}

fn report(id: CardId, outcome: &str, size: Option<(u32, u32)>) {
    match size {
        Some((width, height)) => println!("{id}: {outcome} ({width}x{height})"),
        None => println!("{id}: {outcome}"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = CliArgs::parse();
    let config = load_config(&args)?;
    init_logging(&config)?;

    info!(version = cardart::VERSION, "Starting cardart");

    let cache_dir = config
        .effective_cache_dir()
        .ok_or(ConfigError::CacheDirNotFound)?;
    let transport = Arc::new(HttpTransport::new(config.image.request_timeout())?);
    let service = ImageService::new(config.image.to_service_config(cache_dir), transport).await?;

    let tier = if args.thumbnails {
        ImageTier::Thumbnail
    } else {
        ImageTier::FullSize
    };

    let mut pending = Vec::new();
    for &id in &args.ids {
        if let Some(image) = service.cached(id, tier).await {
            report(id, "cached", Some((image.width(), image.height())));
            continue;
        }

        let target = Arc::new(ArtTarget::default());
        let (tx, rx) = oneshot::channel();
        let request = if args.thumbnails {
            LoadRequest::for_slot(&target, id)
        } else {
            LoadRequest::new(&target).cache_as(id)
        };
        service.load_card_async(id, request.on_resolved(tx));
        pending.push((id, target, rx));
    }

    let outcomes = join_all(pending.iter_mut().map(|(_, _, rx)| rx)).await;
    let mut failed = 0usize;
    for ((id, target, _), outcome) in pending.iter().zip(outcomes) {
        match outcome {
            Ok(LoadOutcome::Delivered) => report(*id, "fetched", *target.size.lock()),
            Ok(LoadOutcome::Dropped(reason)) => {
                failed += 1;
                report(*id, &format!("not loaded ({reason:?})"), None);
            }
            Err(_) => {
                failed += 1;
                report(*id, "not loaded", None);
            }
        }
    }

    service.shutdown().await;

    let stats = service.stats();
    println!(
        "{} requested, {} fetched, {} failed, peak {} concurrent",
        args.ids.len(),
        stats.fetches_started,
        failed,
        stats.peak_active
    );
    println!("{}", service.memory_cache_stats());

    Ok(())
}
