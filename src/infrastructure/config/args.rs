use super::app_config::LogLevel;
use crate::domain::entities::CardId;
use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for the prefetch tool.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "cardart",
    version,
    about = "Prefetches card artwork into the deck builder's image cache",
    long_about = None
)]
pub struct CliArgs {
    /// Configuration file path.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log file path.
    #[arg(long, value_name = "PATH")]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Keep the image cache next to the executable.
    #[arg(long)]
    pub portable: bool,

    /// Image cache directory.
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Artwork URL template with an `{id}` placeholder.
    #[arg(long, value_name = "URL")]
    pub url_template: Option<String>,

    /// Maximum simultaneous downloads.
    #[arg(long)]
    pub max_concurrent: Option<usize>,

    /// Maximum simultaneous decodes.
    #[arg(long)]
    pub decode_workers: Option<usize>,

    /// Load deck slot thumbnails instead of full-size artwork.
    #[arg(long)]
    pub thumbnails: bool,

    /// Card ids to fetch.
    #[arg(value_name = "ID", required = true)]
    pub ids: Vec<CardId>,
}
