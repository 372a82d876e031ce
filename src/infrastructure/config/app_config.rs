//! Application configuration.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::entities::ThumbnailSize;
use crate::infrastructure::image::{
    CardArtSource, DEFAULT_URL_TEMPLATE, ImageServiceConfig, MAX_CONCURRENT, default_decode_workers,
};

pub(crate) const APP_QUALIFIER: &str = "";
pub(crate) const APP_ORGANIZATION: &str = "";
pub(crate) const APP_NAME: &str = "ygo-deck-builder";

/// Subdirectory of the program directory used in portable mode.
pub const PORTABLE_CACHE_DIR: &str = "img";
/// Subdirectory of the platform cache directory used when installed.
pub const INSTALLED_CACHE_DIR: &str = "images";

/// Log level configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl LogLevel {
    /// Converts to tracing level.
    #[must_use]
    pub const fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Application configuration, loaded from `config.toml` and overridden by CLI flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Configuration file path.
    #[serde(skip)]
    pub config: Option<PathBuf>,

    /// Log file path.
    #[serde(skip)]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Keep the image cache next to the executable.
    #[serde(default)]
    pub portable: bool,

    /// Explicit image cache directory; wins over `portable`.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// Artwork pipeline settings.
    #[serde(default)]
    pub image: ImageConfig,
}

/// Artwork pipeline settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageConfig {
    /// Artwork URL with an `{id}` placeholder.
    #[serde(default = "default_url_template")]
    pub url_template: String,

    /// Maximum simultaneous downloads.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Maximum simultaneous decodes. Defaults to available parallelism.
    #[serde(default)]
    pub decode_workers: Option<usize>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Deck slot thumbnail width.
    #[serde(default = "default_thumbnail_width")]
    pub thumbnail_width: u32,

    /// Deck slot thumbnail height.
    #[serde(default = "default_thumbnail_height")]
    pub thumbnail_height: u32,

    /// Entries kept per memory tier. Unbounded when absent.
    #[serde(default)]
    pub memory_cache_capacity: Option<usize>,
}

fn default_url_template() -> String {
    DEFAULT_URL_TEMPLATE.to_string()
}

const fn default_max_concurrent() -> usize {
    MAX_CONCURRENT
}

const fn default_request_timeout_secs() -> u64 {
    30
}

const fn default_thumbnail_width() -> u32 {
    ThumbnailSize::SLOT_WIDTH
}

const fn default_thumbnail_height() -> u32 {
    ThumbnailSize::SLOT_HEIGHT
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            url_template: default_url_template(),
            max_concurrent: default_max_concurrent(),
            decode_workers: None,
            request_timeout_secs: default_request_timeout_secs(),
            thumbnail_width: default_thumbnail_width(),
            thumbnail_height: default_thumbnail_height(),
            memory_cache_capacity: None,
        }
    }
}

impl ImageConfig {
    /// Request timeout as a duration.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Thumbnail size for deck slots.
    #[must_use]
    pub fn thumbnail(&self) -> ThumbnailSize {
        ThumbnailSize::new(self.thumbnail_width, self.thumbnail_height)
    }

    /// Builds the image service configuration rooted at `cache_dir`.
    #[must_use]
    pub fn to_service_config(&self, cache_dir: PathBuf) -> ImageServiceConfig {
        ImageServiceConfig {
            cache_dir,
            source: CardArtSource::new(self.url_template.clone()),
            max_concurrent: self.max_concurrent,
            decode_workers: self.decode_workers.unwrap_or_else(default_decode_workers),
            thumbnail: self.thumbnail(),
            memory_cache_capacity: self.memory_cache_capacity,
        }
    }
}

use super::args::CliArgs;

impl AppConfig {
    /// Merges CLI arguments into the configuration.
    pub fn merge_with_args(&mut self, args: &CliArgs) {
        if let Some(config_path) = &args.config {
            self.config = Some(config_path.clone());
        }
        if let Some(log_path) = &args.log_path {
            self.log_path = Some(log_path.clone());
        }
        if let Some(log_level) = args.log_level {
            self.log_level = log_level;
        }
        if args.portable {
            self.portable = true;
        }
        if let Some(cache_dir) = &args.cache_dir {
            self.cache_dir = Some(cache_dir.clone());
        }
        if let Some(url_template) = &args.url_template {
            self.image.url_template.clone_from(url_template);
        }
        if let Some(max_concurrent) = args.max_concurrent {
            self.image.max_concurrent = max_concurrent;
        }
        if let Some(decode_workers) = args.decode_workers {
            self.image.decode_workers = Some(decode_workers);
        }
    }

    /// Returns default config directory.
    #[must_use]
    pub fn default_config_dir() -> Option<PathBuf> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Returns default config file path.
    #[must_use]
    pub fn default_config_path() -> Option<PathBuf> {
        Self::default_config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Returns default log file path.
    #[must_use]
    pub fn default_log_path() -> Option<PathBuf> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.data_dir().join("cardart.log"))
    }

    /// Returns the platform cache directory used when installed.
    #[must_use]
    pub fn default_cache_dir() -> Option<PathBuf> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.cache_dir().join(INSTALLED_CACHE_DIR))
    }

    /// Returns the cache directory used in portable mode.
    #[must_use]
    pub fn portable_cache_dir() -> Option<PathBuf> {
        let exe = std::env::current_exe().ok()?;
        exe.parent().map(|dir| dir.join(PORTABLE_CACHE_DIR))
    }

    /// Returns effective config path.
    #[must_use]
    pub fn effective_config_path(&self) -> Option<PathBuf> {
        self.config.clone().or_else(Self::default_config_path)
    }

    /// Returns effective log path.
    #[must_use]
    pub fn effective_log_path(&self) -> Option<PathBuf> {
        self.log_path.clone().or_else(Self::default_log_path)
    }

    /// Returns the image cache directory: explicit, then portable, then installed.
    #[must_use]
    pub fn effective_cache_dir(&self) -> Option<PathBuf> {
        resolve_cache_dir(
            self.cache_dir.as_deref(),
            self.portable,
            Self::portable_cache_dir,
            Self::default_cache_dir,
        )
    }
}

fn resolve_cache_dir(
    explicit: Option<&Path>,
    portable: bool,
    portable_dir: impl FnOnce() -> Option<PathBuf>,
    installed_dir: impl FnOnce() -> Option<PathBuf>,
) -> Option<PathBuf> {
    if let Some(dir) = explicit {
        return Some(dir.to_path_buf());
    }
    if portable {
        portable_dir()
    } else {
        installed_dir()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config: None,
            log_path: None,
            log_level: LogLevel::Info,
            portable: false,
            cache_dir: None,
            image: ImageConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_parse_partial_config() {
        let toml_content = r#"
            log_level = "debug"
            portable = true

            [image]
            max_concurrent = 3
            memory_cache_capacity = 500
        "#;

        let config: AppConfig = toml::from_str(toml_content).expect("Failed to parse config");

        assert_eq!(config.log_level, LogLevel::Debug);
        assert!(config.portable);
        assert_eq!(config.image.max_concurrent, 3);
        assert_eq!(config.image.memory_cache_capacity, Some(500));
        assert_eq!(config.image.url_template, DEFAULT_URL_TEMPLATE);
        assert_eq!(config.image.thumbnail(), ThumbnailSize::default());
    }

    #[test]
    fn test_log_level_conversions() {
        assert_eq!(LogLevel::Warn.to_tracing_level(), tracing::Level::WARN);
        assert_eq!(LogLevel::default().to_tracing_level(), tracing::Level::INFO);
        assert_eq!(LogLevel::Trace.to_string(), "trace");
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();

        assert!(!config.portable);
        assert!(config.cache_dir.is_none());
        assert_eq!(config.image.max_concurrent, 6);
        assert_eq!(config.image.request_timeout(), Duration::from_secs(30));
        assert!(config.image.memory_cache_capacity.is_none());
    }

    #[test]
    fn test_default_config_survives_toml() {
        let content = toml::to_string_pretty(&AppConfig::default()).unwrap();
        let parsed: AppConfig = toml::from_str(&content).unwrap();
        assert_eq!(parsed.image, ImageConfig::default());
    }

    #[test]
    fn test_merge_with_args() {
        let args = CliArgs::parse_from([
            "cardart",
            "--portable",
            "--max-concurrent",
            "2",
            "--url-template",
            "http://localhost/{id}.jpg",
            "--log-level",
            "trace",
            "42",
        ]);
        let mut config = AppConfig::default();
        config.merge_with_args(&args);

        assert!(config.portable);
        assert_eq!(config.image.max_concurrent, 2);
        assert_eq!(config.image.url_template, "http://localhost/{id}.jpg");
        assert_eq!(config.log_level, LogLevel::Trace);
    }

    #[test]
    fn test_explicit_paths_win() {
        let mut config = AppConfig::default();
        config.config = Some(PathBuf::from("/etc/cardart.toml"));
        config.log_path = Some(PathBuf::from("/var/log/cardart.log"));
        config.cache_dir = Some(PathBuf::from("/srv/art"));
        config.portable = true;

        assert_eq!(config.effective_config_path(), Some(PathBuf::from("/etc/cardart.toml")));
        assert_eq!(config.effective_log_path(), Some(PathBuf::from("/var/log/cardart.log")));
        assert_eq!(config.effective_cache_dir(), Some(PathBuf::from("/srv/art")));
    }

    #[test]
    fn test_cache_dir_resolution_order() {
        let portable = || Some(PathBuf::from("/opt/deck/img"));
        let installed = || Some(PathBuf::from("/home/u/.cache/ygo-deck-builder/images"));

        assert_eq!(
            resolve_cache_dir(Some(Path::new("/tmp/art")), true, portable, installed),
            Some(PathBuf::from("/tmp/art"))
        );
        assert_eq!(
            resolve_cache_dir(None, true, portable, installed),
            Some(PathBuf::from("/opt/deck/img"))
        );
        assert_eq!(
            resolve_cache_dir(None, false, portable, installed),
            Some(PathBuf::from("/home/u/.cache/ygo-deck-builder/images"))
        );
    }

    #[test]
    fn test_service_config_uses_image_section() {
        let mut image = ImageConfig::default();
        image.decode_workers = Some(3);
        image.thumbnail_width = 34;

        let service = image.to_service_config(PathBuf::from("/tmp/art"));
        assert_eq!(service.decode_workers, 3);
        assert_eq!(service.thumbnail.width, 34);
        assert_eq!(service.source.template(), DEFAULT_URL_TEMPLATE);
    }
}
