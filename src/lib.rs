//! Cardart - card artwork acquisition and caching for the deck builder.
//!
//! This crate supplies decoded artwork bitmaps to every UI surface of the deck
//! builder (search rows, deck slots, preview pane). It coordinates coalesced
//! network fetches, a bounded download gate, background decoding, a two-tier
//! memory cache and a persistent disk cache, with session-wide cancellation.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Domain layer containing entities, errors, and port definitions.
pub mod domain;
/// Infrastructure layer containing the image engine and configuration.
pub mod infrastructure;

/// Current version of the application.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name.
pub const NAME: &str = "cardart";
