//! Creation engine.
//!
//! Turns a list of destinations into a stored short code. Core types are
//! re-exported from `rotator_core`.

pub mod service;

pub use rotator_core::{ShortenParams, Shortener, ShortenerError};
pub use service::{ShortenerConfig, ShortenerService, DEFAULT_SHORTEN_TIMEOUT};
