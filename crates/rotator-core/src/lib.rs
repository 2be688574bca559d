//! Core types and traits for the Rotator link service.
//!
//! This crate provides the domain records, the error taxonomy and the
//! store traits shared by the shortener (creation) and redirector
//! (resolution) engines.

pub mod cache;
pub mod error;
pub mod record;
pub mod repository;
pub mod shortcode;
pub mod shortener;
pub mod strategy;

pub use cache::LinkCache;
pub use error::{CacheError, CoreError, LockError, ShortenerError, StorageError};
pub use record::{LinkId, LinkRecord, NewShortCode, ShortCodeRecord};
pub use repository::Repository;
pub use shortcode::ShortCode;
pub use shortener::{ShortenParams, Shortener};
pub use strategy::Strategy;
