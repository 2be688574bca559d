//! HTTP surface of the link rotator.
//!
//! The router exposes creation (`POST /api/v1/shorten`), resolution
//! (`GET /{code}`) and a health check. Handlers only parse, validate and
//! format; the engines behind [`AppState`] do the work.

pub mod app;
pub mod error;
pub mod handlers;
pub mod model;
pub mod state;
pub mod validation;

pub use app::App;
pub use error::{AppError, Result};
pub use state::AppState;
