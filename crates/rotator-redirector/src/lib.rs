//! Resolution engine.
//!
//! [`RedirectorService`] turns a short code into one of its destinations.
//! It reads through the fast cache, falls back to the durable store, and
//! pushes cache population and hit counting to the background task runner.
//!
//! # Example
//!
//! ```rust
//! use rotator_redirector::{Redirector, RedirectorService};
//! use rotator_cache::MokaLinkCache;
//! use rotator_core::ShortCode;
//! use rotator_storage::InMemoryRepository;
//! use rotator_tasks::{TaskRunner, TaskRunnerConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let tasks = TaskRunner::start(TaskRunnerConfig::default());
//! let service = RedirectorService::new(InMemoryRepository::new(), MokaLinkCache::new(), tasks);
//!
//! let code = ShortCode::new("abc123")?;
//! match service.resolve(&code).await {
//!     Ok(url) => println!("Redirect to: {url}"),
//!     Err(e) => println!("No redirect: {e}"),
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod redirector;
pub mod selection;
pub mod service;

pub use error::{RedirectorError, Result};
pub use redirector::Redirector;
pub use selection::select_link;
pub use service::{RedirectorConfig, RedirectorService, DEFAULT_RESOLVE_TIMEOUT};
