//! Disposable backing services for integration tests.
//!
//! Every fixture starts a container through `testcontainers` and stops it
//! when dropped. Tests using them need a reachable Docker daemon.

pub mod endpoint;
pub mod error;
pub mod mysql;
pub mod redis;

pub use endpoint::Endpoint;
pub use error::{Result, TestInfraError};
pub use mysql::{MySqlServer, MysqlConfig};
pub use self::redis::RedisServer;
