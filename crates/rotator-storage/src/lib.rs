//! Durable store implementations of [`rotator_core::Repository`].

pub mod faulty;
pub mod memory;
pub mod mysql;

pub use faulty::{FaultyRepository, RepositoryOp};
pub use memory::InMemoryRepository;
pub use mysql::MySqlRepository;
pub use rotator_core::repository::{Repository, Result};
pub use rotator_core::StorageError;
