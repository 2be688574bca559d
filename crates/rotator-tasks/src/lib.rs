//! Bounded background task runner.
//!
//! Cache population and hit-count propagation run here, off the request
//! path. See [`TaskRunner`].

pub mod runner;

pub use runner::{
    RejectReason, Submission, TaskRunner, TaskRunnerConfig, DEFAULT_QUEUE_CAPACITY,
    DEFAULT_TASK_TIMEOUT, DEFAULT_WORKERS,
};
