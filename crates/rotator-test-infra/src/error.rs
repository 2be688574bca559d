use thiserror::Error;

/// Failures while bringing up or reaching a fixture container.
#[derive(Debug, Error)]
pub enum TestInfraError {
    #[error("fixture container failed: {0}")]
    Container(#[from] testcontainers::TestcontainersError),

    #[error("fixture redis unreachable: {0}")]
    Redis(#[from] redis::RedisError),
}

pub type Result<T, E = TestInfraError> = std::result::Result<T, E>;
