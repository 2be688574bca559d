pub mod random;
pub mod seq;

pub use random::RandomGenerator;
pub use seq::SeqGenerator;

use rotator_core::ShortCode;

/// Trait for generating short codes.
///
/// Implementations are pure generators that don't interact with storage.
/// Uniqueness is finally enforced by the durable store: a colliding code
/// fails the write instead of overwriting.
pub trait Generator: Send + Sync + 'static {
    type Output: Into<ShortCode>;

    /// Generates a value that converts into a fresh short code.
    fn generate(&self) -> Self::Output;
}
