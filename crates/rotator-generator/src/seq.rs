use crate::Generator;
use rotator_core::ShortCode;
use std::sync::atomic::{AtomicU64, Ordering};

/// Deterministic generator producing `prefix000000`, `prefix000001`, ...
///
/// Unique within one instance only. Meant for tests and for reproducing
/// collisions on purpose: two generators with the same prefix hand out the
/// same codes.
#[derive(Debug)]
pub struct SeqGenerator {
    counter: AtomicU64,
    prefix: String,
}

impl Clone for SeqGenerator {
    fn clone(&self) -> Self {
        Self {
            counter: AtomicU64::new(self.counter.load(Ordering::SeqCst)),
            prefix: self.prefix.clone(),
        }
    }
}

impl SeqGenerator {
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self::with_offset(prefix, 0)
    }

    /// Starts counting from `offset` instead of zero.
    pub fn with_offset(prefix: impl Into<String>, offset: u64) -> Self {
        Self {
            counter: AtomicU64::new(offset),
            prefix: prefix.into(),
        }
    }
}

impl Generator for SeqGenerator {
    type Output = ShortCode;

    fn generate(&self) -> ShortCode {
        let count = self.counter.fetch_add(1, Ordering::SeqCst);
        ShortCode::new_unchecked(format!("{}{:06}", self.prefix, count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn produces_sequential_codes() {
        let generator = SeqGenerator::with_prefix("rt");

        assert_eq!(generator.generate().as_str(), "rt000000");
        assert_eq!(generator.generate().as_str(), "rt000001");
        assert_eq!(generator.generate().as_str(), "rt000002");
    }

    #[test]
    fn with_offset() {
        let generator = SeqGenerator::with_offset("rt", 1000);

        assert_eq!(generator.generate().as_str(), "rt001000");
        assert_eq!(generator.generate().as_str(), "rt001001");
    }

    #[test]
    fn clone_preserves_counter_state() {
        let generator = SeqGenerator::with_prefix("rt");
        generator.generate();
        generator.generate();

        let cloned = generator.clone();

        assert_eq!(generator.generate().as_str(), "rt000002");
        assert_eq!(cloned.generate().as_str(), "rt000002");
    }

    #[test]
    fn generator_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SeqGenerator>();
    }
}
