use crate::Generator;
use rotator_core::ShortCode;
use std::iter;
use typed_builder::TypedBuilder;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Length of the codes handed out in production.
pub const DEFAULT_CODE_LENGTH: usize = 10;

/// Draws codes uniformly from `[A-Za-z0-9]`.
///
/// At the default length there are 62^10 (about 8.4e17) codes, so
/// collisions are rare enough to be surfaced as write failures rather
/// than retried.
#[derive(Debug, Clone, TypedBuilder)]
pub struct RandomGenerator {
    #[builder(default = DEFAULT_CODE_LENGTH)]
    length: usize,
}

impl RandomGenerator {
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn length(&self) -> usize {
        self.length
    }
}

impl Default for RandomGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl Generator for RandomGenerator {
    type Output = ShortCode;

    fn generate(&self) -> ShortCode {
        let code: String = iter::repeat_with(|| {
            ALPHABET[rand::random_range(0..ALPHABET.len())] as char
        })
        .take(self.length)
        .collect();
        ShortCode::new_unchecked(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn default_codes_are_ten_alphanumerics() {
        let generator = RandomGenerator::new();
        for _ in 0..100 {
            let code = generator.generate();
            assert_eq!(code.as_str().len(), 10);
            assert!(code.as_str().chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn generated_codes_pass_validation() {
        let generator = RandomGenerator::new();
        let code = generator.generate();
        assert!(ShortCode::new(code.as_str()).is_ok());
    }

    #[test]
    fn custom_length() {
        let generator = RandomGenerator::builder().length(16).build();
        assert_eq!(generator.generate().as_str().len(), 16);
    }

    #[test]
    fn codes_do_not_repeat_in_practice() {
        let generator = RandomGenerator::new();
        let codes: HashSet<String> = (0..1000)
            .map(|_| generator.generate().to_string())
            .collect();
        assert_eq!(codes.len(), 1000);
    }
}
