use rotator_core::{LinkId, ShortCode};

/// Default namespace for every key written by this crate.
pub const DEFAULT_KEY_PREFIX: &str = "rot:";

/// Key layout shared by the cache backends.
///
/// ```text
/// {prefix}code:{code}                         short code hash
/// {prefix}links:{code}:rotate-id:{id}         one hash per link
/// {prefix}lock:code:{code}                    short code counter lock
/// {prefix}lock:links:{code}:rotate-id:{id}    link counter lock
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpace {
    prefix: String,
}

impl KeySpace {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn short_code(&self, code: &ShortCode) -> String {
        format!("{}code:{}", self.prefix, code.as_str())
    }

    pub fn link(&self, code: &ShortCode, link_id: LinkId) -> String {
        format!("{}links:{}:rotate-id:{}", self.prefix, code.as_str(), link_id)
    }

    /// Glob matching every link of `code` and nothing else. The pattern is
    /// anchored on the `:rotate-id:` separator so `ab` never matches the
    /// links of `abc`.
    pub fn links_pattern(&self, code: &ShortCode) -> String {
        format!("{}links:{}:rotate-id:*", self.prefix, code.as_str())
    }

    pub fn short_code_lock(&self, code: &ShortCode) -> String {
        format!("{}lock:code:{}", self.prefix, code.as_str())
    }

    pub fn link_lock(&self, code: &ShortCode, link_id: LinkId) -> String {
        format!(
            "{}lock:links:{}:rotate-id:{}",
            self.prefix,
            code.as_str(),
            link_id
        )
    }
}

impl Default for KeySpace {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_PREFIX)
    }
}
