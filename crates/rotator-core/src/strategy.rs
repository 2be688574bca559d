use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

/// How a destination is picked among the links of a short code.
///
/// The strategy is normalized once at creation time, stored with the short
/// code and trusted on every resolution afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strategy {
    /// Least-used selection: always the link with the lowest hit count.
    ///
    /// Despite the name there is no rotating pointer. Rotation emerges from
    /// hit counts catching up with each other. The name and the `RR` tag are
    /// kept because stored records and API clients use them.
    #[serde(rename = "RR")]
    RoundRobin,
    /// Uniformly random choice over all links, regardless of hit counts.
    #[serde(rename = "RNDM")]
    Random,
}

impl Strategy {
    const ROUND_ROBIN_TAG: &'static str = "RR";
    const RANDOM_TAG: &'static str = "RNDM";

    /// Normalizes a user-supplied strategy name.
    ///
    /// Matching is case-insensitive. Anything unrecognized falls back to
    /// [`Strategy::RoundRobin`].
    pub fn from_name(name: &str) -> Self {
        if name.trim().eq_ignore_ascii_case(Self::RANDOM_TAG) {
            Strategy::Random
        } else {
            Strategy::RoundRobin
        }
    }

    /// Returns the tag persisted in both stores.
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::RoundRobin => Self::ROUND_ROBIN_TAG,
            Strategy::Random => Self::RANDOM_TAG,
        }
    }
}

impl Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strict parsing of a stored tag. Unknown tags are invalid data, never
/// silently defaulted.
impl FromStr for Strategy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            Self::ROUND_ROBIN_TAG => Ok(Strategy::RoundRobin),
            Self::RANDOM_TAG => Ok(Strategy::Random),
            other => Err(CoreError::InvalidStrategy(other.to_string())),
        }
    }
}
