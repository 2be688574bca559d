use crate::shortcode::ShortCode;
use crate::strategy::Strategy;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// Identity of a link row, unique within the durable store.
pub type LinkId = u64;

/// A short code as stored, together with its selection strategy and
/// aggregate hit counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortCodeRecord {
    pub id: u64,
    pub code: ShortCode,
    pub total_hit: u64,
    pub strategy: Strategy,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// One candidate destination of a short code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub id: LinkId,
    /// The owning short code.
    pub code: ShortCode,
    /// Destination URL. Never changes after creation.
    pub original: String,
    pub total_hit: u64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Input for persisting a new short code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewShortCode {
    pub code: ShortCode,
    pub strategy: Strategy,
}
