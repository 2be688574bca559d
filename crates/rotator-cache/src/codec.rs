//! Flat hash-field encoding of the cached records.

use jiff::Timestamp;
use rotator_core::{CacheError, LinkRecord, ShortCode, ShortCodeRecord, Strategy};
use std::collections::HashMap;
use std::str::FromStr;

pub const FIELD_TOTAL_HIT: &str = "total_hit";
pub const FIELD_UPDATED_AT: &str = "updated_at";

pub fn short_code_fields(record: &ShortCodeRecord) -> Vec<(&'static str, String)> {
    vec![
        ("id", record.id.to_string()),
        ("code", record.code.to_string()),
        (FIELD_TOTAL_HIT, record.total_hit.to_string()),
        ("strategy", record.strategy.as_str().to_string()),
        ("created_at", record.created_at.to_string()),
        (FIELD_UPDATED_AT, record.updated_at.to_string()),
    ]
}

pub fn link_fields(link: &LinkRecord) -> Vec<(&'static str, String)> {
    vec![
        ("id", link.id.to_string()),
        ("shortcode", link.code.to_string()),
        ("original", link.original.clone()),
        (FIELD_TOTAL_HIT, link.total_hit.to_string()),
        ("created_at", link.created_at.to_string()),
        (FIELD_UPDATED_AT, link.updated_at.to_string()),
    ]
}

/// Decodes a short code hash. An empty hash is a miss.
pub fn short_code_from_fields(
    fields: &HashMap<String, String>,
) -> Result<Option<ShortCodeRecord>, CacheError> {
    if fields.is_empty() {
        return Ok(None);
    }

    Ok(Some(ShortCodeRecord {
        id: parse(fields, "id")?,
        code: ShortCode::new_unchecked(field(fields, "code")?),
        total_hit: parse(fields, FIELD_TOTAL_HIT)?,
        strategy: parse::<Strategy>(fields, "strategy")?,
        created_at: parse::<Timestamp>(fields, "created_at")?,
        updated_at: parse::<Timestamp>(fields, FIELD_UPDATED_AT)?,
    }))
}

/// Decodes a link hash. An empty hash (expired between scan and read) is
/// skipped by returning `None`.
pub fn link_from_fields(fields: &HashMap<String, String>) -> Result<Option<LinkRecord>, CacheError> {
    if fields.is_empty() {
        return Ok(None);
    }

    Ok(Some(LinkRecord {
        id: parse(fields, "id")?,
        code: ShortCode::new_unchecked(field(fields, "shortcode")?),
        original: field(fields, "original")?.to_string(),
        total_hit: parse(fields, FIELD_TOTAL_HIT)?,
        created_at: parse::<Timestamp>(fields, "created_at")?,
        updated_at: parse::<Timestamp>(fields, FIELD_UPDATED_AT)?,
    }))
}

fn field<'a>(fields: &'a HashMap<String, String>, name: &str) -> Result<&'a str, CacheError> {
    fields
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| CacheError::InvalidData(format!("missing field '{name}'")))
}

fn parse<T>(fields: &HashMap<String, String>, name: &str) -> Result<T, CacheError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = field(fields, name)?;
    raw.parse::<T>()
        .map_err(|e| CacheError::InvalidData(format!("field '{name}' = '{raw}': {e}")))
}
