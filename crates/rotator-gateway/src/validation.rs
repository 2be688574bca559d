use axum::http::Uri;
use thiserror::Error;

use crate::model::ShortenRequest;

pub const MIN_URL_LENGTH: usize = 5;
pub const MAX_URL_LENGTH: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("at least one url is required")]
    NoUrls,
    #[error("at most {max} urls are allowed, got {got}")]
    TooManyUrls { max: usize, got: usize },
    #[error("url #{index} must be between {} and {} characters", MIN_URL_LENGTH, MAX_URL_LENGTH)]
    UrlLength { index: usize },
    #[error("url #{index} is not a valid http(s) url")]
    MalformedUrl { index: usize },
    #[error("strategy is required")]
    MissingStrategy,
}

/// Checks a creation request before it reaches the engine.
///
/// The strategy only has to be present. Unknown names are accepted here
/// and normalized to round-robin by the engine.
pub fn validate_shorten_request(
    request: &ShortenRequest,
    max_urls: usize,
) -> Result<(), ValidationError> {
    if request.urls.is_empty() {
        return Err(ValidationError::NoUrls);
    }
    if request.urls.len() > max_urls {
        return Err(ValidationError::TooManyUrls {
            max: max_urls,
            got: request.urls.len(),
        });
    }

    for (index, url) in request.urls.iter().enumerate() {
        validate_url(index, url)?;
    }

    match request.strategy.as_deref().map(str::trim) {
        Some(strategy) if !strategy.is_empty() => Ok(()),
        _ => Err(ValidationError::MissingStrategy),
    }
}

fn validate_url(index: usize, url: &str) -> Result<(), ValidationError> {
    let length = url.chars().count();
    if !(MIN_URL_LENGTH..=MAX_URL_LENGTH).contains(&length) {
        return Err(ValidationError::UrlLength { index });
    }

    let uri: Uri = url
        .parse()
        .map_err(|_| ValidationError::MalformedUrl { index })?;

    let scheme_ok = matches!(uri.scheme_str(), Some("http" | "https"));
    let host_ok = uri.host().is_some_and(|host| !host.is_empty());
    if scheme_ok && host_ok {
        Ok(())
    } else {
        Err(ValidationError::MalformedUrl { index })
    }
}
