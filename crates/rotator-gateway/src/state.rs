use std::sync::Arc;

use rotator_core::Shortener;
use rotator_redirector::Redirector;

/// Default cap on destinations per creation request.
pub const DEFAULT_MAX_URLS_PER_REQUEST: usize = 100;

#[derive(Clone)]
pub struct AppState {
    shortener: Arc<dyn Shortener>,
    redirector: Arc<dyn Redirector>,
    base_url: String,
    max_urls: usize,
}

impl AppState {
    pub fn new(
        shortener: Arc<dyn Shortener>,
        redirector: Arc<dyn Redirector>,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            shortener,
            redirector,
            base_url: public_base_url.into(),
            max_urls: DEFAULT_MAX_URLS_PER_REQUEST,
        }
    }

    pub fn with_max_urls(mut self, max_urls: usize) -> Self {
        self.max_urls = max_urls;
        self
    }

    pub fn shortener(&self) -> &dyn Shortener {
        self.shortener.as_ref()
    }

    pub fn redirector(&self) -> &dyn Redirector {
        self.redirector.as_ref()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn max_urls(&self) -> usize {
        self.max_urls
    }
}
