//! Built-in filter catalog.

use std::sync::Arc;

use serde::Deserialize;

use super::{
    CorsFilter, CorsSettings, CsrfFilter, CsrfSettings, Filter, FilterRegistry,
    ForceHttpsFilter, ForceHttpsSettings, HoneypotFilter, HoneypotSettings, PageCacheFilter,
    PageCacheSettings, PageCacheStore, PerformanceFilter, SecureHeadersFilter,
    SecureHeadersSettings,
};
use crate::domain::PipelineError;

pub const CSRF: &str = "filters::Csrf";
pub const HONEYPOT: &str = "filters::Honeypot";
pub const FORCE_HTTPS: &str = "filters::ForceHttps";
pub const SECURE_HEADERS: &str = "filters::SecureHeaders";
pub const PAGE_CACHE: &str = "filters::PageCache";
pub const PERFORMANCE: &str = "filters::PerformanceMetrics";
pub const CORS: &str = "filters::Cors";

/// Default alias bindings for the built-in filters.
pub const DEFAULT_ALIASES: [(&str, &str); 7] = [
    ("csrf", CSRF),
    ("honeypot", HONEYPOT),
    ("forcehttps", FORCE_HTTPS),
    ("secureheaders", SECURE_HEADERS),
    ("pagecache", PAGE_CACHE),
    ("performance", PERFORMANCE),
    ("cors", CORS),
];

/// Per-filter settings for the built-ins.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BuiltinSettings {
    pub csrf: CsrfSettings,
    pub honeypot: HoneypotSettings,
    pub force_https: ForceHttpsSettings,
    pub secure_headers: SecureHeadersSettings,
    pub page_cache: PageCacheSettings,
    pub cors: CorsSettings,
}

/// Register every built-in factory and its default alias.
///
/// `store` backs the page cache and outlives any single registry.
pub fn register_builtins(
    registry: &mut FilterRegistry,
    settings: &BuiltinSettings,
    store: Arc<PageCacheStore>,
) -> Result<(), PipelineError> {
    let csrf = settings.csrf.clone();
    registry.register_filter(CSRF, move || {
        Arc::new(CsrfFilter::new(csrf.clone())) as Arc<dyn Filter>
    });

    let honeypot = settings.honeypot.clone();
    registry.register_filter(HONEYPOT, move || {
        Arc::new(HoneypotFilter::new(honeypot.clone())) as Arc<dyn Filter>
    });

    let force_https = settings.force_https.clone();
    registry.register_filter(FORCE_HTTPS, move || {
        Arc::new(ForceHttpsFilter::new(force_https.clone())) as Arc<dyn Filter>
    });

    let secure_headers = settings.secure_headers.clone();
    registry.register_filter(SECURE_HEADERS, move || {
        Arc::new(SecureHeadersFilter::new(secure_headers.clone())) as Arc<dyn Filter>
    });

    let page_cache = settings.page_cache.clone();
    registry.register_filter(PAGE_CACHE, move || {
        Arc::new(PageCacheFilter::new(page_cache.clone(), store.clone())) as Arc<dyn Filter>
    });

    registry.register_filter(PERFORMANCE, || {
        Arc::new(PerformanceFilter::new()) as Arc<dyn Filter>
    });

    let cors = settings.cors.clone();
    registry.register_filter(CORS, move || {
        Arc::new(CorsFilter::new(cors.clone())) as Arc<dyn Filter>
    });

    for (alias, implementation) in DEFAULT_ALIASES {
        registry.register_alias(alias, implementation)?;
    }

    Ok(())
}
