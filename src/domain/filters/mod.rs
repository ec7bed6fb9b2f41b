//! Filter trait, registry and the built-in filters.

pub mod builtin;
mod cors_filter;
mod csrf_filter;
mod filter_trait;
mod force_https_filter;
mod honeypot_filter;
mod page_cache_filter;
mod performance_filter;
mod registry;
mod secure_headers_filter;

pub use builtin::{register_builtins, BuiltinSettings};
pub use cors_filter::{CorsFilter, CorsSettings};
pub use csrf_filter::{CsrfFilter, CsrfSettings};
pub use filter_trait::Filter;
pub use force_https_filter::{ForceHttpsFilter, ForceHttpsSettings};
pub use honeypot_filter::{HoneypotFilter, HoneypotSettings};
pub use page_cache_filter::{PageCacheFilter, PageCacheSettings, PageCacheStore, CACHE_HEADER};
pub use performance_filter::{PerformanceFilter, START_ATTRIBUTE};
pub use registry::{AliasTarget, FilterFactory, FilterRegistry};
pub use secure_headers_filter::{SecureHeadersFilter, SecureHeadersSettings};
