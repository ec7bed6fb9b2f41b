//! Full-page response cache.
//!
//! The store is shared by every instance the factory hands out, so a page
//! cached while serving one request is visible to the next. Concurrent
//! writers for the same key race and the last write wins; expired entries
//! are dropped lazily when they are next read.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use dashmap::DashMap;
use serde::Deserialize;
use tracing::debug;

use super::Filter;
use crate::domain::path_matcher::normalize_path;
use crate::domain::{AfterOutcome, BeforeOutcome, FilterArgs, Request, Response};

/// Header marking a response served from the cache.
pub const CACHE_HEADER: &str = "X-Page-Cache";

/// PageCache settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PageCacheSettings {
    /// Default time-to-live in seconds; `pagecache:<secs>` overrides it
    pub ttl_secs: u64,
}

impl Default for PageCacheSettings {
    fn default() -> Self {
        Self { ttl_secs: 60 }
    }
}

#[derive(Debug, Clone)]
struct CachedPage {
    response: Response,
    expires_at: Instant,
}

/// Process-wide page store.
#[derive(Debug, Default)]
pub struct PageCacheStore {
    pages: DashMap<String, CachedPage>,
}

impl PageCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self, key: &str) -> Option<Response> {
        let expired = match self.pages.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                return Some(entry.response.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            self.pages.remove(key);
        }
        None
    }

    fn put(&self, key: String, response: Response, ttl: Duration) {
        self.pages.insert(
            key,
            CachedPage {
                response,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn clear(&self) {
        self.pages.clear();
    }
}

/// Serves cached GET pages and stores fresh 200 responses.
pub struct PageCacheFilter {
    settings: PageCacheSettings,
    store: Arc<PageCacheStore>,
}

impl PageCacheFilter {
    pub fn new(settings: PageCacheSettings, store: Arc<PageCacheStore>) -> Self {
        Self { settings, store }
    }

    fn cacheable(request: &Request) -> bool {
        request.method.eq_ignore_ascii_case("GET")
    }

    fn key(request: &Request) -> String {
        normalize_path(&request.path)
    }

    fn ttl(&self, args: &FilterArgs) -> Result<Duration> {
        let secs = match args.first() {
            Some(arg) => arg
                .parse::<u64>()
                .with_context(|| format!("invalid page cache ttl '{}'", arg))?,
            None => self.settings.ttl_secs,
        };
        Ok(Duration::from_secs(secs))
    }
}

impl Filter for PageCacheFilter {
    fn before(&self, request: &Request, _args: &FilterArgs) -> Result<BeforeOutcome> {
        if !Self::cacheable(request) {
            return Ok(BeforeOutcome::Continue);
        }

        match self.store.get(&Self::key(request)) {
            Some(cached) => {
                debug!("page cache hit: {}", request.path);
                Ok(BeforeOutcome::Respond(cached.with_header(CACHE_HEADER, "HIT")))
            }
            None => Ok(BeforeOutcome::Continue),
        }
    }

    fn after(
        &self,
        request: &Request,
        response: &Response,
        args: &FilterArgs,
    ) -> Result<AfterOutcome> {
        if !Self::cacheable(request) || response.status != 200 || response.has_header(CACHE_HEADER)
        {
            return Ok(AfterOutcome::Keep);
        }

        let ttl = self.ttl(args)?;
        if ttl.is_zero() {
            return Ok(AfterOutcome::Keep);
        }

        self.store.put(Self::key(request), response.clone(), ttl);
        Ok(AfterOutcome::Keep)
    }
}
