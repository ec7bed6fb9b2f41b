//! Configured, hot-reloadable filter pipeline.

use std::sync::Arc;

use anyhow::{Context, Result};
use arc_swap::ArcSwap;
use tracing::{debug, info};

use super::router::StaticRouter;
use crate::config::{AliasConfig, Config};
use crate::domain::filters::{register_builtins, FilterRegistry, PageCacheStore};
use crate::domain::{
    PipelineError, PipelineExecutor, Request, ResolvedFilterSet, Response, RouteFilters,
    RuleResolver,
};

/// Everything built from one configuration.
///
/// Immutable once built; a reload replaces it wholesale.
pub struct PipelineSnapshot {
    pub registry: Arc<FilterRegistry>,
    pub resolver: RuleResolver,
    pub executor: PipelineExecutor,
    pub router: StaticRouter,
}

impl PipelineSnapshot {
    /// Build a snapshot, failing on the first configuration error.
    pub fn build(config: &Config, store: Arc<PageCacheStore>) -> Result<Self> {
        let mut registry = FilterRegistry::new();
        register_builtins(&mut registry, &config.settings, store)?;

        for (alias, target) in &config.aliases {
            match target {
                AliasConfig::Single(implementation) => {
                    registry.register_alias(alias, implementation)?
                }
                AliasConfig::Composite(members) => {
                    registry.register_composite(alias, members.iter().cloned())?
                }
            }
        }
        registry.validate()?;
        let registry = Arc::new(registry);

        let rules = Arc::new(config.filter_rules()?);
        let resolver = RuleResolver::new(rules, registry.clone(), config.resolver_options())?;
        let executor = PipelineExecutor::new(registry.clone(), config.executor_options());
        let router = StaticRouter::new(config.route_bindings()?, &registry)?;

        debug!(
            "pipeline snapshot built: aliases={}, routes={}",
            registry.aliases().count(),
            router.len()
        );

        Ok(Self {
            registry,
            resolver,
            executor,
            router,
        })
    }

    pub fn resolve(&self, path: &str, method: &str) -> Result<ResolvedFilterSet, PipelineError> {
        let route = self.router.route_filters(path, method);
        self.resolver.resolve(path, method, &route)
    }

    /// Full lifecycle with route filters taken from the static router.
    pub fn handle<H>(&self, request: Request, handler: H) -> Result<Response, PipelineError>
    where
        H: FnOnce(&Request) -> Result<Response>,
    {
        let route = self.router.route_filters(&request.path, &request.method);
        self.handle_route(request, &route, handler)
    }

    /// Full lifecycle with route filters supplied by an external router.
    pub fn handle_route<H>(
        &self,
        request: Request,
        route: &RouteFilters,
        handler: H,
    ) -> Result<Response, PipelineError>
    where
        H: FnOnce(&Request) -> Result<Response>,
    {
        let resolved = self
            .resolver
            .resolve(&request.path, &request.method, route)?;
        let plan = self.executor.plan(&resolved)?;
        self.executor.execute(&plan, request, handler)
    }
}

/// Shared entry point: resolves and runs filters against the current
/// configuration snapshot.
///
/// Reads are lock-free; [`FilterPipeline::reload`] swaps in a new snapshot
/// and requests already running keep the one they loaded.
pub struct FilterPipeline {
    snapshot: ArcSwap<PipelineSnapshot>,
    page_cache: Arc<PageCacheStore>,
}

impl FilterPipeline {
    pub fn new(config: &Config) -> Result<Self> {
        let page_cache = Arc::new(PageCacheStore::new());
        let snapshot = PipelineSnapshot::build(config, page_cache.clone())
            .context("Failed to build filter pipeline")?;

        Ok(Self {
            snapshot: ArcSwap::from_pointee(snapshot),
            page_cache,
        })
    }

    /// Replace the configuration. On error the current snapshot stays.
    pub fn reload(&self, config: &Config) -> Result<()> {
        let snapshot = PipelineSnapshot::build(config, self.page_cache.clone())
            .context("Failed to rebuild filter pipeline")?;
        self.snapshot.store(Arc::new(snapshot));
        info!("filter pipeline reloaded");
        Ok(())
    }

    /// The snapshot new requests will use.
    pub fn snapshot(&self) -> Arc<PipelineSnapshot> {
        self.snapshot.load_full()
    }

    pub fn page_cache(&self) -> &Arc<PageCacheStore> {
        &self.page_cache
    }

    pub fn resolve(&self, path: &str, method: &str) -> Result<ResolvedFilterSet, PipelineError> {
        self.snapshot.load().resolve(path, method)
    }

    /// Run `request` through the before-filters, `handler` and after-filters.
    pub fn handle<H>(&self, request: Request, handler: H) -> Result<Response, PipelineError>
    where
        H: FnOnce(&Request) -> Result<Response>,
    {
        let snapshot = self.snapshot.load_full();
        debug!("handling request: {} {}", request.method, request.path);
        snapshot.handle(request, handler)
    }

    /// Like [`FilterPipeline::handle`], for callers that do their own routing.
    pub fn handle_route<H>(
        &self,
        request: Request,
        route: &RouteFilters,
        handler: H,
    ) -> Result<Response, PipelineError>
    where
        H: FnOnce(&Request) -> Result<Response>,
    {
        self.snapshot.load_full().handle_route(request, route, handler)
    }
}
