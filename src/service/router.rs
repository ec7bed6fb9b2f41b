//! Static route table.
//!
//! Stands in for an application router: it only answers which filters the
//! first matching route carries.

use std::sync::Arc;

use crate::domain::filters::FilterRegistry;
use crate::domain::{
    FilterRef, PipelineError, Position, RouteFilterBinding, RouteFilters, RuleOrigin,
};

#[derive(Debug, Clone, Default)]
pub struct StaticRouter {
    bindings: Vec<RouteFilterBinding>,
}

impl StaticRouter {
    /// Build a router, rejecting routes that name unknown aliases or put a
    /// filter on a side it does not implement.
    pub fn new(
        bindings: Vec<RouteFilterBinding>,
        registry: &Arc<FilterRegistry>,
    ) -> Result<Self, PipelineError> {
        for binding in &bindings {
            let sides = [
                (&binding.filters.before, Position::Before),
                (&binding.filters.after, Position::After),
            ];
            for (specs, position) in sides {
                for spec in specs {
                    let filter = FilterRef::parse(spec);
                    registry.check_position(&filter.alias, RuleOrigin::Route, position)?;
                }
            }
        }
        Ok(Self { bindings })
    }

    /// Filters of the first route matching `path` and `method`.
    pub fn route_filters(&self, path: &str, method: &str) -> RouteFilters {
        self.bindings
            .iter()
            .find(|binding| binding.applies(path, method))
            .map(|binding| binding.filters.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
