//! Domain layer containing the filter pipeline.
//!
//! This module contains:
//! - Request/response data types and filter outcomes
//! - Path matcher for route globs
//! - Filter trait, registry and built-in filters
//! - Rule resolver and pipeline executor
//! - Logger with rotation

mod error;
pub mod filters;
pub mod logger;
pub mod path_matcher;
pub mod pipeline;
pub mod resolver;
pub mod rules;
mod types;

pub use error::PipelineError;
pub use types::{
    AfterOutcome, BeforeOutcome, FilterArgs, Position, Request, Response, RuleOrigin,
};

pub use pipeline::{BeforeResult, ExecutorOptions, FilterPlan, PipelineExecutor};
pub use resolver::{FilterOrdering, ResolverOptions, RuleResolver};
pub use rules::{FilterRef, FilterRules, ResolvedFilterSet, RouteFilterBinding, RouteFilters};
