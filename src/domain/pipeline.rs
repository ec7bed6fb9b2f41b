//! Runs resolved filter sets around a handler.

use std::fmt;
use std::sync::Arc;

use anyhow::Result as AnyResult;
use tracing::{debug, info};

use super::filters::{Filter, FilterRegistry};
use super::rules::ResolvedFilterSet;
use super::{AfterOutcome, BeforeOutcome, PipelineError, Position, Request, Response, RuleOrigin};

/// Executor behavior switches.
#[derive(Debug, Clone, Copy)]
pub struct ExecutorOptions {
    /// Whether a short-circuit response from a before-filter still goes
    /// through the after-filters. Terminal responses never do.
    pub after_on_short_circuit: bool,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            after_on_short_circuit: true,
        }
    }
}

/// One filter instance ready to run.
pub struct PlannedFilter {
    pub alias: String,
    pub implementation: String,
    pub args: Vec<String>,
    filter: Arc<dyn Filter>,
}

impl fmt::Debug for PlannedFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlannedFilter")
            .field("alias", &self.alias)
            .field("implementation", &self.implementation)
            .field("args", &self.args)
            .finish()
    }
}

/// Instantiated filters for one request, in execution order.
#[derive(Debug, Default)]
pub struct FilterPlan {
    pub before: Vec<PlannedFilter>,
    pub after: Vec<PlannedFilter>,
}

impl FilterPlan {
    /// Implementation references per position, for inspection.
    pub fn implementations(&self, position: Position) -> Vec<&str> {
        let list = match position {
            Position::Before => &self.before,
            Position::After => &self.after,
        };
        list.iter().map(|p| p.implementation.as_str()).collect()
    }
}

/// How the before phase ended.
#[derive(Debug, Clone, PartialEq)]
pub enum BeforeResult {
    /// All before-filters ran; hand this request to the handler
    Proceed(Request),
    /// A filter answered early; `request` is the working request at that point
    ShortCircuit {
        filter: String,
        request: Request,
        response: Response,
    },
    /// A filter ended the pipeline
    Terminate { filter: String, response: Response },
}

/// Instantiates and runs filters.
#[derive(Debug, Clone)]
pub struct PipelineExecutor {
    registry: Arc<FilterRegistry>,
    options: ExecutorOptions,
}

impl PipelineExecutor {
    pub fn new(registry: Arc<FilterRegistry>, options: ExecutorOptions) -> Self {
        Self { registry, options }
    }

    pub fn options(&self) -> ExecutorOptions {
        self.options
    }

    /// Expand aliases to implementations and instantiate them.
    ///
    /// An implementation reachable through several aliases runs once per
    /// position, at its first position.
    pub fn plan(&self, resolved: &ResolvedFilterSet) -> Result<FilterPlan, PipelineError> {
        Ok(FilterPlan {
            before: self.plan_position(resolved, Position::Before)?,
            after: self.plan_position(resolved, Position::After)?,
        })
    }

    fn plan_position(
        &self,
        resolved: &ResolvedFilterSet,
        position: Position,
    ) -> Result<Vec<PlannedFilter>, PipelineError> {
        let mut planned: Vec<PlannedFilter> = Vec::new();

        for alias in resolved.list(position) {
            for implementation in self.registry.resolve(alias, RuleOrigin::Resolved)? {
                if planned.iter().any(|p| p.implementation == implementation) {
                    continue;
                }

                let filter = self.registry.instantiate(&implementation).ok_or_else(|| {
                    PipelineError::UnknownImplementation {
                        alias: alias.clone(),
                        implementation: implementation.clone(),
                    }
                })?;

                if !filter.supports(position) {
                    return Err(PipelineError::FilterContractViolation {
                        alias: alias.clone(),
                        implementation,
                        position,
                    });
                }

                planned.push(PlannedFilter {
                    alias: alias.clone(),
                    implementation,
                    args: resolved.args(alias).to_vec(),
                    filter,
                });
            }
        }

        Ok(planned)
    }

    /// Run before-filters in order until one answers or ends the pipeline.
    pub fn run_before(
        &self,
        plan: &FilterPlan,
        request: Request,
    ) -> Result<BeforeResult, PipelineError> {
        let mut request = request;

        for planned in &plan.before {
            debug!("before filter: {}", planned.implementation);
            let outcome = planned
                .filter
                .before(&request, &planned.args)
                .map_err(|source| PipelineError::FilterFailed {
                    filter: planned.implementation.clone(),
                    position: Position::Before,
                    source,
                })?;

            match outcome {
                BeforeOutcome::Continue => {}
                BeforeOutcome::Request(updated) => request = updated,
                BeforeOutcome::Respond(response) => {
                    info!(
                        "short-circuit by {}: status={}",
                        planned.implementation, response.status
                    );
                    return Ok(BeforeResult::ShortCircuit {
                        filter: planned.implementation.clone(),
                        request,
                        response,
                    });
                }
                BeforeOutcome::TerminateWith(response) => {
                    info!(
                        "terminated by {}: status={}",
                        planned.implementation, response.status
                    );
                    return Ok(BeforeResult::Terminate {
                        filter: planned.implementation.clone(),
                        response,
                    });
                }
            }
        }

        Ok(BeforeResult::Proceed(request))
    }

    /// Run after-filters in order, threading the response through them.
    pub fn run_after(
        &self,
        plan: &FilterPlan,
        request: &Request,
        response: Response,
    ) -> Result<Response, PipelineError> {
        let mut response = response;

        for planned in &plan.after {
            debug!("after filter: {}", planned.implementation);
            let outcome = planned
                .filter
                .after(request, &response, &planned.args)
                .map_err(|source| PipelineError::FilterFailed {
                    filter: planned.implementation.clone(),
                    position: Position::After,
                    source,
                })?;

            if let AfterOutcome::Replace(updated) = outcome {
                response = updated;
            }
        }

        Ok(response)
    }

    /// Before-filters, handler, after-filters.
    pub fn execute<H>(
        &self,
        plan: &FilterPlan,
        request: Request,
        handler: H,
    ) -> Result<Response, PipelineError>
    where
        H: FnOnce(&Request) -> AnyResult<Response>,
    {
        match self.run_before(plan, request)? {
            BeforeResult::Proceed(request) => {
                let response = handler(&request).map_err(PipelineError::Handler)?;
                self.run_after(plan, &request, response)
            }
            BeforeResult::ShortCircuit {
                request, response, ..
            } => {
                if self.options.after_on_short_circuit {
                    self.run_after(plan, &request, response)
                } else {
                    Ok(response)
                }
            }
            BeforeResult::Terminate { response, .. } => Ok(response),
        }
    }
}
