//! Filter trait definition.

use anyhow::Result;

use crate::domain::{AfterOutcome, BeforeOutcome, FilterArgs, Position, Request, Response};

/// A request/response interceptor.
///
/// Both hooks default to doing nothing. Filters that only make sense on one
/// side of the handler override [`Filter::supports`]; a rule placing them on
/// the other side fails when the pipeline is planned.
pub trait Filter: Send + Sync {
    /// Runs before the handler.
    fn before(&self, _request: &Request, _args: &FilterArgs) -> Result<BeforeOutcome> {
        Ok(BeforeOutcome::Continue)
    }

    /// Runs after the handler (or after a short-circuit response).
    fn after(
        &self,
        _request: &Request,
        _response: &Response,
        _args: &FilterArgs,
    ) -> Result<AfterOutcome> {
        Ok(AfterOutcome::Keep)
    }

    /// Whether this filter implements the given position.
    fn supports(&self, _position: Position) -> bool {
        true
    }
}
