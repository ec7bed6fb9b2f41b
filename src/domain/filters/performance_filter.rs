//! Performance metric injection.

use anyhow::Result;
use time::OffsetDateTime;

use super::Filter;
use crate::domain::{AfterOutcome, BeforeOutcome, FilterArgs, Request, Response};

/// Request attribute holding the start timestamp (unix nanoseconds).
pub const START_ATTRIBUTE: &str = "performance.start_ns";

/// Body placeholder replaced with the elapsed time in seconds.
const ELAPSED_PLACEHOLDER: &str = "{elapsed_time}";

/// Stamps the request on the way in and reports elapsed time on the way out.
#[derive(Debug, Default)]
pub struct PerformanceFilter;

impl PerformanceFilter {
    pub fn new() -> Self {
        Self
    }

    fn now_nanos() -> i128 {
        OffsetDateTime::now_utc().unix_timestamp_nanos()
    }
}

impl Filter for PerformanceFilter {
    fn before(&self, request: &Request, _args: &FilterArgs) -> Result<BeforeOutcome> {
        let mut stamped = request.clone();
        stamped
            .attributes
            .insert(START_ATTRIBUTE.to_string(), Self::now_nanos().to_string());
        Ok(BeforeOutcome::Request(stamped))
    }

    fn after(
        &self,
        request: &Request,
        response: &Response,
        _args: &FilterArgs,
    ) -> Result<AfterOutcome> {
        let Some(start) = request
            .attributes
            .get(START_ATTRIBUTE)
            .and_then(|v| v.parse::<i128>().ok())
        else {
            return Ok(AfterOutcome::Keep);
        };

        let elapsed = (Self::now_nanos() - start).max(0) as f64 / 1_000_000_000.0;
        let elapsed = format!("{:.4}", elapsed);

        let mut updated = response.clone();
        updated.body = updated.body.replace(ELAPSED_PLACEHOLDER, &elapsed);
        updated.set_header("X-Elapsed-Time", elapsed);
        Ok(AfterOutcome::Replace(updated))
    }
}
