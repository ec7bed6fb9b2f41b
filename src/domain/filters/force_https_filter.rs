//! Forced HTTPS redirection filter.

use anyhow::Result;
use serde::Deserialize;

use super::Filter;
use crate::domain::{BeforeOutcome, FilterArgs, Position, Request, Response};

/// ForceHttps settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ForceHttpsSettings {
    /// Host used when the request carries no Host header
    pub default_host: String,

    /// Redirect status code
    pub status: u16,
}

impl Default for ForceHttpsSettings {
    fn default() -> Self {
        Self {
            default_host: "localhost".to_string(),
            status: 307,
        }
    }
}

/// Redirects plain-HTTP requests to their HTTPS equivalent.
pub struct ForceHttpsFilter {
    settings: ForceHttpsSettings,
}

impl ForceHttpsFilter {
    pub fn new(settings: ForceHttpsSettings) -> Self {
        Self { settings }
    }
}

impl Filter for ForceHttpsFilter {
    fn before(&self, request: &Request, _args: &FilterArgs) -> Result<BeforeOutcome> {
        if request.is_secure() {
            return Ok(BeforeOutcome::Continue);
        }

        let host = request
            .header("Host")
            .unwrap_or(&self.settings.default_host);
        let location = format!("https://{}/{}", host, request.path.trim_matches('/'));

        Ok(BeforeOutcome::Respond(Response::redirect(
            self.settings.status,
            location,
        )))
    }

    fn supports(&self, position: Position) -> bool {
        position == Position::Before
    }
}
