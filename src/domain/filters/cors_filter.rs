//! Cross-origin resource sharing filter.

use anyhow::Result;
use serde::Deserialize;

use super::Filter;
use crate::domain::{AfterOutcome, BeforeOutcome, FilterArgs, Request, Response};

/// CORS settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CorsSettings {
    /// Allowed origins; `*` allows any origin
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<String>,
    pub allowed_headers: Vec<String>,
    pub exposed_headers: Vec<String>,
    pub supports_credentials: bool,
    /// Preflight cache lifetime in seconds
    pub max_age: u32,
}

impl Default for CorsSettings {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
            allowed_methods: ["GET", "POST", "PUT", "PATCH", "DELETE"]
                .into_iter()
                .map(String::from)
                .collect(),
            allowed_headers: Vec::new(),
            exposed_headers: Vec::new(),
            supports_credentials: false,
            max_age: 7200,
        }
    }
}

/// Answers preflight requests directly and decorates actual responses.
///
/// A preflight ends the pipeline with [`BeforeOutcome::TerminateWith`]: no
/// handler runs and no after-filter touches the answer.
pub struct CorsFilter {
    settings: CorsSettings,
}

impl CorsFilter {
    pub fn new(settings: CorsSettings) -> Self {
        Self { settings }
    }

    fn is_preflight(request: &Request) -> bool {
        request.method.eq_ignore_ascii_case("OPTIONS")
            && request.header("Origin").is_some()
            && request.header("Access-Control-Request-Method").is_some()
    }

    fn allows_any(&self) -> bool {
        self.settings.allowed_origins.iter().any(|o| o == "*")
    }

    fn is_allowed(&self, origin: &str) -> bool {
        self.allows_any()
            || self
                .settings
                .allowed_origins
                .iter()
                .any(|o| o.eq_ignore_ascii_case(origin))
    }

    /// Value for Access-Control-Allow-Origin. Credentials rule out `*`.
    fn allow_origin_value(&self, origin: &str) -> String {
        if self.allows_any() && !self.settings.supports_credentials {
            "*".to_string()
        } else {
            origin.to_string()
        }
    }

    fn preflight(&self, origin: &str) -> Response {
        let mut response = Response::new(204);
        if !self.is_allowed(origin) {
            return response;
        }

        response.set_header("Access-Control-Allow-Origin", self.allow_origin_value(origin));
        response.set_header(
            "Access-Control-Allow-Methods",
            self.settings.allowed_methods.join(", "),
        );
        if !self.settings.allowed_headers.is_empty() {
            response.set_header(
                "Access-Control-Allow-Headers",
                self.settings.allowed_headers.join(", "),
            );
        }
        if self.settings.supports_credentials {
            response.set_header("Access-Control-Allow-Credentials", "true");
        }
        response.set_header("Access-Control-Max-Age", self.settings.max_age.to_string());
        response.set_header("Vary", "Origin");
        response
    }
}

impl Filter for CorsFilter {
    fn before(&self, request: &Request, _args: &FilterArgs) -> Result<BeforeOutcome> {
        if !Self::is_preflight(request) {
            return Ok(BeforeOutcome::Continue);
        }

        let origin = request.header("Origin").unwrap_or_default();
        Ok(BeforeOutcome::TerminateWith(self.preflight(origin)))
    }

    fn after(
        &self,
        request: &Request,
        response: &Response,
        _args: &FilterArgs,
    ) -> Result<AfterOutcome> {
        let Some(origin) = request.header("Origin") else {
            return Ok(AfterOutcome::Keep);
        };
        if !self.is_allowed(origin) {
            return Ok(AfterOutcome::Keep);
        }

        let mut updated = response.clone();
        updated.set_header("Access-Control-Allow-Origin", self.allow_origin_value(origin));
        updated.set_header("Vary", "Origin");
        if !self.settings.exposed_headers.is_empty() {
            updated.set_header(
                "Access-Control-Expose-Headers",
                self.settings.exposed_headers.join(", "),
            );
        }
        if self.settings.supports_credentials {
            updated.set_header("Access-Control-Allow-Credentials", "true");
        }
        Ok(AfterOutcome::Replace(updated))
    }
}
