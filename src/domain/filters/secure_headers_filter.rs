//! Secure response header injection.

use std::collections::BTreeMap;

use anyhow::Result;
use serde::Deserialize;

use super::Filter;
use crate::domain::{AfterOutcome, FilterArgs, Position, Request, Response};

/// SecureHeaders settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SecureHeadersSettings {
    /// Headers added to every response that does not already set them
    pub headers: BTreeMap<String, String>,
}

impl Default for SecureHeadersSettings {
    fn default() -> Self {
        let headers = [
            ("X-Frame-Options", "SAMEORIGIN"),
            ("X-Content-Type-Options", "nosniff"),
            ("X-Download-Options", "noopen"),
            ("X-Permitted-Cross-Domain-Policies", "none"),
            ("Referrer-Policy", "same-origin"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self { headers }
    }
}

pub struct SecureHeadersFilter {
    settings: SecureHeadersSettings,
}

impl SecureHeadersFilter {
    pub fn new(settings: SecureHeadersSettings) -> Self {
        Self { settings }
    }
}

impl Filter for SecureHeadersFilter {
    fn after(
        &self,
        _request: &Request,
        response: &Response,
        _args: &FilterArgs,
    ) -> Result<AfterOutcome> {
        let missing: Vec<(&String, &String)> = self
            .settings
            .headers
            .iter()
            .filter(|(name, _)| !response.has_header(name))
            .collect();

        if missing.is_empty() {
            return Ok(AfterOutcome::Keep);
        }

        let mut updated = response.clone();
        for (name, value) in missing {
            updated.set_header(name, value.clone());
        }
        Ok(AfterOutcome::Replace(updated))
    }

    fn supports(&self, position: Position) -> bool {
        position == Position::After
    }
}
