//! CSRF token verification filter.

use anyhow::Result;
use serde::Deserialize;

use super::Filter;
use crate::domain::{BeforeOutcome, FilterArgs, Position, Request, Response};

/// Message returned when verification fails without a redirect.
const DEFAULT_CSRF_MESSAGE: &str = "The action you requested is not allowed.";

/// CSRF filter settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CsrfSettings {
    /// Form field carrying the token
    pub token_name: String,

    /// Header carrying the token for AJAX requests
    pub header_name: String,

    /// Cookie holding the expected token
    pub cookie_name: String,

    /// Redirect back to the referer instead of answering 403
    pub redirect: bool,
}

impl Default for CsrfSettings {
    fn default() -> Self {
        Self {
            token_name: "csrf_test_name".to_string(),
            header_name: "X-CSRF-TOKEN".to_string(),
            cookie_name: "csrf_cookie_name".to_string(),
            redirect: false,
        }
    }
}

/// Rejects state-changing requests whose token does not match the cookie.
///
/// Passing the `redirect` argument (`csrf:redirect`) forces redirect mode for
/// that rule.
pub struct CsrfFilter {
    settings: CsrfSettings,
}

impl CsrfFilter {
    pub fn new(settings: CsrfSettings) -> Self {
        Self { settings }
    }

    fn is_safe_method(method: &str) -> bool {
        matches!(
            method.to_ascii_uppercase().as_str(),
            "GET" | "HEAD" | "OPTIONS" | "TRACE"
        )
    }

    fn submitted_token<'a>(&self, request: &'a Request) -> Option<&'a str> {
        request
            .form
            .get(&self.settings.token_name)
            .map(String::as_str)
            .or_else(|| request.header(&self.settings.header_name))
    }

    fn reject(&self, request: &Request, args: &FilterArgs) -> Response {
        let redirect = self.settings.redirect || args.iter().any(|a| a == "redirect");
        if redirect {
            let back = request.header("Referer").unwrap_or("/");
            Response::redirect(303, back)
        } else {
            Response::new(403).with_body(DEFAULT_CSRF_MESSAGE)
        }
    }
}

/// Compares without stopping at the first differing byte.
fn tokens_match(submitted: &str, expected: &str) -> bool {
    submitted.len() == expected.len()
        && submitted
            .bytes()
            .zip(expected.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

impl Filter for CsrfFilter {
    fn before(&self, request: &Request, args: &FilterArgs) -> Result<BeforeOutcome> {
        if Self::is_safe_method(&request.method) {
            return Ok(BeforeOutcome::Continue);
        }

        let expected = request.cookies.get(&self.settings.cookie_name);
        let verified = match (self.submitted_token(request), expected) {
            (Some(token), Some(expected)) => !token.is_empty() && tokens_match(token, expected),
            _ => false,
        };

        if !verified {
            tracing::warn!(
                "CSRF verification failed: method={}, path={}",
                request.method,
                request.path
            );
            return Ok(BeforeOutcome::Respond(self.reject(request, args)));
        }

        // the token has served its purpose; keep it away from the handler
        let mut cleaned = request.clone();
        cleaned.form.remove(&self.settings.token_name);
        Ok(BeforeOutcome::Request(cleaned))
    }

    fn supports(&self, position: Position) -> bool {
        position == Position::Before
    }
}
