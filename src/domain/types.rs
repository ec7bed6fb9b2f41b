//! Core domain types for requests, responses and filter outcomes.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Incoming request as seen by the filters.
///
/// Header names are compared case-insensitively; use [`Request::header`]
/// rather than indexing `headers` directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Request {
    /// HTTP method, e.g. "GET"
    pub method: String,

    /// Path relative to the site root, e.g. "admin/users/5"
    pub path: String,

    /// "http" or "https"
    pub scheme: String,

    pub headers: BTreeMap<String, String>,

    pub cookies: BTreeMap<String, String>,

    /// Decoded form fields
    pub form: BTreeMap<String, String>,

    pub body: String,

    /// Scratch values filters hand to later filters and the handler
    pub attributes: BTreeMap<String, String>,
}

impl Default for Request {
    fn default() -> Self {
        Self {
            method: "GET".to_string(),
            path: String::new(),
            scheme: "http".to_string(),
            headers: BTreeMap::new(),
            cookies: BTreeMap::new(),
            form: BTreeMap::new(),
            body: String::new(),
            attributes: BTreeMap::new(),
        }
    }
}

impl Request {
    /// Create a request for the given method and path.
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    pub fn with_form_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.form.insert(name.into(), value.into());
        self
    }

    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    /// Look up a header case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        lookup_header(&self.headers, name)
    }

    /// Lowercased method, the form used for method rule keys.
    pub fn method_key(&self) -> String {
        self.method.to_ascii_lowercase()
    }

    pub fn is_secure(&self) -> bool {
        self.scheme.eq_ignore_ascii_case("https")
    }
}

/// Outgoing response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Response {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl Default for Response {
    fn default() -> Self {
        Self {
            status: 200,
            headers: BTreeMap::new(),
            body: String::new(),
        }
    }
}

impl Response {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            ..Self::default()
        }
    }

    /// Redirect to `location` with the given status.
    pub fn redirect(status: u16, location: impl Into<String>) -> Self {
        Self::new(status).with_header("Location", location)
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Set a header, replacing any value stored under another casing.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|k, _| !k.eq_ignore_ascii_case(name));
        self.headers.insert(name.to_string(), value.into());
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        lookup_header(&self.headers, name)
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.header(name).is_some()
    }

    pub fn is_html(&self) -> bool {
        self.header("Content-Type")
            .map(|ct| ct.to_ascii_lowercase().starts_with("text/html"))
            .unwrap_or(false)
    }
}

fn lookup_header<'a>(headers: &'a BTreeMap<String, String>, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Which side of the handler a filter runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    Before,
    After,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Position::Before => f.write_str("before"),
            Position::After => f.write_str("after"),
        }
    }
}

/// Where a filter reference came from, for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleOrigin {
    Global,
    Method,
    Path,
    Route,
    /// A hand-built or already-resolved filter set
    Resolved,
}

impl fmt::Display for RuleOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RuleOrigin::Global => "global",
            RuleOrigin::Method => "method",
            RuleOrigin::Path => "path",
            RuleOrigin::Route => "route",
            RuleOrigin::Resolved => "resolved-set",
        };
        f.write_str(name)
    }
}

/// Arguments attached to a filter reference (`alias:arg1,arg2`).
pub type FilterArgs = [String];

/// What a before-filter wants the pipeline to do next.
#[derive(Debug, Clone, PartialEq)]
pub enum BeforeOutcome {
    /// Pass the current request on unchanged
    Continue,
    /// Replace the working request for the filters that follow
    Request(Request),
    /// Short-circuit: skip the remaining before-filters and the handler
    Respond(Response),
    /// End the pipeline outright; after-filters never see this response
    TerminateWith(Response),
}

/// What an after-filter wants the pipeline to do with the response.
#[derive(Debug, Clone, PartialEq)]
pub enum AfterOutcome {
    Keep,
    Replace(Response),
}
