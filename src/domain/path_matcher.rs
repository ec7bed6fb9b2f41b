//! Route-glob matching for filter scoping.
//!
//! Globs are anchored and case-insensitive. `*` matches one or more
//! characters, and a trailing `/*` matches the prefix itself or anything
//! below it, so `admin/*` covers `admin` and `admin/users/5` but not
//! `administrator`.

use regex::Regex;

use super::error::PipelineError;

/// A compiled path glob.
#[derive(Debug, Clone)]
pub struct PathPattern {
    source: String,
    regex: Regex,
}

impl PathPattern {
    /// Compile a glob into an anchored regex.
    pub fn compile(pattern: &str) -> Result<Self, PipelineError> {
        let expr = glob_to_regex(&normalize_path(pattern));
        let regex = Regex::new(&expr).map_err(|source| PipelineError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;

        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    /// Match against a path; the path is normalized first.
    pub fn matches(&self, path: &str) -> bool {
        self.regex.is_match(&normalize_path(path))
    }

    /// Match against a path that has already been through [`normalize_path`].
    pub fn matches_normalized(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

/// An ordered list of globs; matches when any member does.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<PathPattern>,
}

impl PatternSet {
    pub fn compile<S: AsRef<str>>(patterns: &[S]) -> Result<Self, PipelineError> {
        let patterns = patterns
            .iter()
            .map(|p| PathPattern::compile(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// True when any glob matches. An empty set matches nothing.
    pub fn matches_normalized(&self, path: &str) -> bool {
        self.patterns.iter().any(|p| p.matches_normalized(path))
    }
}

/// Trim surrounding slashes and spaces and lowercase.
pub fn normalize_path(path: &str) -> String {
    path.trim_matches(|c| c == '/' || c == ' ').to_lowercase()
}

/// One-shot glob match.
pub fn matches(pattern: &str, path: &str) -> bool {
    PathPattern::compile(pattern)
        .map(|p| p.matches(path))
        .unwrap_or(false)
}

fn glob_to_regex(glob: &str) -> String {
    let (base, deep) = match glob.strip_suffix("/*") {
        Some(base) => (base, true),
        None => (glob, false),
    };

    let body = base
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".+");

    if deep {
        format!("^{}(?:/.+)?$", body)
    } else {
        format!("^{}$", body)
    }
}
