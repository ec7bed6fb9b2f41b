//! Immutable filter rule snapshot.

use std::collections::BTreeMap;

use serde::Serialize;

use super::path_matcher::{PathPattern, PatternSet};
use super::{PipelineError, Position};

/// A filter reference with optional arguments, parsed from `alias:arg1,arg2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterRef {
    pub alias: String,
    pub args: Vec<String>,
}

impl FilterRef {
    pub fn parse(spec: &str) -> Self {
        match spec.split_once(':') {
            Some((alias, args)) => Self {
                alias: alias.trim().to_string(),
                args: args.split(',').map(|a| a.trim().to_string()).collect(),
            },
            None => Self {
                alias: spec.trim().to_string(),
                args: Vec::new(),
            },
        }
    }
}

/// A filter applied to every request unless the path is excepted.
#[derive(Debug, Clone)]
pub struct GlobalRule {
    pub filter: FilterRef,
    pub except: PatternSet,
}

/// A filter applied to paths matching its globs.
///
/// `None` means the rule does not contribute to that position; an empty
/// pattern set applies to every path.
#[derive(Debug, Clone)]
pub struct PathRule {
    pub filter: FilterRef,
    pub before: Option<PatternSet>,
    pub after: Option<PatternSet>,
}

/// Global, method and path rules. Built once and never mutated while
/// requests are being resolved.
#[derive(Debug, Clone, Default)]
pub struct FilterRules {
    pub(crate) globals_before: Vec<GlobalRule>,
    pub(crate) globals_after: Vec<GlobalRule>,
    pub(crate) methods: BTreeMap<String, Vec<FilterRef>>,
    pub(crate) paths: Vec<PathRule>,
}

impl FilterRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_global<S: AsRef<str>>(
        &mut self,
        position: Position,
        filter: &str,
        except: &[S],
    ) -> Result<&mut Self, PipelineError> {
        let rule = GlobalRule {
            filter: FilterRef::parse(filter),
            except: PatternSet::compile(except)?,
        };
        match position {
            Position::Before => self.globals_before.push(rule),
            Position::After => self.globals_after.push(rule),
        }
        Ok(self)
    }

    /// Method rules are keyed by lowercased method and only feed `before`.
    pub fn add_method<S: AsRef<str>>(&mut self, method: &str, filters: &[S]) -> &mut Self {
        self.methods
            .entry(method.to_ascii_lowercase())
            .or_default()
            .extend(filters.iter().map(|f| FilterRef::parse(f.as_ref())));
        self
    }

    pub fn add_path_rule<S: AsRef<str>>(
        &mut self,
        filter: &str,
        before: Option<&[S]>,
        after: Option<&[S]>,
    ) -> Result<&mut Self, PipelineError> {
        let before = before.map(PatternSet::compile).transpose()?;
        let after = after.map(PatternSet::compile).transpose()?;
        self.paths.push(PathRule {
            filter: FilterRef::parse(filter),
            before,
            after,
        });
        Ok(self)
    }

    /// Every rule's filter reference, for validation.
    pub(crate) fn references(&self) -> impl Iterator<Item = (&FilterRef, super::RuleOrigin)> {
        use super::RuleOrigin;

        let globals = self
            .globals_before
            .iter()
            .chain(self.globals_after.iter())
            .map(|r| (&r.filter, RuleOrigin::Global));
        let methods = self
            .methods
            .values()
            .flatten()
            .map(|f| (f, RuleOrigin::Method));
        let paths = self.paths.iter().map(|r| (&r.filter, RuleOrigin::Path));

        globals.chain(methods).chain(paths)
    }

    /// Every rule's filter reference with the side it is bound to.
    ///
    /// Method rules only feed the before list; a path rule appears once per
    /// side it sets.
    pub(crate) fn placements(
        &self,
    ) -> impl Iterator<Item = (&FilterRef, super::RuleOrigin, Position)> {
        use super::RuleOrigin;

        let globals = self
            .globals_before
            .iter()
            .map(|r| (&r.filter, RuleOrigin::Global, Position::Before))
            .chain(
                self.globals_after
                    .iter()
                    .map(|r| (&r.filter, RuleOrigin::Global, Position::After)),
            );
        let methods = self
            .methods
            .values()
            .flatten()
            .map(|f| (f, RuleOrigin::Method, Position::Before));
        let paths = self.paths.iter().flat_map(|r| {
            let before = r
                .before
                .as_ref()
                .map(|_| (&r.filter, RuleOrigin::Path, Position::Before));
            let after = r
                .after
                .as_ref()
                .map(|_| (&r.filter, RuleOrigin::Path, Position::After));
            before.into_iter().chain(after)
        });

        globals.chain(methods).chain(paths)
    }
}

/// Filters the router attached to the matched route.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteFilters {
    pub before: Vec<String>,
    pub after: Vec<String>,
}

impl RouteFilters {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.before.is_empty() && self.after.is_empty()
    }
}

/// A route glob with the filters it carries.
#[derive(Debug, Clone)]
pub struct RouteFilterBinding {
    pub pattern: PathPattern,
    /// Lowercased methods; empty means any method
    pub methods: Vec<String>,
    pub filters: RouteFilters,
}

impl RouteFilterBinding {
    pub fn new<S: AsRef<str>>(
        pattern: &str,
        methods: &[S],
        filters: RouteFilters,
    ) -> Result<Self, PipelineError> {
        Ok(Self {
            pattern: PathPattern::compile(pattern)?,
            methods: methods
                .iter()
                .map(|m| m.as_ref().to_ascii_lowercase())
                .collect(),
            filters,
        })
    }

    pub fn applies(&self, path: &str, method: &str) -> bool {
        let method_ok = self.methods.is_empty()
            || self.methods.iter().any(|m| m.eq_ignore_ascii_case(method));
        method_ok && self.pattern.matches(path)
    }
}

/// The filters to run for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolvedFilterSet {
    pub before: Vec<String>,
    pub after: Vec<String>,
    /// Arguments per alias, only for aliases that were given any
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub arguments: BTreeMap<String, Vec<String>>,
}

impl ResolvedFilterSet {
    pub fn list(&self, position: Position) -> &[String] {
        match position {
            Position::Before => &self.before,
            Position::After => &self.after,
        }
    }

    pub fn args(&self, alias: &str) -> &[String] {
        self.arguments.get(alias).map(Vec::as_slice).unwrap_or(&[])
    }
}
