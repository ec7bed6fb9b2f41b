//! Computes the ordered filter set for a request.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use super::filters::FilterRegistry;
use super::path_matcher::normalize_path;
use super::rules::{FilterRef, FilterRules, ResolvedFilterSet, RouteFilters};
use super::{PipelineError, RuleOrigin};

/// Where route-specific filters land relative to configured ones.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOrdering {
    /// globals, methods, paths, then route filters (closest to the handler)
    #[default]
    Standard,
    /// Legacy order: route filters lead both the before and the after list
    RouteFirst,
}

/// Knobs fixed when the resolver is built.
#[derive(Debug, Clone)]
pub struct ResolverOptions {
    pub ordering: FilterOrdering,
    /// Alias moved to the end of the after list whenever present
    pub pin_last_after: Option<String>,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            ordering: FilterOrdering::Standard,
            pin_last_after: Some("toolbar".to_string()),
        }
    }
}

/// Resolves filter sets from an immutable rule snapshot.
#[derive(Debug, Clone)]
pub struct RuleResolver {
    rules: Arc<FilterRules>,
    registry: Arc<FilterRegistry>,
    options: ResolverOptions,
}

/// Per-stage contributions before they are merged.
#[derive(Default)]
struct Stages<'a> {
    globals_before: Vec<&'a FilterRef>,
    globals_after: Vec<&'a FilterRef>,
    methods: Vec<&'a FilterRef>,
    paths_before: Vec<&'a FilterRef>,
    paths_after: Vec<&'a FilterRef>,
    route_before: Vec<&'a FilterRef>,
    route_after: Vec<&'a FilterRef>,
}

impl RuleResolver {
    /// Build a resolver, failing if any configured rule names an unknown alias
    /// or binds a filter to a side it does not implement.
    pub fn new(
        rules: Arc<FilterRules>,
        registry: Arc<FilterRegistry>,
        options: ResolverOptions,
    ) -> Result<Self, PipelineError> {
        for (filter, origin) in rules.references() {
            registry.resolve(&filter.alias, origin)?;
        }
        for (filter, origin, position) in rules.placements() {
            registry.check_position(&filter.alias, origin, position)?;
        }

        Ok(Self {
            rules,
            registry,
            options,
        })
    }

    pub fn registry(&self) -> &Arc<FilterRegistry> {
        &self.registry
    }

    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    /// Compute the filter set for `path` and `method`.
    ///
    /// `route` carries the filters attached to the matched route, if any.
    pub fn resolve(
        &self,
        path: &str,
        method: &str,
        route: &RouteFilters,
    ) -> Result<ResolvedFilterSet, PipelineError> {
        let path = normalize_path(path);
        let method = method.to_ascii_lowercase();

        let route_before: Vec<FilterRef> = route.before.iter().map(|s| FilterRef::parse(s)).collect();
        let route_after: Vec<FilterRef> = route.after.iter().map(|s| FilterRef::parse(s)).collect();
        for filter in route_before.iter().chain(route_after.iter()) {
            self.registry.resolve(&filter.alias, RuleOrigin::Route)?;
        }

        let mut stages = Stages::default();
        self.collect_globals(&path, &mut stages);
        self.collect_methods(&method, &mut stages);
        self.collect_paths(&path, &mut stages);
        stages.route_before = route_before.iter().collect();
        stages.route_after = route_after.iter().collect();

        let (before, after) = match self.options.ordering {
            FilterOrdering::Standard => Self::standard_order(&stages),
            FilterOrdering::RouteFirst => Self::route_first_order(&stages),
        };

        let mut resolved = ResolvedFilterSet::default();
        for filter in before {
            push_unique(&mut resolved.before, filter);
            register_arguments(&mut resolved.arguments, filter)?;
        }
        for filter in after {
            push_unique(&mut resolved.after, filter);
            register_arguments(&mut resolved.arguments, filter)?;
        }

        if let Some(pinned) = &self.options.pin_last_after {
            pin_last(&mut resolved.after, pinned);
        }

        debug!(
            "resolved filters: path={}, method={}, before={:?}, after={:?}",
            path, method, resolved.before, resolved.after
        );

        Ok(resolved)
    }

    fn collect_globals<'a>(&'a self, path: &str, stages: &mut Stages<'a>) {
        for rule in &self.rules.globals_before {
            if rule.except.matches_normalized(path) {
                debug!("global before filter '{}' excepted for {}", rule.filter.alias, path);
                continue;
            }
            stages.globals_before.push(&rule.filter);
        }
        for rule in &self.rules.globals_after {
            if rule.except.matches_normalized(path) {
                debug!("global after filter '{}' excepted for {}", rule.filter.alias, path);
                continue;
            }
            stages.globals_after.push(&rule.filter);
        }
    }

    fn collect_methods<'a>(&'a self, method: &str, stages: &mut Stages<'a>) {
        if let Some(filters) = self.rules.methods.get(method) {
            stages.methods.extend(filters.iter());
        }
    }

    fn collect_paths<'a>(&'a self, path: &str, stages: &mut Stages<'a>) {
        for rule in &self.rules.paths {
            if let Some(patterns) = &rule.before {
                if patterns.is_empty() || patterns.matches_normalized(path) {
                    stages.paths_before.push(&rule.filter);
                }
            }
            if let Some(patterns) = &rule.after {
                if patterns.is_empty() || patterns.matches_normalized(path) {
                    stages.paths_after.push(&rule.filter);
                }
            }
        }
    }

    fn standard_order<'a>(stages: &Stages<'a>) -> (Vec<&'a FilterRef>, Vec<&'a FilterRef>) {
        let before = stages
            .globals_before
            .iter()
            .chain(&stages.methods)
            .chain(&stages.paths_before)
            .chain(&stages.route_before)
            .copied()
            .collect();
        let after = stages
            .globals_after
            .iter()
            .chain(&stages.paths_after)
            .chain(&stages.route_after)
            .copied()
            .collect();
        (before, after)
    }

    fn route_first_order<'a>(stages: &Stages<'a>) -> (Vec<&'a FilterRef>, Vec<&'a FilterRef>) {
        let before = stages
            .route_before
            .iter()
            .chain(&stages.globals_before)
            .chain(&stages.methods)
            .chain(&stages.paths_before)
            .copied()
            .collect();
        let after = stages
            .route_after
            .iter()
            .chain(&stages.globals_after)
            .chain(&stages.paths_after)
            .copied()
            .collect();
        (before, after)
    }
}

fn push_unique(list: &mut Vec<String>, filter: &FilterRef) {
    if !list.iter().any(|alias| *alias == filter.alias) {
        list.push(filter.alias.clone());
    }
}

fn register_arguments(
    arguments: &mut BTreeMap<String, Vec<String>>,
    filter: &FilterRef,
) -> Result<(), PipelineError> {
    if filter.args.is_empty() {
        return Ok(());
    }

    match arguments.get(&filter.alias) {
        Some(existing) if *existing != filter.args => Err(PipelineError::ArgumentConflict {
            alias: filter.alias.clone(),
            existing: existing.join(","),
        }),
        Some(_) => Ok(()),
        None => {
            arguments.insert(filter.alias.clone(), filter.args.clone());
            Ok(())
        }
    }
}

fn pin_last(list: &mut Vec<String>, alias: &str) {
    if list.len() < 2 {
        return;
    }
    if let Some(idx) = list.iter().position(|a| a == alias) {
        let pinned = list.remove(idx);
        list.push(pinned);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::filters::Filter;
    use crate::domain::Position;

    struct Noop;
    impl Filter for Noop {}

    fn registry(aliases: &[&str]) -> Arc<FilterRegistry> {
        let mut registry = FilterRegistry::new();
        for alias in aliases {
            let implementation = format!("test::{}", alias);
            registry.register_filter(implementation.clone(), || Arc::new(Noop) as Arc<dyn Filter>);
            registry.register_alias(*alias, implementation).unwrap();
        }
        Arc::new(registry)
    }

    fn resolver(rules: FilterRules, aliases: &[&str]) -> RuleResolver {
        RuleResolver::new(Arc::new(rules), registry(aliases), ResolverOptions::default()).unwrap()
    }

    fn none() -> &'static [&'static str] {
        &[]
    }

    #[test]
    fn test_globals_then_methods_keep_declared_order() {
        let mut rules = FilterRules::new();
        rules.add_global(Position::Before, "a", none()).unwrap();
        rules.add_global(Position::Before, "b", none()).unwrap();
        rules.add_method("get", &["c"]);
        let resolver = resolver(rules, &["a", "b", "c"]);

        let set = resolver.resolve("home", "GET", &RouteFilters::none()).unwrap();
        assert_eq!(set.before, vec!["a", "b", "c"]);
        assert!(set.after.is_empty());
    }

    #[test]
    fn test_post_scenario() {
        let mut rules = FilterRules::new();
        rules.add_global(Position::Before, "csrf", none()).unwrap();
        rules.add_method("post", &["throttle"]);
        let resolver = resolver(rules, &["csrf", "throttle"]);

        let set = resolver.resolve("/submit", "POST", &RouteFilters::none()).unwrap();
        assert_eq!(set.before, vec!["csrf", "throttle"]);
        assert!(set.after.is_empty());

        let get = resolver.resolve("/submit", "GET", &RouteFilters::none()).unwrap();
        assert_eq!(get.before, vec!["csrf"]);
    }

    #[test]
    fn test_except_skips_global_for_matching_path_only() {
        let mut rules = FilterRules::new();
        rules.add_global(Position::Before, "auth", &["login"]).unwrap();
        let resolver = resolver(rules, &["auth"]);

        let login = resolver.resolve("login", "GET", &RouteFilters::none()).unwrap();
        assert!(login.before.is_empty());

        let other = resolver.resolve("dashboard", "GET", &RouteFilters::none()).unwrap();
        assert_eq!(other.before, vec!["auth"]);
    }

    #[test]
    fn test_except_with_wildcards() {
        for except in [&["admin/*"][..], &["admin/*", "foo/*"][..], &["*"][..]] {
            let mut rules = FilterRules::new();
            rules.add_global(Position::Before, "foo", except).unwrap();
            rules.add_global(Position::Before, "bar", none()).unwrap();
            rules.add_global(Position::After, "baz", none()).unwrap();
            let resolver = resolver(rules, &["foo", "bar", "baz"]);

            let set = resolver.resolve("admin/foo/bar", "GET", &RouteFilters::none()).unwrap();
            assert_eq!(set.before, vec!["bar"], "except {:?}", except);
            assert_eq!(set.after, vec!["baz"]);
        }
    }

    #[test]
    fn test_duplicate_alias_keeps_first_position() {
        let mut rules = FilterRules::new();
        rules.add_global(Position::Before, "csrf", none()).unwrap();
        rules.add_global(Position::Before, "log", none()).unwrap();
        rules.add_method("post", &["throttle", "csrf"]);
        let resolver = resolver(rules, &["csrf", "log", "throttle"]);

        let set = resolver.resolve("form", "POST", &RouteFilters::none()).unwrap();
        assert_eq!(set.before, vec!["csrf", "log", "throttle"]);
    }

    #[test]
    fn test_path_rules_match_by_segment() {
        let mut rules = FilterRules::new();
        rules
            .add_path_rule("honeypot", Some(&["form/*"][..]), None)
            .unwrap();
        let resolver = resolver(rules, &["honeypot"]);

        let hit = resolver.resolve("form/contact", "GET", &RouteFilters::none()).unwrap();
        assert_eq!(hit.before, vec!["honeypot"]);

        let miss = resolver.resolve("forms/contact", "GET", &RouteFilters::none()).unwrap();
        assert!(miss.before.is_empty());
    }

    #[test]
    fn test_path_rule_before_and_after_are_independent() {
        let mut rules = FilterRules::new();
        rules
            .add_path_rule("foo", Some(&["admin/*"][..]), Some(&["/users/*"][..]))
            .unwrap();
        let resolver = resolver(rules, &["foo"]);

        let admin = resolver.resolve("admin/foo/bar", "GET", &RouteFilters::none()).unwrap();
        assert_eq!(admin.before, vec!["foo"]);
        assert!(admin.after.is_empty());

        let users = resolver.resolve("users/foo/bar", "GET", &RouteFilters::none()).unwrap();
        assert!(users.before.is_empty());
        assert_eq!(users.after, vec!["foo"]);
    }

    #[test]
    fn test_path_rule_with_empty_globs_applies_everywhere() {
        let mut rules = FilterRules::new();
        rules.add_path_rule("audit", Some(none()), None).unwrap();
        let resolver = resolver(rules, &["audit"]);

        let set = resolver.resolve("anything", "GET", &RouteFilters::none()).unwrap();
        assert_eq!(set.before, vec!["audit"]);
    }

    #[test]
    fn test_combined_standard_order() {
        let mut rules = FilterRules::new();
        rules.add_global(Position::Before, "foog", &["admin/*"]).unwrap();
        rules.add_global(Position::Before, "barg", none()).unwrap();
        rules.add_global(Position::After, "bazg", none()).unwrap();
        rules.add_method("post", &["foo"]);
        rules.add_method("get", &["bar"]);
        rules
            .add_path_rule("foof", Some(&["admin/*"][..]), Some(&["/users/*"][..]))
            .unwrap();
        let resolver = resolver(rules, &["foog", "barg", "bazg", "foo", "bar", "foof", "routed"]);

        let route = RouteFilters {
            before: vec!["routed".to_string()],
            after: vec!["routed".to_string()],
        };
        let set = resolver.resolve("admin/foo/bar", "GET", &route).unwrap();
        assert_eq!(set.before, vec!["barg", "bar", "foof", "routed"]);
        assert_eq!(set.after, vec!["bazg", "routed"]);
    }

    #[test]
    fn test_route_first_order_leads_both_lists() {
        let mut rules = FilterRules::new();
        rules.add_global(Position::Before, "g", none()).unwrap();
        rules.add_global(Position::After, "ga", none()).unwrap();
        rules.add_method("get", &["m"]);
        rules
            .add_path_rule("p", Some(&["*"][..]), Some(&["*"][..]))
            .unwrap();
        let options = ResolverOptions {
            ordering: FilterOrdering::RouteFirst,
            pin_last_after: None,
        };
        let resolver = RuleResolver::new(
            Arc::new(rules),
            registry(&["g", "ga", "m", "p", "r"]),
            options,
        )
        .unwrap();

        let route = RouteFilters {
            before: vec!["r".to_string()],
            after: vec!["r".to_string()],
        };
        let set = resolver.resolve("page", "GET", &route).unwrap();
        assert_eq!(set.before, vec!["r", "g", "m", "p"]);
        assert_eq!(set.after, vec!["r", "ga", "p"]);
    }

    #[test]
    fn test_after_list_is_not_reversed() {
        let mut rules = FilterRules::new();
        rules.add_global(Position::Before, "a", none()).unwrap();
        rules.add_global(Position::Before, "b", none()).unwrap();
        rules.add_global(Position::After, "a", none()).unwrap();
        rules.add_global(Position::After, "b", none()).unwrap();
        let resolver = resolver(rules, &["a", "b"]);

        let set = resolver.resolve("x", "GET", &RouteFilters::none()).unwrap();
        assert_eq!(set.before, vec!["a", "b"]);
        assert_eq!(set.after, vec!["a", "b"]);
    }

    #[test]
    fn test_toolbar_is_pinned_last_in_after() {
        let mut rules = FilterRules::new();
        rules.add_global(Position::After, "toolbar", none()).unwrap();
        rules.add_global(Position::After, "bazg", none()).unwrap();
        rules.add_method("get", &["bar"]);
        rules
            .add_path_rule("foof", None, Some(&["admin/*"][..]))
            .unwrap();
        let resolver = resolver(rules, &["toolbar", "bazg", "bar", "foof"]);

        let set = resolver.resolve("admin/foo/bar", "GET", &RouteFilters::none()).unwrap();
        assert_eq!(set.before, vec!["bar"]);
        assert_eq!(set.after, vec!["bazg", "foof", "toolbar"]);
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        let mut rules = FilterRules::new();
        rules.add_global(Position::Before, "foo", &["Admin/*"]).unwrap();
        rules.add_global(Position::Before, "bar", none()).unwrap();
        rules
            .add_path_rule("frak", Some(&["Admin/*"][..]), Some(&["Admin/*"][..]))
            .unwrap();
        let resolver = resolver(rules, &["foo", "bar", "frak"]);

        let set = resolver.resolve("ADMIN/foo/bar", "get", &RouteFilters::none()).unwrap();
        assert_eq!(set.before, vec!["bar", "frak"]);
        assert_eq!(set.after, vec!["frak"]);
    }

    #[test]
    fn test_unknown_alias_fails_at_build_time() {
        let mut rules = FilterRules::new();
        rules.add_global(Position::Before, "csrf", none()).unwrap();
        rules.add_method("post", &["throttle"]);

        let err = RuleResolver::new(Arc::new(rules), registry(&["csrf"]), ResolverOptions::default())
            .unwrap_err();
        match err {
            PipelineError::UnknownFilterAlias { alias, origin } => {
                assert_eq!(alias, "throttle");
                assert_eq!(origin, RuleOrigin::Method);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unknown_route_alias_fails_resolution() {
        let resolver = resolver(FilterRules::new(), &["csrf"]);
        let route = RouteFilters {
            before: vec!["auth:admin".to_string()],
            after: Vec::new(),
        };
        let err = resolver.resolve("x", "GET", &route).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::UnknownFilterAlias { ref alias, origin: RuleOrigin::Route } if alias == "auth"
        ));
    }

    #[test]
    fn test_arguments_are_collected_and_conflicts_rejected() {
        let mut rules = FilterRules::new();
        rules
            .add_path_rule("role:admin,manager", Some(&["admin/*"][..]), Some(&["admin/*"][..]))
            .unwrap();
        let resolver = resolver(rules, &["role"]);

        let set = resolver.resolve("admin/users", "GET", &RouteFilters::none()).unwrap();
        assert_eq!(set.args("role"), ["admin", "manager"]);
        assert!(set.args("missing").is_empty());

        let route = RouteFilters {
            before: vec!["role:editor".to_string()],
            after: Vec::new(),
        };
        let err = resolver.resolve("admin/users", "GET", &route).unwrap_err();
        assert!(matches!(err, PipelineError::ArgumentConflict { .. }));
    }

    #[test]
    fn test_resolution_does_not_mutate_rules() {
        let mut rules = FilterRules::new();
        rules.add_global(Position::Before, "auth", &["login"]).unwrap();
        let resolver = resolver(rules, &["auth"]);

        let first = resolver.resolve("login", "GET", &RouteFilters::none()).unwrap();
        let second = resolver.resolve("home", "GET", &RouteFilters::none()).unwrap();
        let third = resolver.resolve("login", "GET", &RouteFilters::none()).unwrap();
        assert!(first.before.is_empty());
        assert_eq!(second.before, vec!["auth"]);
        assert_eq!(first, third);
    }

    #[test]
    fn test_filter_bound_to_unsupported_side_is_rejected() {
        struct AfterOnly;
        impl Filter for AfterOnly {
            fn supports(&self, position: Position) -> bool {
                position == Position::After
            }
        }

        let mut registry = FilterRegistry::new();
        registry.register_filter("test::Headers", || Arc::new(AfterOnly) as Arc<dyn Filter>);
        registry.register_alias("headers", "test::Headers").unwrap();
        let registry = Arc::new(registry);

        let mut rules = FilterRules::new();
        rules
            .add_path_rule("headers", Some(&["admin/*"][..]), None)
            .unwrap();
        let err = RuleResolver::new(Arc::new(rules), registry.clone(), ResolverOptions::default())
            .err()
            .unwrap();
        assert!(matches!(
            err,
            PipelineError::FilterContractViolation { position: Position::Before, .. }
        ));

        let mut rules = FilterRules::new();
        rules.add_global(Position::After, "headers", none()).unwrap();
        assert!(RuleResolver::new(Arc::new(rules), registry, ResolverOptions::default()).is_ok());
    }
}
