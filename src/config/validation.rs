//! Configuration validation.

use anyhow::{bail, Result};

use super::types::AliasConfig;
use super::Config;
use crate::domain::path_matcher::PathPattern;
use crate::domain::FilterRef;

/// Validate configuration.
///
/// Covers shape problems only: alias resolution is checked when the
/// pipeline is built.
pub fn validate(config: &Config) -> Result<()> {
    // Validate log path
    if !config.log_path.as_os_str().is_empty() {
        // Path will be created if it doesn't exist, so just check it's valid
        if config.log_path.to_string_lossy().contains('\0') {
            bail!("Invalid log_path: contains null character");
        }
    }

    // Validate aliases
    for (name, target) in &config.aliases {
        if name.trim().is_empty() {
            bail!("aliases: alias name cannot be empty");
        }
        if name.contains(':') {
            bail!("aliases['{}']: alias name cannot contain ':'", name);
        }
        match target {
            AliasConfig::Single(implementation) if implementation.trim().is_empty() => {
                bail!("aliases['{}']: implementation cannot be empty", name);
            }
            AliasConfig::Composite(members) if members.is_empty() => {
                bail!("aliases['{}']: composite alias needs at least one member", name);
            }
            AliasConfig::Composite(members) => {
                for (j, member) in members.iter().enumerate() {
                    if member.trim().is_empty() {
                        bail!("aliases['{}']: member[{}] cannot be empty", name, j);
                    }
                }
            }
            AliasConfig::Single(_) => {}
        }
    }

    // Validate global rules
    for (section, rules) in [
        ("before", &config.globals.before),
        ("after", &config.globals.after),
    ] {
        for (i, rule) in rules.iter().enumerate() {
            check_filter_spec(&format!("globals.{}[{}]", section, i), rule.alias())?;
            for pattern in rule.except() {
                check_pattern(&format!("globals.{}[{}].except", section, i), pattern)?;
            }
        }
    }

    // Validate method rules
    for (method, filters) in &config.methods {
        if method.trim().is_empty() || !method.chars().all(|c| c.is_ascii_alphabetic()) {
            bail!("methods: invalid HTTP method '{}'", method);
        }
        for (i, filter) in filters.iter().enumerate() {
            check_filter_spec(&format!("methods.{}[{}]", method, i), filter)?;
        }
    }

    // Validate path filters
    for (i, filter) in config.filters.iter().enumerate() {
        let at = format!("filters[{}]", i);
        check_filter_spec(&at, &filter.alias)?;

        if filter.before.is_none() && filter.after.is_none() {
            bail!("{}: at least one of 'before' or 'after' must be set", at);
        }
        for pattern in filter.before.iter().chain(filter.after.iter()).flatten() {
            check_pattern(&at, pattern)?;
        }
    }

    // Validate routes
    for (i, route) in config.routes.iter().enumerate() {
        let at = format!("routes[{}]", i);
        check_pattern(&at, &route.pattern)?;
        for filter in route.before.iter().chain(route.after.iter()) {
            check_filter_spec(&at, filter)?;
        }
    }

    Ok(())
}

fn check_filter_spec(at: &str, spec: &str) -> Result<()> {
    let filter = FilterRef::parse(spec);
    if filter.alias.is_empty() {
        bail!("{}: filter alias cannot be empty", at);
    }
    if filter.args.iter().any(String::is_empty) {
        bail!("{}: empty argument in '{}'", at, spec);
    }
    Ok(())
}

fn check_pattern(at: &str, pattern: &str) -> Result<()> {
    if let Err(e) = PathPattern::compile(pattern) {
        bail!("{}: invalid path pattern '{}': {}", at, pattern, e);
    }
    Ok(())
}
