//! Configuration data types.

use anyhow::Result;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::validation;
use crate::domain::filters::BuiltinSettings;
use crate::domain::{
    ExecutorOptions, FilterOrdering, FilterRules, PipelineError, Position, ResolverOptions,
    RouteFilterBinding, RouteFilters,
};

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Enable debug logging to file
    pub debug: bool,

    /// Path to log directory
    pub log_path: PathBuf,

    /// Resolver and executor behavior
    pub pipeline: PipelineConfig,

    /// Extra aliases (single implementation or composite)
    pub aliases: BTreeMap<String, AliasConfig>,

    /// Filters applied to every request
    pub globals: GlobalsConfig,

    /// Filters applied by HTTP method (before only)
    pub methods: BTreeMap<String, Vec<String>>,

    /// Filters applied by path glob
    pub filters: Vec<PathFilterConfig>,

    /// Static route table standing in for the application router
    pub routes: Vec<RouteConfig>,

    /// Built-in filter settings
    pub settings: BuiltinSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debug: false,
            log_path: default_log_path(),
            pipeline: PipelineConfig::default(),
            aliases: BTreeMap::new(),
            globals: GlobalsConfig::default(),
            methods: BTreeMap::new(),
            filters: Vec::new(),
            routes: Vec::new(),
            settings: BuiltinSettings::default(),
        }
    }
}

impl Config {
    /// Validate configuration and return errors if invalid.
    /// Delegates to the comprehensive validation module.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// Compile global, method and path rules.
    pub fn filter_rules(&self) -> Result<FilterRules, PipelineError> {
        let mut rules = FilterRules::new();

        for rule in &self.globals.before {
            rules.add_global(Position::Before, rule.alias(), rule.except())?;
        }
        for rule in &self.globals.after {
            rules.add_global(Position::After, rule.alias(), rule.except())?;
        }
        for (method, filters) in &self.methods {
            rules.add_method(method, filters);
        }
        for filter in &self.filters {
            rules.add_path_rule(
                &filter.alias,
                filter.before.as_deref(),
                filter.after.as_deref(),
            )?;
        }

        Ok(rules)
    }

    /// Compile the route table.
    pub fn route_bindings(&self) -> Result<Vec<RouteFilterBinding>, PipelineError> {
        self.routes
            .iter()
            .map(|route| {
                RouteFilterBinding::new(
                    &route.pattern,
                    &route.methods,
                    RouteFilters {
                        before: route.before.clone(),
                        after: route.after.clone(),
                    },
                )
            })
            .collect()
    }

    pub fn resolver_options(&self) -> ResolverOptions {
        let pinned = self.pipeline.pin_last_after.trim();
        ResolverOptions {
            ordering: self.pipeline.ordering,
            pin_last_after: (!pinned.is_empty()).then(|| pinned.to_string()),
        }
    }

    pub fn executor_options(&self) -> ExecutorOptions {
        ExecutorOptions {
            after_on_short_circuit: self.pipeline.after_on_short_circuit,
        }
    }
}

/// `[pipeline]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// `standard` or `route_first`
    pub ordering: FilterOrdering,

    /// Run after-filters on a short-circuit response
    pub after_on_short_circuit: bool,

    /// Alias always moved to the end of the after list (empty disables)
    pub pin_last_after: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ordering: FilterOrdering::Standard,
            after_on_short_circuit: true,
            pin_last_after: "toolbar".to_string(),
        }
    }
}

/// Alias target in `[aliases]`.
///
/// ```toml
/// [aliases]
/// verify = "filters::Csrf"
/// protect = ["honeypot", "csrf"]
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AliasConfig {
    Single(String),
    Composite(Vec<String>),
}

/// `[globals]` table.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GlobalsConfig {
    pub before: Vec<GlobalRuleConfig>,
    pub after: Vec<GlobalRuleConfig>,
}

/// A global rule: either a bare alias or an alias with `except` globs.
///
/// ```toml
/// [globals]
/// before = ["honeypot", { alias = "csrf", except = ["api/*"] }]
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum GlobalRuleConfig {
    Name(String),
    Rule {
        alias: String,
        #[serde(default)]
        except: Vec<String>,
    },
}

impl GlobalRuleConfig {
    pub fn alias(&self) -> &str {
        match self {
            GlobalRuleConfig::Name(alias) => alias,
            GlobalRuleConfig::Rule { alias, .. } => alias,
        }
    }

    pub fn except(&self) -> &[String] {
        match self {
            GlobalRuleConfig::Name(_) => &[],
            GlobalRuleConfig::Rule { except, .. } => except,
        }
    }
}

/// Path filter in `[[filters]]`.
///
/// Omitting `before` or `after` leaves that position alone; an empty list
/// applies the filter to every path.
#[derive(Debug, Clone, Deserialize)]
pub struct PathFilterConfig {
    pub alias: String,
    #[serde(default)]
    pub before: Option<Vec<String>>,
    #[serde(default)]
    pub after: Option<Vec<String>>,
}

/// Route in `[[routes]]`.
#[derive(Debug, Clone, Deserialize)]
pub struct RouteConfig {
    pub pattern: String,
    /// Methods this route answers; empty means any
    #[serde(default)]
    pub methods: Vec<String>,
    #[serde(default)]
    pub before: Vec<String>,
    #[serde(default)]
    pub after: Vec<String>,
}

/// Get default log path (relative to config directory).
/// This returns a placeholder; the actual path is set by ConfigService based on config file location.
pub fn default_log_path() -> PathBuf {
    default_log_path_for_config_dir(None)
}

/// Get log path based on config directory.
pub fn default_log_path_for_config_dir(config_dir: Option<&Path>) -> PathBuf {
    config_dir
        .map(|d| d.to_path_buf())
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config")
                .join("portcullis")
        })
        .join("logs")
}
