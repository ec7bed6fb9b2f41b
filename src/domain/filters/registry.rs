//! Alias registry and filter factory catalog.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::Filter;
use crate::domain::{PipelineError, Position, RuleOrigin};

/// Builds a fresh filter instance.
pub type FilterFactory = Arc<dyn Fn() -> Arc<dyn Filter> + Send + Sync>;

/// What an alias stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AliasTarget {
    /// A single implementation reference, e.g. `filters::Csrf`
    Single(String),
    /// An ordered list of other aliases (or implementation references)
    Composite(Vec<String>),
}

impl fmt::Display for AliasTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AliasTarget::Single(implementation) => f.write_str(implementation),
            AliasTarget::Composite(members) => write!(f, "[{}]", members.join(", ")),
        }
    }
}

/// Maps aliases to implementations and implementations to factories.
///
/// Built once at startup and shared read-only afterwards.
#[derive(Default, Clone)]
pub struct FilterRegistry {
    aliases: BTreeMap<String, AliasTarget>,
    factories: BTreeMap<String, FilterFactory>,
}

impl fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterRegistry")
            .field("aliases", &self.aliases)
            .field("implementations", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl FilterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make an implementation available under `implementation`.
    pub fn register_filter<F>(&mut self, implementation: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<dyn Filter> + Send + Sync + 'static,
    {
        self.factories.insert(implementation.into(), Arc::new(factory));
    }

    /// Bind `alias` to a single implementation.
    ///
    /// Re-registering the same binding is a no-op.
    pub fn register_alias(
        &mut self,
        alias: impl Into<String>,
        implementation: impl Into<String>,
    ) -> Result<(), PipelineError> {
        self.bind(alias.into(), AliasTarget::Single(implementation.into()))
    }

    /// Bind `alias` to an ordered list of other aliases.
    pub fn register_composite<S: Into<String>>(
        &mut self,
        alias: impl Into<String>,
        members: impl IntoIterator<Item = S>,
    ) -> Result<(), PipelineError> {
        let members = members.into_iter().map(Into::into).collect();
        self.bind(alias.into(), AliasTarget::Composite(members))
    }

    fn bind(&mut self, alias: String, target: AliasTarget) -> Result<(), PipelineError> {
        if let Some(existing) = self.aliases.get(&alias) {
            if *existing == target {
                return Ok(());
            }
            return Err(PipelineError::DuplicateAlias {
                alias,
                existing: existing.to_string(),
                requested: target.to_string(),
            });
        }

        self.aliases.insert(alias, target);
        Ok(())
    }

    /// True if `name` is an alias or a known implementation reference.
    pub fn contains(&self, name: &str) -> bool {
        self.aliases.contains_key(name) || self.factories.contains_key(name)
    }

    pub fn target(&self, alias: &str) -> Option<&AliasTarget> {
        self.aliases.get(alias)
    }

    pub fn aliases(&self) -> impl Iterator<Item = (&str, &AliasTarget)> {
        self.aliases.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Expand an alias into its implementation references, in order.
    ///
    /// Composite aliases are expanded recursively. A name that is not an
    /// alias but is a known implementation resolves to itself.
    pub fn resolve(&self, alias: &str, origin: RuleOrigin) -> Result<Vec<String>, PipelineError> {
        let mut out = Vec::new();
        let mut stack = Vec::new();
        self.expand(alias, origin, &mut stack, &mut out)?;
        Ok(out)
    }

    fn expand<'a>(
        &'a self,
        name: &'a str,
        origin: RuleOrigin,
        stack: &mut Vec<&'a str>,
        out: &mut Vec<String>,
    ) -> Result<(), PipelineError> {
        if stack.contains(&name) {
            let mut chain: Vec<&str> = stack.clone();
            chain.push(name);
            return Err(PipelineError::AliasCycle {
                alias: name.to_string(),
                chain: chain.join(" -> "),
            });
        }

        match self.aliases.get(name) {
            Some(AliasTarget::Single(implementation)) => {
                out.push(implementation.clone());
                Ok(())
            }
            Some(AliasTarget::Composite(members)) => {
                stack.push(name);
                for member in members {
                    self.expand(member, origin, stack, out)?;
                }
                stack.pop();
                Ok(())
            }
            None if self.factories.contains_key(name) => {
                out.push(name.to_string());
                Ok(())
            }
            None => Err(PipelineError::UnknownFilterAlias {
                alias: name.to_string(),
                origin,
            }),
        }
    }

    /// Build a new instance of an implementation.
    pub fn instantiate(&self, implementation: &str) -> Option<Arc<dyn Filter>> {
        self.factories.get(implementation).map(|factory| factory())
    }

    /// Check that everything `alias` expands to can run at `position`.
    pub fn check_position(
        &self,
        alias: &str,
        origin: RuleOrigin,
        position: Position,
    ) -> Result<(), PipelineError> {
        for implementation in self.resolve(alias, origin)? {
            let filter = self.instantiate(&implementation).ok_or_else(|| {
                PipelineError::UnknownImplementation {
                    alias: alias.to_string(),
                    implementation: implementation.clone(),
                }
            })?;
            if !filter.supports(position) {
                return Err(PipelineError::FilterContractViolation {
                    alias: alias.to_string(),
                    implementation,
                    position,
                });
            }
        }
        Ok(())
    }

    /// Check that every alias expands to implementations that exist.
    pub fn validate(&self) -> Result<(), PipelineError> {
        for alias in self.aliases.keys() {
            for implementation in self.resolve(alias, RuleOrigin::Global)? {
                if !self.factories.contains_key(&implementation) {
                    return Err(PipelineError::UnknownImplementation {
                        alias: alias.clone(),
                        implementation,
                    });
                }
            }
        }
        Ok(())
    }
}
