//! Error types for the filter pipeline.

use thiserror::Error;

use super::types::{Position, RuleOrigin};

/// Errors raised while building or running a filter pipeline.
///
/// Everything except `FilterFailed` and `Handler` is a configuration or
/// programming error and is reported when the pipeline is built or a request
/// is first resolved.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A rule references an alias that is not registered
    #[error("no filter alias '{alias}' is registered (referenced by {origin} rules)")]
    UnknownFilterAlias { alias: String, origin: RuleOrigin },

    /// An alias was registered twice with different targets
    #[error("filter alias '{alias}' is already bound to '{existing}', cannot rebind to '{requested}'")]
    DuplicateAlias {
        alias: String,
        existing: String,
        requested: String,
    },

    /// An alias points at an implementation nothing provides
    #[error("filter alias '{alias}' points at unknown implementation '{implementation}'")]
    UnknownImplementation {
        alias: String,
        implementation: String,
    },

    /// A filter was placed in a position it does not implement
    #[error("filter '{implementation}' (alias '{alias}') does not support the {position} position")]
    FilterContractViolation {
        alias: String,
        implementation: String,
        position: Position,
    },

    /// A composite alias expands back into itself
    #[error("composite filter alias '{alias}' expands into itself via {chain}")]
    AliasCycle { alias: String, chain: String },

    /// Two rules gave the same alias different arguments
    #[error("filter '{alias}' already has arguments: {existing}")]
    ArgumentConflict { alias: String, existing: String },

    /// A path glob could not be compiled
    #[error("invalid path pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A filter returned an error from `before` or `after`
    #[error("filter '{filter}' failed in {position}: {source}")]
    FilterFailed {
        filter: String,
        position: Position,
        #[source]
        source: anyhow::Error,
    },

    /// The request handler returned an error
    #[error("handler failed: {0}")]
    Handler(#[source] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_alias_names_alias_and_origin() {
        let err = PipelineError::UnknownFilterAlias {
            alias: "throttle".to_string(),
            origin: RuleOrigin::Method,
        };
        assert_eq!(
            err.to_string(),
            "no filter alias 'throttle' is registered (referenced by method rules)"
        );
    }

    #[test]
    fn test_contract_violation_message() {
        let err = PipelineError::FilterContractViolation {
            alias: "csrf".to_string(),
            implementation: "filters::Csrf".to_string(),
            position: Position::After,
        };
        assert_eq!(
            err.to_string(),
            "filter 'filters::Csrf' (alias 'csrf') does not support the after position"
        );
    }

    #[test]
    fn test_filter_failure_keeps_source() {
        let err = PipelineError::FilterFailed {
            filter: "filters::Honeypot".to_string(),
            position: Position::Before,
            source: anyhow::anyhow!("bot detected"),
        };
        assert!(err.to_string().ends_with("bot detected"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
