//! Engine configuration.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::model::TypeId;

use super::chain::Search;

/// Options recognized by the analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Chain lookup depth for release-method resolution.
    pub search: Search,

    /// Whether explicitly interface-qualified release methods are
    /// discoverable. Off by default: a release method unreachable by
    /// ordinary member lookup is not safely callable by external
    /// disposers.
    pub include_explicit_contracts: bool,

    /// Callee signatures treated as taking ownership of their
    /// arguments; values passed to one escape the current scope.
    pub ownership_sinks: Vec<String>,

    /// Types excluded from checking entirely.
    pub suppressions: HashSet<TypeId>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            search: Search::Recursive,
            include_explicit_contracts: false,
            ownership_sinks: Vec::new(),
            suppressions: HashSet::new(),
        }
    }
}

impl Config {
    /// Builder-style override of the search mode.
    pub fn with_search(mut self, search: Search) -> Self {
        self.search = search;
        self
    }

    pub fn with_explicit_contracts(mut self, include: bool) -> Self {
        self.include_explicit_contracts = include;
        self
    }

    pub fn with_ownership_sink(mut self, callee: impl Into<String>) -> Self {
        self.ownership_sinks.push(callee.into());
        self
    }

    pub fn with_suppression(mut self, ty: TypeId) -> Self {
        self.suppressions.insert(ty);
        self
    }

    /// Whether a callee signature transfers ownership.
    pub fn is_ownership_sink(&self, callee: &str) -> bool {
        self.ownership_sinks.iter().any(|s| s == callee)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_exclude_explicit_contracts() {
        let config = Config::default();
        assert!(!config.include_explicit_contracts);
        assert_eq!(config.search, Search::Recursive);
        assert!(!config.is_ownership_sink("Registry.add"));
    }

    #[test]
    fn builder_accumulates() {
        let config = Config::default()
            .with_search(Search::TopLevel)
            .with_ownership_sink("CompositeDisposable.add")
            .with_suppression(TypeId(3));

        assert_eq!(config.search, Search::TopLevel);
        assert!(config.is_ownership_sink("CompositeDisposable.add"));
        assert!(config.suppressions.contains(&TypeId(3)));
    }
}
