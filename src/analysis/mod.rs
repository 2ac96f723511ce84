//! The analysis engine: classification, chain resolution, ownership
//! graphs, and path-sensitive release checking, tied together by
//! [`Analyzer`].

pub mod cache;
pub mod cancel;
pub mod chain;
pub mod classify;
pub mod config;
pub mod error;
pub mod ownership;
pub mod paths;
pub mod report;

use std::sync::Arc;

use crate::model::{MethodId, SemanticModel, TypeId};

pub use cache::ContractCache;
pub use cancel::CancelToken;
pub use chain::{find_first, find_release_method, find_virtual_release, Search, RELEASE_METHOD};
pub use classify::{ContractKind, DisposableContract};
pub use config::Config;
pub use error::AnalysisError;
pub use ownership::{EdgeKind, OwnershipEdge};
pub use report::{
    FixCall, FixDescriptor, InsertionPoint, Location, Skeleton, Violation, ViolationKind,
};

/// One configured engine instance. Cheap to clone; clones share the
/// contract cache.
#[derive(Debug, Clone, Default)]
pub struct Analyzer {
    config: Config,
    cache: Arc<ContractCache>,
}

impl Analyzer {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            cache: Arc::new(ContractCache::new()),
        }
    }

    /// Share an existing cache across analyzer instances.
    pub fn with_cache(mut self, cache: Arc<ContractCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &ContractCache {
        &self.cache
    }

    /// Classify one type, going through the contract cache.
    pub fn classify(
        &self,
        model: &SemanticModel,
        ty: TypeId,
        cancel: &CancelToken,
    ) -> Result<DisposableContract, AnalysisError> {
        self.cache.get_or_compute(model.snapshot, ty, || {
            classify::classify(model, ty, &self.config, cancel)
        })
    }

    /// Check the local obligations of one method body.
    pub fn analyze_method(
        &self,
        model: &SemanticModel,
        method: MethodId,
        cancel: &CancelToken,
    ) -> Result<Vec<Violation>, AnalysisError> {
        let Some(symbol) = model.method(method) else {
            return Ok(Vec::new());
        };
        let edges = ownership::build_method_ownership(model, symbol, &self.config, cancel, |ty| {
            self.classify(model, ty, cancel)
        })?;
        let violations = paths::check_method(model, symbol, &edges, cancel)?;
        Ok(report::finalize(violations))
    }

    /// Check the member obligations and chain hygiene of one type.
    pub fn analyze_type(
        &self,
        model: &SemanticModel,
        ty: TypeId,
        cancel: &CancelToken,
    ) -> Result<Vec<Violation>, AnalysisError> {
        let Some(symbol) = model.ty(ty) else {
            return Ok(Vec::new());
        };
        let contract = self.classify(model, ty, cancel)?;
        let edges = ownership::build_type_ownership(model, symbol, &self.config, cancel, |t| {
            self.classify(model, t, cancel)
        })?;
        let violations = paths::check_type(model, symbol, &contract, &edges, &self.config, cancel)?;
        Ok(report::finalize(violations))
    }

    /// Run the whole pipeline over every type and method in the model.
    ///
    /// Failures are isolated per symbol: a malformed inheritance chain
    /// skips that symbol and the walk continues. Cancellation is the
    /// one error that aborts the run.
    pub fn analyze_all(
        &self,
        model: &SemanticModel,
        cancel: &CancelToken,
    ) -> Result<Vec<Violation>, AnalysisError> {
        let mut violations = Vec::new();

        for ty in model.types() {
            cancel.check()?;
            if self.config.suppressions.contains(&ty.id) {
                tracing::debug!(ty = %ty.name, "suppressed, skipping");
                continue;
            }
            match self.analyze_type(model, ty.id, cancel) {
                Ok(found) => violations.extend(found),
                Err(err) if err.is_interrupt() => return Err(err),
                Err(err) => {
                    tracing::warn!(ty = %ty.name, %err, "skipping type");
                    continue;
                }
            }
            for method in model.methods_of(ty.id) {
                match self.analyze_method(model, method.id, cancel) {
                    Ok(found) => violations.extend(found),
                    Err(err) if err.is_interrupt() => return Err(err),
                    Err(err) => {
                        tracing::warn!(method = %model.method_path(method.id), %err, "skipping method");
                    }
                }
            }
        }

        Ok(report::finalize(violations))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CfgBuilder, ModelBuilder};

    #[test]
    fn analyzer_clones_share_the_cache() {
        let mut b = ModelBuilder::new();
        let c = b.ty("C").disposable().guarded_release().finish();
        let model = b.build();

        let analyzer = Analyzer::new(Config::default());
        let clone = analyzer.clone();
        let cancel = CancelToken::new();

        analyzer.classify(&model, c, &cancel).unwrap();
        assert_eq!(clone.cache().len(), 1);
    }

    #[test]
    fn suppressed_type_reports_nothing() {
        let mut b = ModelBuilder::new();
        let disposable = b.disposable_leaf("Disposable");
        let c = b
            .ty("C")
            .method("m", |m| {
                m.body(
                    CfgBuilder::new()
                        .entry(|blk| blk.assign_new(0, disposable).ret())
                        .build(),
                )
            })
            .finish();
        let model = b.build();
        let cancel = CancelToken::new();

        let leaky = Analyzer::new(Config::default());
        assert!(!leaky.analyze_all(&model, &cancel).unwrap().is_empty());

        let silenced = Analyzer::new(Config::default().with_suppression(c));
        assert!(silenced.analyze_all(&model, &cancel).unwrap().is_empty());
    }

    #[test]
    fn cancellation_aborts_the_run() {
        let mut b = ModelBuilder::new();
        b.ty("C").disposable().guarded_release().finish();
        let model = b.build();

        let cancel = CancelToken::new();
        cancel.cancel();
        let err = Analyzer::new(Config::default())
            .analyze_all(&model, &cancel)
            .unwrap_err();
        assert_eq!(err, AnalysisError::Interrupted);
    }
}
