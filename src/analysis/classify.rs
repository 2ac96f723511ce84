//! Disposal-contract classification.
//!
//! Decides whether a type exposes a disposal contract and through which
//! shape: declared directly, inherited from an ancestor, or the
//! two-method virtual tear-down idiom. Classification is pure structural
//! matching against known shapes; an unrecognized shape yields
//! [`ContractKind::None`], never an error.

use serde::{Deserialize, Serialize};

use crate::model::{MethodId, SemanticModel, TypeId};

use super::cancel::CancelToken;
use super::chain::{base_chain, declared_public_release, follow_forward, is_release_name};
use super::config::Config;
use super::error::AnalysisError;

/// How a type exposes the disposal contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractKind {
    /// No disposal contract recognized.
    None,
    /// The type structurally implements the contract itself.
    Direct,
    /// An ancestor implements it; this type does not conflict.
    Inherited,
    /// Public no-argument release forwarding to a protected overridable
    /// flag-taking release.
    VirtualPattern,
}

/// The computed contract for one type: kind plus the ordered sequence
/// of release methods (most-preferred first).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisposableContract {
    pub kind: ContractKind,
    pub release_methods: Vec<MethodId>,
}

impl DisposableContract {
    pub fn none() -> Self {
        Self {
            kind: ContractKind::None,
            release_methods: Vec::new(),
        }
    }

    /// Whether values of this type carry a release obligation.
    pub fn is_disposable(&self) -> bool {
        self.kind != ContractKind::None
    }
}

/// Classify `ty`'s disposal contract.
///
/// Pure function of the type's structure within one snapshot; callers
/// normally go through the contract cache instead of calling this
/// directly.
pub fn classify(
    model: &SemanticModel,
    ty: TypeId,
    config: &Config,
    cancel: &CancelToken,
) -> Result<DisposableContract, AnalysisError> {
    let Some(symbol) = model.ty(ty) else {
        return Ok(DisposableContract::none());
    };

    if symbol.declares_disposable {
        if let Some(contract) = virtual_pattern(model, ty, config, cancel)? {
            return Ok(contract);
        }
        let release_methods = declared_public_release(model, ty, config)
            .map(|m| vec![m.id])
            .unwrap_or_default();
        return Ok(DisposableContract {
            kind: ContractKind::Direct,
            release_methods,
        });
    }

    // Inherited: an ancestor implements the contract and this type does
    // not re-declare a conflicting release method.
    let chain = base_chain(model, ty, cancel)?;
    let ancestor_implements = chain
        .iter()
        .skip(1)
        .any(|id| model.ty(*id).map(|t| t.declares_disposable).unwrap_or(false));
    if !ancestor_implements {
        return Ok(DisposableContract::none());
    }

    let conflicting = model
        .methods_of(ty)
        .any(|m| is_release_name(&m.name) && !m.is_override);
    if conflicting {
        return Ok(DisposableContract::none());
    }

    let mut release_methods = Vec::new();
    for id in chain {
        cancel.check()?;
        if let Some(m) = declared_public_release(model, id, config) {
            release_methods.push(m.id);
            break;
        }
    }
    Ok(DisposableContract {
        kind: ContractKind::Inherited,
        release_methods,
    })
}

/// Match the two-method tear-down idiom on `ty`.
fn virtual_pattern(
    model: &SemanticModel,
    ty: TypeId,
    config: &Config,
    cancel: &CancelToken,
) -> Result<Option<DisposableContract>, AnalysisError> {
    let Some(public) = declared_public_release(model, ty, config) else {
        return Ok(None);
    };
    let Some(overload) = follow_forward(model, public.id, config, cancel)? else {
        return Ok(None);
    };
    Ok(Some(DisposableContract {
        kind: ContractKind::VirtualPattern,
        release_methods: vec![public.id, overload],
    }))
}

/// Convenience used by ownership building: is a value of `ty` disposable
/// at all. Overrides in derived types still classify through the
/// ancestor's declaration.
pub fn is_disposable_type(
    model: &SemanticModel,
    ty: TypeId,
    config: &Config,
    cancel: &CancelToken,
) -> Result<bool, AnalysisError> {
    Ok(classify(model, ty, config, cancel)?.is_disposable())
}
