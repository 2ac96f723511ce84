//! Dispose-chain resolution.
//!
//! Locates the concrete release method(s) for a type, following the
//! inheritance lattice and forwarding calls of the two-method idiom.
//! Every lookup returns found/not-found; "no release method" is an
//! expected state, never an error. The only failures are cancellation
//! and a malformed (cyclic) base chain.

use serde::{Deserialize, Serialize};

use crate::model::{
    ChainTarget, MethodId, MethodSymbol, SemanticModel, StmtKind, TypeId, Visibility,
};

use super::cancel::CancelToken;
use super::config::Config;
use super::error::AnalysisError;

/// Slot name of the disposal contract's release method.
pub const RELEASE_METHOD: &str = "dispose";

/// How deep chain lookup goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Search {
    /// Only the type itself, or its immediate inherited slot when the
    /// type does not re-declare it.
    TopLevel,
    /// Follow the full base chain and forwarding calls.
    Recursive,
}

pub(crate) fn is_release_name(name: &str) -> bool {
    name.eq_ignore_ascii_case(RELEASE_METHOD)
}

/// Whether ordinary member lookup can see this method.
fn discoverable(method: &MethodSymbol, config: &Config) -> bool {
    !method.explicit_interface || config.include_explicit_contracts
}

/// The public no-argument release method declared directly on `ty`.
/// `None` when absent or ambiguous beyond the tie-break rules.
pub(crate) fn declared_public_release<'m>(
    model: &'m SemanticModel,
    ty: TypeId,
    config: &Config,
) -> Option<&'m MethodSymbol> {
    let mut candidates = model.methods_of(ty).filter(|m| {
        is_release_name(&m.name)
            && m.visibility == Visibility::Public
            && m.is_parameterless()
            && discoverable(m, config)
    });
    let first = candidates.next()?;
    if candidates.next().is_some() {
        // two equally plausible declarations; refuse to guess
        return None;
    }
    Some(first)
}

/// The overridable flag-taking overload declared directly on `ty`.
pub(crate) fn declared_virtual_release<'m>(
    model: &'m SemanticModel,
    ty: TypeId,
    config: &Config,
) -> Option<&'m MethodSymbol> {
    let mut candidates = model.methods_of(ty).filter(|m| {
        is_release_name(&m.name)
            && m.takes_release_flag()
            && (m.is_virtual || m.is_override)
            && discoverable(m, config)
    });
    let first = candidates.next()?;
    if candidates.next().is_some() {
        return None;
    }
    Some(first)
}

/// Any release-named method declared on `ty`, discoverable or not.
/// Used to distinguish "verifiably absent" from "present but hidden".
pub(crate) fn any_release_named(model: &SemanticModel, ty: TypeId) -> bool {
    model.methods_of(ty).any(|m| is_release_name(&m.name))
}

/// The base chain from `ty` upward, inclusive, with an explicit cycle
/// guard. Cycle-free by construction in a well-formed model; a revisit
/// is fatal for this symbol only.
pub(crate) fn base_chain(
    model: &SemanticModel,
    ty: TypeId,
    cancel: &CancelToken,
) -> Result<Vec<TypeId>, AnalysisError> {
    let mut chain = Vec::new();
    let mut seen = std::collections::HashSet::new();
    let mut current = Some(ty);
    while let Some(id) = current {
        cancel.check()?;
        if !seen.insert(id) {
            return Err(AnalysisError::InheritanceCycle(id));
        }
        chain.push(id);
        current = model.ty(id).and_then(|t| t.base);
    }
    Ok(chain)
}

/// Resolve the public no-argument release method for `ty`.
pub fn find_release_method(
    model: &SemanticModel,
    ty: TypeId,
    search: Search,
    config: &Config,
    cancel: &CancelToken,
) -> Result<Option<MethodId>, AnalysisError> {
    match search {
        Search::TopLevel => {
            if let Some(m) = declared_public_release(model, ty, config) {
                return Ok(Some(m.id));
            }
            // immediate inherited slot, when not re-declared here
            let base = model.ty(ty).and_then(|t| t.base);
            Ok(base
                .and_then(|b| declared_public_release(model, b, config))
                .map(|m| m.id))
        }
        Search::Recursive => {
            for id in base_chain(model, ty, cancel)? {
                if let Some(m) = declared_public_release(model, id, config) {
                    tracing::debug!(ty = ?ty, found_on = ?id, "resolved release method");
                    return Ok(Some(m.id));
                }
            }
            Ok(None)
        }
    }
}

/// Resolve the overridable flag-taking release overload for `ty`.
///
/// In recursive mode, when direct lookup fails but the public release
/// method forwards, the forwarding call is followed to its target.
pub fn find_virtual_release(
    model: &SemanticModel,
    ty: TypeId,
    search: Search,
    config: &Config,
    cancel: &CancelToken,
) -> Result<Option<MethodId>, AnalysisError> {
    match search {
        Search::TopLevel => {
            if let Some(m) = declared_virtual_release(model, ty, config) {
                return Ok(Some(m.id));
            }
            let base = model.ty(ty).and_then(|t| t.base);
            Ok(base
                .and_then(|b| declared_virtual_release(model, b, config))
                .map(|m| m.id))
        }
        Search::Recursive => {
            for id in base_chain(model, ty, cancel)? {
                if let Some(m) = declared_virtual_release(model, id, config) {
                    return Ok(Some(m.id));
                }
            }
            // follow the public method's forwarding call instead
            if let Some(public) = find_release_method(model, ty, search, config, cancel)? {
                if let Some(target) = follow_forward(model, public, config, cancel)? {
                    return Ok(Some(target));
                }
            }
            Ok(None)
        }
    }
}

/// Resolve the first release method by the tie-break order: the public
/// no-argument signature wins over the parameterized overload.
pub fn find_first(
    model: &SemanticModel,
    ty: TypeId,
    search: Search,
    config: &Config,
    cancel: &CancelToken,
) -> Result<Option<MethodId>, AnalysisError> {
    if let Some(m) = find_release_method(model, ty, search, config, cancel)? {
        return Ok(Some(m));
    }
    find_virtual_release(model, ty, search, config, cancel)
}

/// When `method`'s body forwards to the flag overload on the same type
/// (`this.Release(flag)`), resolve that target.
pub(crate) fn follow_forward(
    model: &SemanticModel,
    method: MethodId,
    config: &Config,
    cancel: &CancelToken,
) -> Result<Option<MethodId>, AnalysisError> {
    let Some(method) = model.method(method) else {
        return Ok(None);
    };
    let Some(body) = &method.body else {
        return Ok(None);
    };
    let forwards = body.all_stmts().any(|s| {
        matches!(
            s.kind,
            StmtKind::ChainCall {
                target: ChainTarget::This,
                flag: Some(_),
            }
        )
    });
    if !forwards {
        return Ok(None);
    }
    for id in base_chain(model, method.owner, cancel)? {
        if let Some(m) = declared_virtual_release(model, id, config) {
            return Ok(Some(m.id));
        }
    }
    Ok(None)
}
