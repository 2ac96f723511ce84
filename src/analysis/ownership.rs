//! Ownership graph construction.
//!
//! For every member, local, and parameter whose static type carries a
//! disposal contract, decide whose job releasing it is. Only `Owned`
//! edges become obligations; `Escapes` removes an owned value from this
//! scope's responsibility without flagging anything by itself. Whether a
//! conditionally-assigned value is released on every path is the
//! checker's question, not this module's: any in-scope creation marks
//! the edge `Owned`.

use serde::{Deserialize, Serialize};

use crate::model::{
    Cfg, MethodSymbol, ParamKind, Place, Rvalue, SemanticModel, Span, StmtKind, TypeId, TypeSymbol,
};

use super::cancel::CancelToken;
use super::classify::DisposableContract;
use super::config::Config;
use super::error::AnalysisError;

/// Relationship between a scope and a disposable value it can reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeKind {
    /// Created here and never handed off: this scope must release it.
    Owned,
    /// Reached through a reference owned elsewhere.
    Borrowed,
    /// Arrived from outside (parameter, external source); never this
    /// scope's obligation.
    Injected,
    /// Created here but transferred out: returned, stored in an
    /// external sink, or passed to an ownership-taking call.
    Escapes,
}

/// One edge of the ownership graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipEdge {
    pub place: Place,
    /// Disposable type of the held value.
    pub ty: TypeId,
    /// Declaration or creation site, for diagnostics.
    pub origin: Span,
    pub kind: EdgeKind,
}

impl OwnershipEdge {
    pub fn is_obligation(&self) -> bool {
        self.kind == EdgeKind::Owned
    }
}

/// Build ownership edges for the locals and parameters of one method
/// body. `contract_of` is the (cached) classifier.
pub fn build_method_ownership<F>(
    model: &SemanticModel,
    method: &MethodSymbol,
    config: &Config,
    cancel: &CancelToken,
    mut contract_of: F,
) -> Result<Vec<OwnershipEdge>, AnalysisError>
where
    F: FnMut(TypeId) -> Result<DisposableContract, AnalysisError>,
{
    let mut edges: Vec<OwnershipEdge> = Vec::new();

    // parameters of disposable type are injected from the start
    for (index, param) in method.params.iter().enumerate() {
        if let ParamKind::Value(ty) = param {
            if contract_of(*ty)?.is_disposable() {
                upsert(
                    &mut edges,
                    OwnershipEdge {
                        place: Place::Param(index as u32),
                        ty: *ty,
                        origin: method.span,
                        kind: EdgeKind::Injected,
                    },
                );
            }
        }
    }

    let Some(body) = &method.body else {
        // reference-only symbol: nothing to see, nothing to verify
        return Ok(edges);
    };

    for block in &body.blocks {
        cancel.check()?;
        for stmt in &block.stmts {
            match &stmt.kind {
                StmtKind::Assign { place, value } => {
                    if let Some(edge) = classify_assignment(
                        model,
                        method,
                        *place,
                        *value,
                        stmt.span,
                        &mut edges,
                        &mut contract_of,
                    )? {
                        upsert(&mut edges, edge);
                    }
                }
                StmtKind::Return { place: Some(place) } => {
                    escape(&mut edges, *place);
                }
                StmtKind::Store { place, .. } => {
                    escape(&mut edges, *place);
                }
                StmtKind::Call { callee, args } => {
                    if config.is_ownership_sink(callee) {
                        for arg in args {
                            escape(&mut edges, *arg);
                        }
                    }
                }
                _ => {}
            }
        }
    }

    edges.sort_by_key(|e| e.place);
    Ok(edges)
}

/// Build ownership edges for the members of one type, scanning every
/// declared method body for assignments and escapes.
pub fn build_type_ownership<F>(
    model: &SemanticModel,
    ty: &TypeSymbol,
    config: &Config,
    cancel: &CancelToken,
    mut contract_of: F,
) -> Result<Vec<OwnershipEdge>, AnalysisError>
where
    F: FnMut(TypeId) -> Result<DisposableContract, AnalysisError>,
{
    let mut edges: Vec<OwnershipEdge> = Vec::new();

    for member in &ty.members {
        cancel.check()?;
        if !contract_of(member.ty)?.is_disposable() {
            continue;
        }

        let mut kind: Option<EdgeKind> = None;
        let mut escapes = false;

        for method in model.methods_of(ty.id) {
            let Some(body) = &method.body else { continue };
            for stmt in body.all_stmts() {
                match &stmt.kind {
                    StmtKind::Assign { place, value } if *place == Place::Member(member.id) => {
                        let assigned = match value {
                            Rvalue::New(_) | Rvalue::Factory(_) => EdgeKind::Owned,
                            Rvalue::Param(_) | Rvalue::External(_) => EdgeKind::Injected,
                            Rvalue::MemberRead(_) => EdgeKind::Borrowed,
                            Rvalue::Move(source) => moved_value_kind(body, *source, 0),
                        };
                        // any in-scope creation wins over injected reads
                        kind = Some(match (kind, assigned) {
                            (Some(EdgeKind::Owned), _) | (_, EdgeKind::Owned) => EdgeKind::Owned,
                            (_, other) => other,
                        });
                    }
                    StmtKind::Return { place: Some(place) }
                    | StmtKind::Store { place, .. }
                        if *place == Place::Member(member.id) =>
                    {
                        escapes = true;
                    }
                    StmtKind::Call { callee, args }
                        if config.is_ownership_sink(callee)
                            && args.contains(&Place::Member(member.id)) =>
                    {
                        escapes = true;
                    }
                    _ => {}
                }
            }
        }

        let Some(mut kind) = kind else { continue };
        if escapes && kind == EdgeKind::Owned {
            kind = EdgeKind::Escapes;
        }
        edges.push(OwnershipEdge {
            place: Place::Member(member.id),
            ty: member.ty,
            origin: member.span,
            kind,
        });
    }

    Ok(edges)
}

fn classify_assignment<F>(
    model: &SemanticModel,
    method: &MethodSymbol,
    place: Place,
    value: Rvalue,
    span: Span,
    edges: &mut Vec<OwnershipEdge>,
    contract_of: &mut F,
) -> Result<Option<OwnershipEdge>, AnalysisError>
where
    F: FnMut(TypeId) -> Result<DisposableContract, AnalysisError>,
{
    // member assignments belong to the type-level graph; a move into
    // one takes the local's obligation with it
    if matches!(place, Place::Member(_)) {
        if let Rvalue::Move(source) = value {
            escape(edges, source);
        }
        return Ok(None);
    }

    let edge = match value {
        Rvalue::New(ty) | Rvalue::Factory(ty) => contract_of(ty)?
            .is_disposable()
            .then_some(OwnershipEdge {
                place,
                ty,
                origin: span,
                kind: EdgeKind::Owned,
            }),
        Rvalue::Param(index) => match method.params.get(index as usize) {
            Some(ParamKind::Value(ty)) if contract_of(*ty)?.is_disposable() => {
                Some(OwnershipEdge {
                    place,
                    ty: *ty,
                    origin: span,
                    kind: EdgeKind::Injected,
                })
            }
            _ => None,
        },
        Rvalue::External(ty) => contract_of(ty)?
            .is_disposable()
            .then_some(OwnershipEdge {
                place,
                ty,
                origin: span,
                kind: EdgeKind::Injected,
            }),
        Rvalue::MemberRead(member) => match model.member(member) {
            Some((_, m)) if contract_of(m.ty)?.is_disposable() => Some(OwnershipEdge {
                place,
                ty: m.ty,
                origin: span,
                kind: EdgeKind::Borrowed,
            }),
            _ => None,
        },
        Rvalue::Move(source) => {
            // obligation transfers to the new place
            let moved = edges.iter().position(|e| e.place == source);
            moved.map(|idx| {
                let src = edges.remove(idx);
                OwnershipEdge {
                    place,
                    ty: src.ty,
                    origin: span,
                    kind: src.kind,
                }
            })
        }
    };
    Ok(edge)
}

/// Provenance of a moved value: whatever the source place held in this
/// body. Any in-scope creation wins, matching the member assignment
/// rule.
fn moved_value_kind(body: &Cfg, source: Place, depth: usize) -> EdgeKind {
    if depth > 8 {
        return EdgeKind::Borrowed;
    }
    let mut kind = EdgeKind::Borrowed;
    for stmt in body.all_stmts() {
        let StmtKind::Assign { place, value } = &stmt.kind else {
            continue;
        };
        if *place != source {
            continue;
        }
        let assigned = match value {
            Rvalue::New(_) | Rvalue::Factory(_) => EdgeKind::Owned,
            Rvalue::Param(_) | Rvalue::External(_) => EdgeKind::Injected,
            Rvalue::MemberRead(_) => EdgeKind::Borrowed,
            Rvalue::Move(inner) => moved_value_kind(body, *inner, depth + 1),
        };
        kind = match (kind, assigned) {
            (EdgeKind::Owned, _) | (_, EdgeKind::Owned) => EdgeKind::Owned,
            (_, other) => other,
        };
    }
    kind
}

/// Replace any existing edge for the same place.
fn upsert(edges: &mut Vec<OwnershipEdge>, edge: OwnershipEdge) {
    if let Some(existing) = edges.iter_mut().find(|e| e.place == edge.place) {
        *existing = edge;
    } else {
        edges.push(edge);
    }
}

/// An owned value handed off stops being this scope's obligation.
fn escape(edges: &mut [OwnershipEdge], place: Place) {
    if let Some(edge) = edges.iter_mut().find(|e| e.place == place) {
        if edge.kind == EdgeKind::Owned {
            edge.kind = EdgeKind::Escapes;
        }
    }
}
