//! Path-sensitive release checking.
//!
//! Obligations are verified by forward dataflow over control-flow
//! edges, never by path enumeration: loops collapse to their
//! zero/one/many equivalence classes at the fixpoint, which keeps the
//! walk linear in CFG edges. Disposal correctness depends only on
//! "executed at least once" versus "possibly skipped", so nothing is
//! lost in the collapse.

use std::collections::{HashMap, HashSet};

use crate::model::{
    BlockId, Cfg, ChainTarget, EdgeKind as CfgEdgeKind, MemberId, MethodId, MethodSymbol, Place,
    Rvalue, SemanticModel, Span, Stmt, StmtKind, Terminator, TypeSymbol,
};

use super::cancel::CancelToken;
use super::chain::{any_release_named, base_chain, find_first, follow_forward, is_release_name};
use super::classify::{ContractKind, DisposableContract};
use super::config::Config;
use super::error::AnalysisError;
use super::ownership::OwnershipEdge;
use super::report::{
    place_location, FixCall, FixDescriptor, InsertionPoint, Location, Skeleton, Violation,
    ViolationKind,
};

/// Obligation state bits. Empty means "no live owned value tracked yet".
const UNRELEASED: u8 = 0b01;
const RELEASED: u8 = 0b10;

/// Bound on chain-call inlining depth when computing transitive member
/// releases.
const MAX_INLINE_DEPTH: usize = 32;

/// Check the owned locals of one method body.
pub fn check_method(
    model: &SemanticModel,
    method: &MethodSymbol,
    edges: &[OwnershipEdge],
    cancel: &CancelToken,
) -> Result<Vec<Violation>, AnalysisError> {
    let Some(body) = &method.body else {
        // no accessible body: cannot verify, no violation produced
        return Ok(Vec::new());
    };

    let tracked: Vec<&OwnershipEdge> = edges
        .iter()
        .filter(|e| e.is_obligation() && !matches!(e.place, Place::Member(_)))
        .collect();

    let mut violations = Vec::new();

    for edge in tracked {
        cancel.check()?;
        let all = local_flow(body, edge.place, true, cancel)?;
        let normal = local_flow(body, edge.place, false, cancel)?;

        for span in &all.double_releases {
            violations.push(Violation::new(
                ViolationKind::DoubleRelease,
                place_location(model, Some(method.owner), Some(method.id), edge.place, *span),
            ));
        }
        for span in &all.reassign_leaks {
            violations.push(Violation::new(
                ViolationKind::Leak,
                place_location(model, Some(method.owner), Some(method.id), edge.place, *span),
            ));
        }

        let fix = FixDescriptor {
            insertion: InsertionPoint::MethodEnd(method.id),
            call: Some(FixCall::Release {
                place: edge.place,
                guarded: false,
            }),
            synthesize: None,
        };
        let location = place_location(
            model,
            Some(method.owner),
            Some(method.id),
            edge.place,
            edge.origin,
        );
        if normal.leaking_exit {
            violations.push(Violation::new(ViolationKind::Leak, location).with_fix(fix));
        } else if all.leaking_exit {
            // covered on every normal exit, bypassed by an exception
            // edge: the release sits in the wrong scope
            violations.push(Violation::new(ViolationKind::WrongScope, location).with_fix(fix));
        }
    }

    Ok(violations)
}

/// Check member obligations and chain hygiene for one type.
pub fn check_type(
    model: &SemanticModel,
    ty: &TypeSymbol,
    contract: &DisposableContract,
    edges: &[OwnershipEdge],
    config: &Config,
    cancel: &CancelToken,
) -> Result<Vec<Violation>, AnalysisError> {
    let mut violations = Vec::new();

    check_members(model, ty, edges, config, cancel, &mut violations)?;
    check_chain_hygiene(model, ty, contract, &mut violations)?;
    check_base_calls(model, ty, cancel, &mut violations)?;

    Ok(violations)
}

fn check_members(
    model: &SemanticModel,
    ty: &TypeSymbol,
    edges: &[OwnershipEdge],
    config: &Config,
    cancel: &CancelToken,
    violations: &mut Vec<Violation>,
) -> Result<(), AnalysisError> {
    let owned: Vec<&OwnershipEdge> = edges.iter().filter(|e| e.is_obligation()).collect();
    if owned.is_empty() {
        return Ok(());
    }

    let release = find_first(model, ty.id, config.search, config, cancel)?;
    let teardowns: Vec<&MethodSymbol> = model
        .methods_of(ty.id)
        .filter(|m| m.is_teardown && m.body.is_some())
        .collect();

    if release.is_none() && teardowns.is_empty() {
        // a hidden (e.g. explicit-only) release method means the
        // obligation cannot be verified either way; stay silent
        let hidden = base_chain(model, ty.id, cancel)?
            .into_iter()
            .any(|id| any_release_named(model, id));
        if hidden {
            tracing::debug!(ty = %ty.name, "release method exists but is not discoverable; skipping members");
            return Ok(());
        }

        let has_setup = model.methods_of(ty.id).any(|m| m.is_setup);
        for edge in owned {
            let fix = FixDescriptor {
                insertion: InsertionPoint::NewMethod {
                    ty: ty.id,
                    teardown: has_setup,
                },
                call: Some(FixCall::Release {
                    place: edge.place,
                    guarded: true,
                }),
                synthesize: Some(if has_setup || ty.sealed {
                    Skeleton::ReleaseMethod
                } else {
                    Skeleton::VirtualPattern
                }),
            };
            violations.push(
                Violation::new(
                    ViolationKind::Leak,
                    place_location(model, Some(ty.id), None, edge.place, edge.origin),
                )
                .with_fix(fix),
            );
        }
        return Ok(());
    }

    // a resolved release method without an accessible body cannot be
    // verified either way
    if let Some(release) = release {
        let opaque = model.method(release).map_or(true, |m| m.body.is_none());
        if opaque {
            tracing::debug!(ty = %ty.name, "release method has no body; skipping members");
            return Ok(());
        }
    }

    // union of members released on every path of the dispose chain and
    // of each teardown body
    let mut satisfied: HashSet<MemberId> = HashSet::new();
    let mut doubles: Vec<(Place, Span)> = Vec::new();
    let mut insert_target = None;
    let mut needs_override = false;

    if let Some(release) = release {
        satisfied.extend(released_members(
            model,
            release,
            config,
            cancel,
            0,
            &mut doubles,
        )?);
        let terminal = terminal_body(model, release, config, cancel)?;
        if model.method(terminal).is_some_and(|m| m.owner == ty.id) {
            insert_target = Some(terminal);
        } else {
            // the chain bottoms out in a base body; an edit there could
            // not name this type's members, so the fix must add an
            // override here instead
            needs_override = true;
            for method in model.methods_of(ty.id) {
                if is_release_name(&method.name) && method.body.is_some() {
                    // overrides declared here run as part of the
                    // dispatched chain
                    satisfied.extend(released_members_of_body(
                        model,
                        method,
                        config,
                        cancel,
                        0,
                        &mut doubles,
                    )?);
                }
            }
        }
    }
    for teardown in &teardowns {
        satisfied.extend(released_members_of_body(
            model,
            teardown,
            config,
            cancel,
            0,
            &mut doubles,
        )?);
        insert_target.get_or_insert(teardown.id);
    }

    for (place, span) in doubles {
        violations.push(Violation::new(
            ViolationKind::DoubleRelease,
            place_location(model, Some(ty.id), None, place, span),
        ));
    }

    for edge in owned {
        let Place::Member(member) = edge.place else {
            continue;
        };
        if satisfied.contains(&member) {
            continue;
        }
        let mut violation = Violation::new(
            ViolationKind::Leak,
            place_location(model, Some(ty.id), None, edge.place, edge.origin),
        );
        if let Some(method) = insert_target {
            violation = violation.with_fix(FixDescriptor {
                insertion: InsertionPoint::MethodEnd(method),
                call: Some(FixCall::Release {
                    place: edge.place,
                    guarded: true,
                }),
                synthesize: None,
            });
        } else if needs_override {
            violation = violation.with_fix(FixDescriptor {
                insertion: InsertionPoint::NewMethod {
                    ty: ty.id,
                    teardown: false,
                },
                call: Some(FixCall::Release {
                    place: edge.place,
                    guarded: true,
                }),
                synthesize: Some(Skeleton::OverrideRelease),
            });
        }
        violations.push(violation);
    }

    Ok(())
}

/// The body a member-release fix should land in: the flag overload when
/// the chain forwards, otherwise the resolved method itself.
fn terminal_body(
    model: &SemanticModel,
    release: MethodId,
    config: &Config,
    cancel: &CancelToken,
) -> Result<MethodId, AnalysisError> {
    Ok(follow_forward(model, release, config, cancel)?.unwrap_or(release))
}

fn check_chain_hygiene(
    model: &SemanticModel,
    ty: &TypeSymbol,
    contract: &DisposableContract,
    violations: &mut Vec<Violation>,
) -> Result<(), AnalysisError> {
    if contract.kind != ContractKind::VirtualPattern {
        return Ok(());
    }
    let [public, overload] = contract.release_methods.as_slice() else {
        return Ok(());
    };

    // the public method must forward with the explicit-call flag
    if let Some(method) = model.method(*public) {
        if let Some(body) = &method.body {
            let forwards_true = body.all_stmts().any(|s| {
                matches!(
                    s.kind,
                    StmtKind::ChainCall {
                        target: ChainTarget::This,
                        flag: Some(true),
                    }
                )
            });
            if !forwards_true {
                violations.push(
                    Violation::new(
                        ViolationKind::BrokenChain,
                        method_location(model, ty, method),
                    )
                    .with_fix(FixDescriptor {
                        insertion: InsertionPoint::MethodEnd(method.id),
                        call: Some(FixCall::ChainThis { flag: true }),
                        synthesize: None,
                    }),
                );
            }
        }
    }

    // the terminal overload must be re-entrancy safe: a repeated call is
    // a no-op only if a released flag is checked or set
    if let Some(method) = model.method(*overload) {
        if method.owner == ty.id {
            if let Some(body) = &method.body {
                let guarded = body
                    .all_stmts()
                    .any(|s| matches!(s.kind, StmtKind::GuardCheckReturn | StmtKind::SetGuard));
                if !guarded {
                    violations.push(Violation::new(
                        ViolationKind::BrokenChain,
                        method_location(model, ty, method),
                    ));
                }
            }
        }
    }

    Ok(())
}

fn check_base_calls(
    model: &SemanticModel,
    ty: &TypeSymbol,
    cancel: &CancelToken,
    violations: &mut Vec<Violation>,
) -> Result<(), AnalysisError> {
    for method in model.methods_of(ty.id) {
        if !method.is_override || !is_release_name(&method.name) {
            continue;
        }
        let Some(body) = &method.body else { continue };
        cancel.check()?;

        // only an override of an actual chain slot owes a base call
        let overrides_chain = base_chain(model, ty.id, cancel)?
            .into_iter()
            .skip(1)
            .flat_map(|id| model.methods_of(id))
            .any(|m| {
                is_release_name(&m.name)
                    && m.params == method.params
                    && (m.is_virtual || m.is_override)
            });
        if !overrides_chain {
            continue;
        }

        let calls_base = body.all_stmts().any(|s| {
            matches!(
                s.kind,
                StmtKind::ChainCall {
                    target: ChainTarget::Base,
                    ..
                }
            )
        });
        if !calls_base {
            violations.push(
                Violation::new(
                    ViolationKind::MissingBaseCall,
                    method_location(model, ty, method),
                )
                .with_fix(FixDescriptor {
                    insertion: InsertionPoint::MethodEnd(method.id),
                    call: Some(FixCall::ChainBase),
                    synthesize: None,
                }),
            );
        }
    }
    Ok(())
}

fn method_location(model: &SemanticModel, ty: &TypeSymbol, method: &MethodSymbol) -> Location {
    Location {
        span: method.span,
        symbol: model.method_path(method.id),
        ty: Some(ty.id),
        method: Some(method.id),
    }
}

/// Result of one local-obligation dataflow.
struct LocalFlow {
    /// Some exit is reachable with the value possibly unreleased.
    leaking_exit: bool,
    /// Release sites reachable with the value already released, or
    /// manual releases inside a guaranteeing scope.
    double_releases: Vec<Span>,
    /// Re-creations that overwrite a definitely-unreleased value.
    reassign_leaks: Vec<Span>,
}

/// Forward dataflow for one owned local place.
fn local_flow(
    cfg: &Cfg,
    place: Place,
    include_exceptions: bool,
    cancel: &CancelToken,
) -> Result<LocalFlow, AnalysisError> {
    let entry_states = fixpoint(cfg, place, 0, include_exceptions, cancel, |mask, stmt| {
        local_transfer(mask, &stmt.kind, place)
    })?;

    // one stable pass over the settled states to collect findings
    let mut flow = LocalFlow {
        leaking_exit: false,
        double_releases: Vec::new(),
        reassign_leaks: Vec::new(),
    };

    for block in &cfg.blocks {
        let Some(&entry) = entry_states.get(&block.id) else {
            continue; // unreachable under this edge filter
        };
        let mut mask = entry;
        for stmt in &block.stmts {
            match &stmt.kind {
                StmtKind::Assign {
                    place: target,
                    value,
                } if *target == place => {
                    let creates =
                        matches!(value, Rvalue::New(_) | Rvalue::Factory(_) | Rvalue::Move(_));
                    if creates && mask == UNRELEASED && include_exceptions {
                        flow.reassign_leaks.push(stmt.span);
                    }
                }
                StmtKind::ReleaseCall { place: target } if *target == place => {
                    let already = mask & RELEASED != 0 && mask & UNRELEASED == 0;
                    let guaranteed = cfg.in_using_scope(place, block.id);
                    if (already || guaranteed) && include_exceptions {
                        flow.double_releases.push(stmt.span);
                    }
                }
                _ => {}
            }
            mask = local_transfer(mask, &stmt.kind, place);
        }
        if matches!(block.terminator, Terminator::Exit) {
            // exiting inside a releasing scope still releases
            if mask != 0 && cfg.in_using_scope(place, block.id) {
                mask = RELEASED;
            }
            if mask & UNRELEASED != 0 {
                flow.leaking_exit = true;
            }
        }
    }

    Ok(flow)
}

/// Pure transfer of one statement for a local obligation. A moved-in
/// value arrives with its obligation still live; moving the value out
/// hands the obligation to the destination place.
fn local_transfer(mask: u8, kind: &StmtKind, place: Place) -> u8 {
    match kind {
        StmtKind::Assign {
            place: target,
            value,
        } if *target == place => match value {
            Rvalue::New(_) | Rvalue::Factory(_) | Rvalue::Move(_) => UNRELEASED,
            _ => 0,
        },
        StmtKind::Assign {
            value: Rvalue::Move(source),
            ..
        } if *source == place => 0,
        StmtKind::ReleaseCall { place: target } if *target == place => RELEASED,
        _ => mask,
    }
}

/// Generic forward fixpoint over one obligation mask. Join is bitwise
/// or; the lattice has four points, so this settles quickly.
fn fixpoint(
    cfg: &Cfg,
    place: Place,
    initial: u8,
    include_exceptions: bool,
    cancel: &CancelToken,
    transfer: impl Fn(u8, &Stmt) -> u8,
) -> Result<HashMap<BlockId, u8>, AnalysisError> {
    let mut entry_states: HashMap<BlockId, u8> = HashMap::new();
    entry_states.insert(cfg.entry, initial);
    let mut worklist = vec![cfg.entry];

    while let Some(id) = worklist.pop() {
        cancel.check()?;
        let Some(block) = cfg.block(id) else { continue };
        let mut mask = *entry_states.get(&id).unwrap_or(&initial);
        for stmt in &block.stmts {
            mask = transfer(mask, stmt);
        }
        for edge in cfg.successors(id) {
            if !include_exceptions && edge.kind == CfgEdgeKind::Exception {
                continue;
            }
            let out = cross_scope_boundary(mask, cfg, place, id, edge.to);
            let prev = entry_states.get(&edge.to).copied();
            let joined = prev.unwrap_or(0) | out;
            if prev != Some(joined) {
                entry_states.insert(edge.to, joined);
                worklist.push(edge.to);
            }
        }
    }
    Ok(entry_states)
}

/// Leaving a releasing scope that guards `place` releases it.
fn cross_scope_boundary(mask: u8, cfg: &Cfg, place: Place, from: BlockId, to: BlockId) -> u8 {
    let leaves_scope = cfg.using_scopes.iter().any(|scope| {
        scope.place == place && scope.blocks.contains(&from) && !scope.blocks.contains(&to)
    });
    if mask != 0 && leaves_scope {
        RELEASED
    } else {
        mask
    }
}

/// Members released on every exit path of the resolved release method,
/// following forwarding chain calls.
fn released_members(
    model: &SemanticModel,
    method: MethodId,
    config: &Config,
    cancel: &CancelToken,
    depth: usize,
    doubles: &mut Vec<(Place, Span)>,
) -> Result<HashSet<MemberId>, AnalysisError> {
    let Some(symbol) = model.method(method) else {
        return Ok(HashSet::new());
    };
    released_members_of_body(model, symbol, config, cancel, depth, doubles)
}

fn released_members_of_body(
    model: &SemanticModel,
    method: &MethodSymbol,
    config: &Config,
    cancel: &CancelToken,
    depth: usize,
    doubles: &mut Vec<(Place, Span)>,
) -> Result<HashSet<MemberId>, AnalysisError> {
    if depth > MAX_INLINE_DEPTH {
        return Ok(HashSet::new());
    }
    let Some(body) = &method.body else {
        return Ok(HashSet::new());
    };

    // members any reachable release could satisfy, here or downstream
    let mut candidates: HashSet<MemberId> = HashSet::new();
    collect_release_candidates(model, method, config, cancel, depth, &mut candidates)?;
    if candidates.is_empty() {
        return Ok(HashSet::new());
    }

    // chain-call inlining: the forwarded body's all-path set counts as
    // a simultaneous release at the call site
    let inlined: HashSet<MemberId> = match follow_forward(model, method.id, config, cancel)? {
        Some(target) => released_members(model, target, config, cancel, depth + 1, doubles)?,
        None => HashSet::new(),
    };

    let mut satisfied = HashSet::new();
    for member in candidates {
        cancel.check()?;
        let entry_states = fixpoint(
            body,
            Place::Member(member),
            UNRELEASED,
            true,
            cancel,
            |mask, stmt| member_transfer(mask, &stmt.kind, member, &inlined),
        )?;

        let mut all_exits_released = true;
        let mut any_exit = false;
        for block in &body.blocks {
            let Some(&entry) = entry_states.get(&block.id) else {
                continue;
            };
            let mut mask = entry;
            for stmt in &block.stmts {
                if is_repeat_release(mask, &stmt.kind, member) {
                    doubles.push((Place::Member(member), stmt.span));
                }
                mask = member_transfer(mask, &stmt.kind, member, &inlined);
            }
            if matches!(block.terminator, Terminator::Exit) {
                any_exit = true;
                if mask & UNRELEASED != 0 {
                    all_exits_released = false;
                }
            }
        }
        if any_exit && all_exits_released {
            satisfied.insert(member);
        }
    }
    Ok(satisfied)
}

/// Transfer for a member obligation inside a release body. The value is
/// presumed live at method entry; a guard early-return path is a no-op
/// because an already-released value carries no obligation.
fn member_transfer(mask: u8, kind: &StmtKind, member: MemberId, inlined: &HashSet<MemberId>) -> u8 {
    match kind {
        StmtKind::ReleaseCall {
            place: Place::Member(m),
        } if *m == member => RELEASED,
        StmtKind::ChainCall {
            target: ChainTarget::This,
            ..
        } if inlined.contains(&member) => RELEASED,
        StmtKind::Assign {
            place: Place::Member(m),
            value,
        } if *m == member => match value {
            Rvalue::New(_) | Rvalue::Factory(_) | Rvalue::Move(_) => UNRELEASED,
            _ => mask,
        },
        _ => mask,
    }
}

/// A release reached while the value can only be already-released.
fn is_repeat_release(mask: u8, kind: &StmtKind, member: MemberId) -> bool {
    matches!(
        kind,
        StmtKind::ReleaseCall {
            place: Place::Member(m),
        } if *m == member
    ) && mask & RELEASED != 0
        && mask & UNRELEASED == 0
}

/// Members that any reachable release statement in this body or its
/// chain targets could satisfy.
fn collect_release_candidates(
    model: &SemanticModel,
    method: &MethodSymbol,
    config: &Config,
    cancel: &CancelToken,
    depth: usize,
    out: &mut HashSet<MemberId>,
) -> Result<(), AnalysisError> {
    if depth > MAX_INLINE_DEPTH {
        return Ok(());
    }
    let Some(body) = &method.body else {
        return Ok(());
    };
    for stmt in body.all_stmts() {
        if let StmtKind::ReleaseCall {
            place: Place::Member(m),
        } = stmt.kind
        {
            out.insert(m);
        }
    }
    if let Some(target) = follow_forward(model, method.id, config, cancel)? {
        if let Some(target) = model.method(target) {
            collect_release_candidates(model, target, config, cancel, depth + 1, out)?;
        }
    }
    Ok(())
}
