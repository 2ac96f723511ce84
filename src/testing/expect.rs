//! Expectation helpers and fix application for round-trip tests.

use crate::analysis::{FixCall, InsertionPoint, Skeleton, Violation, ViolationKind};
use crate::model::{
    Cfg, ChainTarget, MethodId, MethodSymbol, ParamKind, SemanticModel, Span, Stmt, StmtKind,
    Terminator, TypeId, Visibility,
};
use crate::testing::CfgBuilder;

/// Assert that `actual` matches `expected` as ordered
/// `(kind, symbol path)` pairs.
#[track_caller]
pub fn assert_violations(actual: &[Violation], expected: &[(ViolationKind, &str)]) {
    let got: Vec<(ViolationKind, &str)> = actual
        .iter()
        .map(|v| (v.kind, v.location.symbol.as_str()))
        .collect();
    assert_eq!(got, expected, "full report: {actual:#?}");
}

#[track_caller]
pub fn assert_clean(actual: &[Violation]) {
    assert!(actual.is_empty(), "expected no violations: {actual:#?}");
}

/// Apply a violation's fix descriptor to the model the way a host
/// editor would, bumping the snapshot so caches refresh.
///
/// Panics when the violation carries no fix; only tests call this.
pub fn apply_fix(model: &mut SemanticModel, violation: &Violation) {
    let fix = violation
        .fix
        .as_ref()
        .expect("violation carries no fix descriptor");

    match &fix.insertion {
        InsertionPoint::MethodEnd(id) => {
            let mut method = model
                .method(*id)
                .expect("fix targets a known method")
                .clone();
            let body = method.body.as_mut().expect("fix target has a body");
            let call = fix.call.as_ref().expect("method-end fix carries a call");
            append_at_exits(body, call);
            model.replace_method(method);
        }
        InsertionPoint::NewMethod { ty, teardown } => {
            let call = fix.call.as_ref().expect("new-method fix carries a call");
            synthesize(model, *ty, *teardown, fix.synthesize, call);
        }
    }

    model.snapshot += 1;
}

/// Insert the fix call before every scope exit, ahead of a trailing
/// return statement when one is present. A release call is moved, not
/// duplicated: existing releases of the same place are removed first.
fn append_at_exits(cfg: &mut Cfg, call: &FixCall) {
    if let FixCall::Release { place, .. } = call {
        for block in &mut cfg.blocks {
            block
                .stmts
                .retain(|s| s.kind != (StmtKind::ReleaseCall { place: *place }));
        }
    }
    for block in &mut cfg.blocks {
        if !matches!(block.terminator, Terminator::Exit) {
            continue;
        }
        let at = if matches!(
            block.stmts.last().map(|s| &s.kind),
            Some(StmtKind::Return { .. })
        ) {
            block.stmts.len() - 1
        } else {
            block.stmts.len()
        };
        block
            .stmts
            .insert(at, Stmt::new(stmt_for(call), Span::default()));
    }
}

fn stmt_for(call: &FixCall) -> StmtKind {
    match call {
        FixCall::Release { place, .. } => StmtKind::ReleaseCall { place: *place },
        FixCall::ChainThis { flag } => StmtKind::ChainCall {
            target: ChainTarget::This,
            flag: Some(*flag),
        },
        FixCall::ChainBase => StmtKind::ChainCall {
            target: ChainTarget::Base,
            flag: None,
        },
    }
}

fn synthesize(
    model: &mut SemanticModel,
    ty: TypeId,
    teardown: bool,
    skeleton: Option<Skeleton>,
    call: &FixCall,
) {
    let release = stmt_for(call);

    if teardown {
        let mut method = blank("tearDown", ty, body_of(vec![release]));
        method.is_teardown = true;
        model.attach_method(method);
        return;
    }

    match skeleton {
        Some(Skeleton::VirtualPattern) => {
            let guarded = CfgBuilder::new()
                .entry(|blk| blk.guard_check().set_guard().ret())
                .build();
            let mut overload = blank("dispose", ty, before_guard_set(guarded, release));
            overload.visibility = Visibility::Protected;
            overload.params.push(ParamKind::ReleaseFlag);
            overload.is_virtual = true;
            model.attach_method(overload);

            let forwarder = CfgBuilder::new()
                .entry(|blk| blk.chain_this(true).ret())
                .build();
            model.attach_method(blank("dispose", ty, forwarder));
        }
        Some(Skeleton::OverrideRelease) => {
            let guarded = CfgBuilder::new()
                .entry(|blk| blk.guard_check().set_guard().chain_base().ret())
                .build();
            let mut overriding = blank("dispose", ty, before_guard_set(guarded, release));
            overriding.visibility = Visibility::Protected;
            overriding.params.push(ParamKind::ReleaseFlag);
            overriding.is_override = true;
            model.attach_method(overriding);
        }
        _ => {
            model.attach_method(blank("dispose", ty, body_of(vec![release])));
        }
    }
}

fn body_of(stmts: Vec<StmtKind>) -> Cfg {
    let mut cfg = CfgBuilder::new().entry(|blk| blk.ret()).build();
    for (i, kind) in stmts.into_iter().enumerate() {
        cfg.blocks[0].stmts.insert(i, Stmt::new(kind, Span::default()));
    }
    cfg
}

/// Insert a statement between the guard check and the guard set.
fn before_guard_set(mut cfg: Cfg, kind: StmtKind) -> Cfg {
    let block = &mut cfg.blocks[0];
    let at = block
        .stmts
        .iter()
        .position(|s| matches!(s.kind, StmtKind::SetGuard))
        .unwrap_or(block.stmts.len());
    block.stmts.insert(at, Stmt::new(kind, Span::default()));
    cfg
}

fn blank(name: &str, owner: TypeId, body: Cfg) -> MethodSymbol {
    MethodSymbol {
        id: MethodId(0), // reassigned by attach
        owner,
        name: name.to_string(),
        span: Span::default(),
        visibility: Visibility::Public,
        params: Vec::new(),
        is_virtual: false,
        is_override: false,
        explicit_interface: false,
        is_setup: false,
        is_teardown: false,
        body: Some(body),
    }
}
