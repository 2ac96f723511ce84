//! Applying a fix descriptor to the model removes the violation it was
//! issued for without introducing new ones.

use releasecheck::analysis::{Analyzer, CancelToken, Config, InsertionPoint, ViolationKind};
use releasecheck::testing::{apply_fix, assert_clean, assert_violations, CfgBuilder, ModelBuilder};
use releasecheck::SemanticModel;

fn analyze(model: &SemanticModel) -> Vec<releasecheck::Violation> {
    Analyzer::new(Config::default())
        .analyze_all(model, &CancelToken::new())
        .unwrap()
}

fn roundtrip(mut model: SemanticModel, kind: ViolationKind) {
    let report = analyze(&model);
    let violation = report
        .iter()
        .find(|v| v.kind == kind)
        .unwrap_or_else(|| panic!("expected a {kind:?} in {report:#?}"));

    apply_fix(&mut model, violation);
    assert_clean(&analyze(&model));
}

#[test]
fn local_leak_fix() {
    let mut b = ModelBuilder::new();
    let disposable = b.disposable_leaf("Disposable");
    b.ty("C")
        .method("m", |m| {
            m.body(
                CfgBuilder::new()
                    .entry(|blk| blk.assign_new(0, disposable).ret())
                    .build(),
            )
        })
        .finish();

    roundtrip(b.build(), ViolationKind::Leak);
}

#[test]
fn wrong_scope_fix_covers_every_exit() {
    let mut b = ModelBuilder::new();
    let disposable = b.disposable_leaf("Disposable");
    b.ty("C")
        .method("m", |m| {
            m.body(
                CfgBuilder::new()
                    .entry(|blk| blk.assign_new(0, disposable).goto(1).exception_to(2))
                    .block(|blk| blk.release_local(0).ret())
                    .block(|blk| blk.ret())
                    .build(),
            )
        })
        .finish();

    // the release moves to every exit, the unwind one included
    roundtrip(b.build(), ViolationKind::WrongScope);
}

#[test]
fn member_leak_fix_synthesizes_the_virtual_pattern() {
    let mut b = ModelBuilder::new();
    let disposable = b.disposable_leaf("Disposable");
    b.ty("C")
        .disposable()
        .field("stream", disposable)
        .method("init", |m| {
            m.body(
                CfgBuilder::new()
                    .entry(|blk| blk.assign_member_new(0, disposable).ret())
                    .build(),
            )
        })
        .finish();

    roundtrip(b.build(), ViolationKind::Leak);
}

#[test]
fn member_leak_fix_inserts_into_the_existing_dispose() {
    let mut b = ModelBuilder::new();
    let disposable = b.disposable_leaf("Disposable");
    b.ty("C")
        .disposable()
        .field("stream", disposable)
        .method("init", |m| {
            m.body(
                CfgBuilder::new()
                    .entry(|blk| blk.assign_member_new(0, disposable).ret())
                    .build(),
            )
        })
        .method("dispose", |m| {
            m.body(
                CfgBuilder::new()
                    .entry(|blk| blk.guard_check().set_guard().ret())
                    .build(),
            )
        })
        .finish();

    roundtrip(b.build(), ViolationKind::Leak);
}

#[test]
fn moved_local_leak_fix() {
    let mut b = ModelBuilder::new();
    let disposable = b.disposable_leaf("Disposable");
    b.ty("C")
        .method("m", |m| {
            m.body(
                CfgBuilder::new()
                    .entry(|blk| blk.assign_new(0, disposable).move_local(1, 0).ret())
                    .build(),
            )
        })
        .finish();

    // the release lands on the move destination
    roundtrip(b.build(), ViolationKind::Leak);
}

#[test]
fn inherited_member_leak_fix_adds_an_override() {
    let mut b = ModelBuilder::new();
    let disposable = b.disposable_leaf("Disposable");
    let base = b.ty("Base").disposable().virtual_pattern().finish();
    b.ty("Derived")
        .base(base)
        .field("stream", disposable)
        .method("init", |m| {
            m.body(
                CfgBuilder::new()
                    .entry(|blk| blk.assign_member_new(0, disposable).ret())
                    .build(),
            )
        })
        .finish();

    roundtrip(b.build(), ViolationKind::Leak);
}

#[test]
fn existing_teardown_hosts_the_member_release() {
    let mut b = ModelBuilder::new();
    let disposable = b.disposable_leaf("Disposable");
    let fixture = b
        .ty("Fixture")
        .field("stream", disposable)
        .method("init", |m| {
            m.setup().body(
                CfgBuilder::new()
                    .entry(|blk| blk.assign_member_new(0, disposable).ret())
                    .build(),
            )
        })
        .method("cleanup", |m| {
            m.teardown()
                .body(CfgBuilder::new().entry(|blk| blk.ret()).build())
        })
        .finish();
    let mut model = b.build();

    let report = analyze(&model);
    assert_violations(&report, &[(ViolationKind::Leak, "Fixture.stream")]);

    // a teardown already exists, so the fix inserts instead of
    // synthesizing a second one
    let teardown = model.methods_of(fixture).find(|m| m.is_teardown).unwrap().id;
    let fix = report[0].fix.as_ref().unwrap();
    assert_eq!(fix.insertion, InsertionPoint::MethodEnd(teardown));

    apply_fix(&mut model, &report[0]);
    assert_clean(&analyze(&model));
}

#[test]
fn teardown_fix_for_setup_assigned_member() {
    let mut b = ModelBuilder::new();
    let disposable = b.disposable_leaf("Disposable");
    b.ty("Fixture")
        .field("stream", disposable)
        .method("init", |m| {
            m.setup().body(
                CfgBuilder::new()
                    .entry(|blk| blk.assign_member_new(0, disposable).ret())
                    .build(),
            )
        })
        .finish();

    roundtrip(b.build(), ViolationKind::Leak);
}

#[test]
fn broken_chain_fix_adds_the_forwarding_call() {
    let mut b = ModelBuilder::new();
    b.ty("C")
        .disposable()
        .method("dispose", |m| {
            m.body(
                CfgBuilder::new()
                    .entry(|blk| blk.chain_this(false).ret())
                    .build(),
            )
        })
        .method("dispose", |m| {
            m.protected().release_flag().overridable().body(
                CfgBuilder::new()
                    .entry(|blk| blk.guard_check().set_guard().ret())
                    .build(),
            )
        })
        .finish();

    roundtrip(b.build(), ViolationKind::BrokenChain);
}

#[test]
fn missing_base_call_fix_adds_the_base_call() {
    let mut b = ModelBuilder::new();
    let base = b.ty("Base").disposable().virtual_pattern().finish();
    b.ty("Derived")
        .base(base)
        .method("dispose", |m| {
            m.protected().release_flag().overrides().body(
                CfgBuilder::new()
                    .entry(|blk| blk.set_guard().ret())
                    .build(),
            )
        })
        .finish();

    roundtrip(b.build(), ViolationKind::MissingBaseCall);
}

#[test]
fn applying_a_fix_bumps_the_snapshot() {
    let mut b = ModelBuilder::new();
    let disposable = b.disposable_leaf("Disposable");
    b.ty("C")
        .method("m", |m| {
            m.body(
                CfgBuilder::new()
                    .entry(|blk| blk.assign_new(0, disposable).ret())
                    .build(),
            )
        })
        .finish();
    let mut model = b.build();
    let before = model.snapshot;

    let report = analyze(&model);
    apply_fix(&mut model, &report[0]);
    assert!(model.snapshot > before);
}
