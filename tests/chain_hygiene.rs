//! BROKEN_CHAIN and MISSING_BASE_CALL: the two-method virtual release
//! idiom and its overrides.

use releasecheck::analysis::{Analyzer, CancelToken, Config, FixCall, ViolationKind};
use releasecheck::testing::{assert_clean, assert_violations, CfgBuilder, ModelBuilder};

fn analyze(model: &releasecheck::SemanticModel) -> Vec<releasecheck::Violation> {
    Analyzer::new(Config::default())
        .analyze_all(model, &CancelToken::new())
        .unwrap()
}

#[test]
fn well_formed_virtual_pattern_is_clean() {
    let mut b = ModelBuilder::new();
    b.ty("C").disposable().virtual_pattern().finish();
    let model = b.build();

    assert_clean(&analyze(&model));
}

#[test]
fn forwarder_without_the_true_flag_is_broken() {
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
    let model = b.build();

    let report = analyze(&model);
    assert_violations(&report, &[(ViolationKind::BrokenChain, "C.dispose")]);
    assert!(matches!(
        report[0].fix.as_ref().unwrap().call,
        Some(FixCall::ChainThis { flag: true })
    ));
}

#[test]
fn overload_without_a_guard_is_broken() {
    let mut b = ModelBuilder::new();
    b.ty("C")
        .disposable()
        .method("dispose", |m| {
            m.body(
                CfgBuilder::new()
                    .entry(|blk| blk.chain_this(true).ret())
                    .build(),
            )
        })
        .method("dispose", |m| {
            m.protected()
                .release_flag()
                .overridable()
                .body(CfgBuilder::new().entry(|blk| blk.ret()).build())
        })
        .finish();
    let model = b.build();

    assert_violations(
        &analyze(&model),
        &[(ViolationKind::BrokenChain, "C.dispose")],
    );
}

#[test]
fn guard_set_before_check_is_accepted() {
    let mut b = ModelBuilder::new();
    b.ty("C")
        .disposable()
        .method("dispose", |m| {
            m.body(
                CfgBuilder::new()
                    .entry(|blk| blk.chain_this(true).ret())
                    .build(),
            )
        })
        .method("dispose", |m| {
            m.protected().release_flag().overridable().body(
                CfgBuilder::new()
                    .entry(|blk| blk.set_guard().guard_check().ret())
                    .build(),
            )
        })
        .finish();
    let model = b.build();

    assert_clean(&analyze(&model));
}

#[test]
fn override_without_base_call_reported() {
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
    let model = b.build();

    let report = analyze(&model);
    assert_violations(
        &report,
        &[(ViolationKind::MissingBaseCall, "Derived.dispose")],
    );
    assert!(matches!(
        report[0].fix.as_ref().unwrap().call,
        Some(FixCall::ChainBase)
    ));
}

#[test]
fn override_with_base_call_is_clean() {
    let mut b = ModelBuilder::new();
    let base = b.ty("Base").disposable().virtual_pattern().finish();
    b.ty("Derived")
        .base(base)
        .method("dispose", |m| {
            m.protected().release_flag().overrides().body(
                CfgBuilder::new()
                    .entry(|blk| blk.set_guard().chain_base().ret())
                    .build(),
            )
        })
        .finish();
    let model = b.build();

    assert_clean(&analyze(&model));
}

#[test]
fn plain_direct_release_owes_no_chain_hygiene() {
    let mut b = ModelBuilder::new();
    b.ty("C").disposable().guarded_release().finish();
    let model = b.build();

    assert_clean(&analyze(&model));
}
