//! DOUBLE_RELEASE: releasing a value that is already released.

use releasecheck::analysis::{Analyzer, CancelToken, Config, ViolationKind};
use releasecheck::testing::{assert_clean, assert_violations, CfgBuilder, ModelBuilder};

fn analyze(model: &releasecheck::SemanticModel) -> Vec<releasecheck::Violation> {
    Analyzer::new(Config::default())
        .analyze_all(model, &CancelToken::new())
        .unwrap()
}

#[test]
fn sequential_double_release_reported() {
    let mut b = ModelBuilder::new();
    let disposable = b.disposable_leaf("Disposable");
    b.ty("C")
        .method("m", |m| {
            m.body(
                CfgBuilder::new()
                    .entry(|blk| {
                        blk.assign_new(0, disposable)
                            .release_local(0)
                            .release_local(0)
                            .ret()
                    })
                    .build(),
            )
        })
        .finish();
    let model = b.build();

    assert_violations(
        &analyze(&model),
        &[(ViolationKind::DoubleRelease, "C.m::local0")],
    );
}

#[test]
fn maybe_released_is_not_flagged() {
    let mut b = ModelBuilder::new();
    let disposable = b.disposable_leaf("Disposable");
    // released on one branch, then unconditionally after the join; the
    // value is only possibly released at the second call
    b.ty("C")
        .method("m", |m| {
            m.body(
                CfgBuilder::new()
                    .entry(|blk| blk.assign_new(0, disposable).branch_to(&[1, 2]))
                    .block(|blk| blk.release_local(0).goto(3))
                    .block(|blk| blk.goto(3))
                    .block(|blk| blk.release_local(0).ret())
                    .build(),
            )
        })
        .finish();
    let model = b.build();

    assert_clean(&analyze(&model));
}

#[test]
fn manual_release_inside_releasing_scope_reported() {
    let mut b = ModelBuilder::new();
    let disposable = b.disposable_leaf("Disposable");
    b.ty("C")
        .method("m", |m| {
            m.body(
                CfgBuilder::new()
                    .entry(|blk| blk.assign_new(0, disposable).release_local(0).ret())
                    .using_scope(0, &[0])
                    .build(),
            )
        })
        .finish();
    let model = b.build();

    assert_violations(
        &analyze(&model),
        &[(ViolationKind::DoubleRelease, "C.m::local0")],
    );
}

#[test]
fn releasing_scope_alone_is_clean() {
    let mut b = ModelBuilder::new();
    let disposable = b.disposable_leaf("Disposable");
    b.ty("C")
        .method("m", |m| {
            m.body(
                CfgBuilder::new()
                    .entry(|blk| blk.assign_new(0, disposable).ret())
                    .using_scope(0, &[0])
                    .build(),
            )
        })
        .finish();
    let model = b.build();

    assert_clean(&analyze(&model));
}

#[test]
fn member_double_released_in_dispose_reported() {
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
                    .entry(|blk| blk.release_member(0).release_member(0).ret())
                    .build(),
            )
        })
        .finish();
    let model = b.build();

    assert_violations(
        &analyze(&model),
        &[(ViolationKind::DoubleRelease, "C.stream")],
    );
}
