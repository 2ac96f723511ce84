//! Whole-pipeline properties: determinism, suppression, cancellation,
//! and per-symbol failure isolation.

use releasecheck::analysis::{Analyzer, CancelToken, Config, ViolationKind};
use releasecheck::model::TypeId;
use releasecheck::testing::{assert_clean, assert_violations, CfgBuilder, ModelBuilder};
use releasecheck::SemanticModel;

fn leaky_model() -> (SemanticModel, TypeId) {
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
    (b.build(), c)
}

#[test]
fn unchanged_model_reports_identically() {
    let (model, _) = leaky_model();
    let analyzer = Analyzer::new(Config::default());
    let cancel = CancelToken::new();

    let first = analyzer.analyze_all(&model, &cancel).unwrap();
    let second = analyzer.analyze_all(&model, &cancel).unwrap();
    assert_eq!(first, second);
    assert!(!first.is_empty());
}

#[test]
fn suppressed_type_is_skipped_entirely() {
    let (model, c) = leaky_model();
    let analyzer = Analyzer::new(Config::default().with_suppression(c));

    assert_clean(&analyzer.analyze_all(&model, &CancelToken::new()).unwrap());
}

#[test]
fn cancellation_aborts_with_interrupted() {
    let (model, _) = leaky_model();
    let cancel = CancelToken::new();
    cancel.cancel();

    let err = Analyzer::new(Config::default())
        .analyze_all(&model, &cancel)
        .unwrap_err();
    assert!(err.is_interrupt());
}

#[test]
fn cyclic_inheritance_poisons_only_its_own_types() {
    let mut b = ModelBuilder::new();
    let disposable = b.disposable_leaf("Disposable");
    // ids are sequential: A is 1, B is 2; point them at each other
    b.ty("A").base(TypeId(2)).finish();
    b.ty("B").base(TypeId(1)).finish();
    b.ty("C")
        .method("m", |m| {
            m.body(
                CfgBuilder::new()
                    .entry(|blk| blk.assign_new(0, disposable).ret())
                    .build(),
            )
        })
        .finish();
    let model = b.build();

    // the malformed chain is skipped; the healthy type still reports
    let report = Analyzer::new(Config::default())
        .analyze_all(&model, &CancelToken::new())
        .unwrap();
    assert_violations(&report, &[(ViolationKind::Leak, "C.m::local0")]);
}

#[test]
fn contract_cache_fills_during_a_run() {
    let (model, _) = leaky_model();
    let analyzer = Analyzer::new(Config::default());

    analyzer.analyze_all(&model, &CancelToken::new()).unwrap();
    assert!(!analyzer.cache().is_empty());
}

#[test]
fn model_serialization_roundtrips() {
    let (model, _) = leaky_model();
    let json = serde_json::to_string(&model).unwrap();
    let restored: SemanticModel = serde_json::from_str(&json).unwrap();

    let analyzer = Analyzer::new(Config::default());
    let cancel = CancelToken::new();
    assert_eq!(
        analyzer.analyze_all(&model, &cancel).unwrap(),
        analyzer.analyze_all(&restored, &cancel).unwrap()
    );
}
