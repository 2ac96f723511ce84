//! Text rendering of violation reports, rustc-diagnostic style.

use crate::analysis::{FixCall, FixDescriptor, InsertionPoint, Skeleton, Violation, ViolationKind};
use crate::model::{Place, SemanticModel};

/// Render the full report: one diagnostic block per violation plus a
/// summary line.
pub fn render_report(model: &SemanticModel, violations: &[Violation]) -> String {
    let mut output = String::new();

    for violation in violations {
        output.push_str(&format!(
            "error[{}]: {}\n",
            violation.kind.code(),
            headline(violation)
        ));
        output.push_str(&format!(
            "  --> {} ({})\n",
            violation.location.span, violation.location.symbol
        ));
        if let Some(fix) = &violation.fix {
            output.push_str(&format!("   = fix: {}\n", describe_fix(model, fix)));
        }
        output.push('\n');
    }

    if violations.is_empty() {
        output.push_str("no violations\n");
    } else {
        output.push_str(&format!("{} violation(s)\n", violations.len()));
    }
    output
}

/// Serialize the report for machine consumers.
pub fn render_json(violations: &[Violation]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(violations)
}

fn headline(violation: &Violation) -> String {
    let symbol = &violation.location.symbol;
    match violation.kind {
        ViolationKind::Leak => format!("`{symbol}` is never released on some path"),
        ViolationKind::DoubleRelease => format!("`{symbol}` is released more than once"),
        ViolationKind::WrongScope => {
            format!("release of `{symbol}` can be bypassed by an exception")
        }
        ViolationKind::BrokenChain => {
            format!("`{symbol}` breaks the virtual release chain")
        }
        ViolationKind::MissingBaseCall => {
            format!("`{symbol}` overrides a release method without calling base")
        }
    }
}

fn describe_fix(model: &SemanticModel, fix: &FixDescriptor) -> String {
    let call = fix.call.as_ref().map(|c| call_text(model, c));
    match &fix.insertion {
        InsertionPoint::MethodEnd(method) => {
            let path = model.method_path(*method);
            match call {
                Some(call) => format!("insert {call} at the end of `{path}`"),
                None => format!("edit `{path}`"),
            }
        }
        InsertionPoint::NewMethod { ty, teardown } => {
            let name = model.ty(*ty).map(|t| t.name.as_str()).unwrap_or("<type>");
            let what = match (teardown, fix.synthesize) {
                (true, _) => "a teardown method",
                (false, Some(Skeleton::VirtualPattern)) => {
                    "the virtual release pattern"
                }
                (false, Some(Skeleton::OverrideRelease)) => {
                    "an override of the inherited release method"
                }
                (false, _) => "a release method",
            };
            match call {
                Some(call) => format!("add {what} to `{name}` containing {call}"),
                None => format!("add {what} to `{name}`"),
            }
        }
    }
}

fn call_text(model: &SemanticModel, call: &FixCall) -> String {
    match call {
        FixCall::Release { place, guarded } => {
            let target = place_name(model, *place);
            if *guarded {
                format!("a guarded release of `{target}`")
            } else {
                format!("a release of `{target}`")
            }
        }
        FixCall::ChainThis { flag } => {
            format!("a forwarding call to the flag overload with `{flag}`")
        }
        FixCall::ChainBase => "a call to the base release method".to_string(),
    }
}

fn place_name(model: &SemanticModel, place: Place) -> String {
    match place {
        Place::Member(m) => model.member_path(m),
        Place::Local(l) => format!("local{}", l.0),
        Place::Param(i) => format!("param{}", i),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{Analyzer, CancelToken, Config};
    use crate::testing::{CfgBuilder, ModelBuilder};

    #[test]
    fn report_carries_code_symbol_and_fix() {
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
        let model = b.build();

        let violations = Analyzer::new(Config::default())
            .analyze_all(&model, &CancelToken::new())
            .unwrap();
        let text = render_report(&model, &violations);

        assert!(text.contains("error[LEAK]"));
        assert!(text.contains("C.m::local0"));
        assert!(text.contains("fix:"));
        assert!(text.contains("1 violation(s)"));
    }

    #[test]
    fn empty_report_says_so() {
        let model = ModelBuilder::new().build();
        assert_eq!(render_report(&model, &[]), "no violations\n");
    }

    #[test]
    fn json_report_roundtrips() {
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
        let model = b.build();

        let violations = Analyzer::new(Config::default())
            .analyze_all(&model, &CancelToken::new())
            .unwrap();
        let json = render_json(&violations).unwrap();
        let parsed: Vec<crate::analysis::Violation> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, violations);
    }
}
