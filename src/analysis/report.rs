//! Violations, fix descriptors, and deterministic report ordering.

use serde::{Deserialize, Serialize};

use crate::model::{MethodId, Place, SemanticModel, Span, TypeId};

/// What went wrong with an obligation. Ordering is part of the report
/// contract: within one location, kinds sort in this declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ViolationKind {
    /// At least one exit path never releases the owned value.
    Leak,
    /// A release is reachable twice on one path, or a manual release
    /// coexists with a releasing-block construct.
    DoubleRelease,
    /// Release exists but an earlier exception path bypasses it.
    WrongScope,
    /// A virtual-pattern release method misses its forwarding call or
    /// its re-entrancy guard.
    BrokenChain,
    /// An override of a chain release method never calls base.
    MissingBaseCall,
}

impl ViolationKind {
    /// Stable rule code, 1:1 with the documented rules.
    pub fn code(&self) -> &'static str {
        match self {
            ViolationKind::Leak => "LEAK",
            ViolationKind::DoubleRelease => "DOUBLE_RELEASE",
            ViolationKind::WrongScope => "WRONG_SCOPE",
            ViolationKind::BrokenChain => "BROKEN_CHAIN",
            ViolationKind::MissingBaseCall => "MISSING_BASE_CALL",
        }
    }
}

/// Where a violation points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub span: Span,
    /// Readable symbol path, e.g. `C.stream` or `C.dispose`.
    pub symbol: String,
    pub ty: Option<TypeId>,
    pub method: Option<MethodId>,
}

/// Where the fix collaborator should insert the generated code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InsertionPoint {
    /// Append before every exit of an existing method body.
    MethodEnd(MethodId),
    /// Synthesize a new method on the type. `teardown` selects the
    /// setup/teardown idiom over a plain release method.
    NewMethod { ty: TypeId, teardown: bool },
}

/// The call expression the fix inserts or moves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FixCall {
    /// Release the value held by `place`; `guarded` selects the
    /// null-conditional form (`value?.Dispose()`).
    Release { place: Place, guarded: bool },
    /// Forward to the flag overload on the same type.
    ChainThis { flag: bool },
    /// Call the base implementation.
    ChainBase,
}

/// Declaration skeleton the fix must synthesize when no release method
/// exists at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Skeleton {
    /// A plain public release method.
    ReleaseMethod,
    /// The two-method virtual-pattern pair.
    VirtualPattern,
    /// An override of an inherited release slot; the inherited body
    /// cannot name this type's members.
    OverrideRelease,
}

/// Structured edit description handed to the fix collaborator. Never a
/// text edit; the host renders it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixDescriptor {
    pub insertion: InsertionPoint,
    pub call: Option<FixCall>,
    pub synthesize: Option<Skeleton>,
}

/// One finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub kind: ViolationKind,
    pub location: Location,
    pub fix: Option<FixDescriptor>,
}

impl Violation {
    pub fn new(kind: ViolationKind, location: Location) -> Self {
        Self {
            kind,
            location,
            fix: None,
        }
    }

    pub fn with_fix(mut self, fix: FixDescriptor) -> Self {
        self.fix = Some(fix);
        self
    }
}

/// Build a location from a member place within a type.
pub fn place_location(
    model: &SemanticModel,
    ty: Option<TypeId>,
    method: Option<MethodId>,
    place: Place,
    span: Span,
) -> Location {
    let symbol = match place {
        Place::Member(m) => model.member_path(m),
        Place::Local(l) => match method {
            Some(m) => format!("{}::local{}", model.method_path(m), l.0),
            None => format!("local{}", l.0),
        },
        Place::Param(i) => match method {
            Some(m) => format!("{}::param{}", model.method_path(m), i),
            None => format!("param{}", i),
        },
    };
    Location {
        span,
        symbol,
        ty,
        method,
    }
}

/// Order violations deterministically (source location, then kind) and
/// drop exact duplicates. Re-running an unchanged model yields a
/// byte-identical sequence.
pub fn finalize(mut violations: Vec<Violation>) -> Vec<Violation> {
    violations.sort_by(|a, b| {
        (a.location.span, a.kind, &a.location.symbol).cmp(&(
            b.location.span,
            b.kind,
            &b.location.symbol,
        ))
    });
    violations.dedup();
    violations
}
