//! Type, member, and method symbols.
//!
//! These mirror what the host's semantic model exposes: identity, base
//! type, member lists, and a capability predicate for the disposal
//! contract (`declares_disposable`). The engine never looks deeper than
//! this surface.

use serde::{Deserialize, Serialize};

use super::cfg::Cfg;
use super::ids::{MemberId, MethodId, Span, TypeId};

/// Member accessibility as the host reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Visibility {
    Public,
    Protected,
    Private,
}

/// Kind of a declared member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemberKind {
    Field,
    Property,
}

/// A field or property declared on a type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub name: String,
    pub span: Span,
    /// Static type of the stored value.
    pub ty: TypeId,
    pub kind: MemberKind,
}

/// Parameter shape, reduced to what chain resolution needs to
/// distinguish overloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamKind {
    /// The "releasing via explicit call vs. finalizer" flag of the
    /// two-method tear-down idiom.
    ReleaseFlag,
    /// Any other parameter.
    Value(TypeId),
}

/// A method symbol, optionally carrying a control-flow graph.
///
/// A body of `None` models a symbol from a reference-only assembly: the
/// checker degrades to "cannot verify" for anything that would need to
/// look inside it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodSymbol {
    pub id: MethodId,
    pub owner: TypeId,
    pub name: String,
    pub span: Span,
    pub visibility: Visibility,
    pub params: Vec<ParamKind>,
    pub is_virtual: bool,
    pub is_override: bool,
    /// Declared with explicit interface qualification; not reachable by
    /// ordinary member lookup.
    pub explicit_interface: bool,
    /// Setup-phase method (e.g. a test fixture's SetUp slot).
    pub is_setup: bool,
    /// Teardown-phase method; releases here count toward member
    /// obligations even though the method is not part of the dispose chain.
    pub is_teardown: bool,
    pub body: Option<Cfg>,
}

impl MethodSymbol {
    /// True when the method takes no parameters.
    pub fn is_parameterless(&self) -> bool {
        self.params.is_empty()
    }

    /// True for the protected overload of the two-method idiom: exactly
    /// one parameter, the release flag.
    pub fn takes_release_flag(&self) -> bool {
        matches!(self.params.as_slice(), [ParamKind::ReleaseFlag])
    }
}

/// A type symbol: identity, base link, capability predicate, members.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeSymbol {
    pub id: TypeId,
    pub name: String,
    pub span: Span,
    pub base: Option<TypeId>,
    /// The host's capability predicate: this type structurally implements
    /// the disposal contract itself (not via an ancestor).
    pub declares_disposable: bool,
    pub sealed: bool,
    pub members: Vec<Member>,
    pub methods: Vec<MethodId>,
}

impl TypeSymbol {
    /// Look up a declared member by id.
    pub fn member(&self, id: MemberId) -> Option<&Member> {
        self.members.iter().find(|m| m.id == id)
    }
}
