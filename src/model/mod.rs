//! The semantic model supplied by the host compiler/IDE integration.
//!
//! The engine does not parse source text or build control flow itself; the
//! collaborator hands us an already-materialized symbol graph plus one
//! control-flow graph per method body. Everything in this module is
//! read-only for the duration of an analysis pass.

mod cfg;
mod ids;
mod store;
mod symbols;

pub use cfg::{
    Block, Cfg, ChainTarget, Edge, EdgeKind, Place, Rvalue, SinkKind, Stmt, StmtKind, Terminator,
    UsingScope,
};
pub use ids::{BlockId, LocalId, MemberId, MethodId, Span, TypeId};
pub use store::SemanticModel;
pub use symbols::{Member, MemberKind, MethodSymbol, ParamKind, TypeSymbol, Visibility};
