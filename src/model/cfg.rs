//! Control-flow graphs and the statement IR the checker consumes.
//!
//! The statement set is deliberately closed: it captures exactly the
//! operations that affect disposal obligations (creation, release,
//! chain calls, guard handling, escapes) and nothing else. The host
//! lowers real method bodies into this shape.

use serde::{Deserialize, Serialize};

use super::ids::{BlockId, LocalId, MemberId, Span, TypeId};

/// A storage location an obligation can attach to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Place {
    Local(LocalId),
    Member(MemberId),
    Param(u32),
}

/// Where an assigned value comes from. This is what ownership
/// classification keys on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rvalue {
    /// Construction expression (`new T(...)`).
    New(TypeId),
    /// Factory call returning a fresh value the caller owns.
    Factory(TypeId),
    /// Value arrived through a parameter of the enclosing scope.
    Param(u32),
    /// Read through a member owned elsewhere.
    MemberRead(MemberId),
    /// Assigned from an external property or source the analysis cannot
    /// see into.
    External(TypeId),
    /// Transfer from another place in the same scope.
    Move(Place),
}

/// External sinks a value can be stored into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SinkKind {
    /// Static or otherwise process-lifetime storage.
    Static,
    /// A shared collection or object owned outside this scope.
    Shared,
}

/// Receiver of a forwarding release call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainTarget {
    /// `this.Release(flag)`: forward to an overload on the same type.
    This,
    /// `base.Release(..)`: forward to the base implementation.
    Base,
}

/// One statement, positioned for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

impl Stmt {
    pub fn new(kind: StmtKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// The closed statement vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StmtKind {
    /// `place = value`
    Assign { place: Place, value: Rvalue },
    /// A call that releases the value held by `place`.
    ReleaseCall { place: Place },
    /// Forwarding call in a dispose chain, with the release flag when
    /// the target is the two-method overload.
    ChainCall { target: ChainTarget, flag: Option<bool> },
    /// `if (released) return;`, the re-entrancy guard.
    GuardCheckReturn,
    /// `released = true;`
    SetGuard,
    /// Any other call; relevant when the callee signature is a
    /// configured ownership sink.
    Call { callee: String, args: Vec<Place> },
    /// Store into an external sink.
    Store { sink: SinkKind, place: Place },
    /// Return, optionally carrying a value out of the scope.
    Return { place: Option<Place> },
}

/// Kind of a control-flow edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeKind {
    /// Ordinary fall-through or branch.
    Normal,
    /// Exceptional unwinding; may bypass releases placed on the normal
    /// path.
    Exception,
}

/// One outgoing edge of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub to: BlockId,
    pub kind: EdgeKind,
}

impl Edge {
    pub fn normal(to: BlockId) -> Self {
        Self {
            to,
            kind: EdgeKind::Normal,
        }
    }

    pub fn exception(to: BlockId) -> Self {
        Self {
            to,
            kind: EdgeKind::Exception,
        }
    }
}

/// How a block ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Terminator {
    /// Unconditional jump.
    Goto(BlockId),
    /// Conditional or multi-way branch; loops are ordinary back edges
    /// (the checker's fixpoint collapses iteration counts).
    Branch(Vec<Edge>),
    /// Scope exit.
    Exit,
}

/// A basic block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    pub stmts: Vec<Stmt>,
    pub terminator: Terminator,
}

/// A releasing-block construct (`using`-style): the held place is
/// guaranteed released on every exit of `blocks`, including exceptional
/// ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsingScope {
    pub place: Place,
    pub blocks: Vec<BlockId>,
}

/// Control-flow graph for one method body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cfg {
    pub entry: BlockId,
    pub blocks: Vec<Block>,
    pub using_scopes: Vec<UsingScope>,
}

impl Cfg {
    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.iter().find(|b| b.id == id)
    }

    /// Outgoing edges of a block.
    pub fn successors(&self, id: BlockId) -> Vec<Edge> {
        match self.block(id).map(|b| &b.terminator) {
            Some(Terminator::Goto(to)) => vec![Edge::normal(*to)],
            Some(Terminator::Branch(edges)) => edges.clone(),
            Some(Terminator::Exit) | None => Vec::new(),
        }
    }

    /// Whether `block` sits inside a releasing scope guaranteeing `place`.
    pub fn in_using_scope(&self, place: Place, block: BlockId) -> bool {
        self.using_scopes
            .iter()
            .any(|u| u.place == place && u.blocks.contains(&block))
    }

    /// Statements of every block, for scans that do not need path
    /// sensitivity.
    pub fn all_stmts(&self) -> impl Iterator<Item = &Stmt> {
        self.blocks.iter().flat_map(|b| b.stmts.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_block_cfg() -> Cfg {
        Cfg {
            entry: BlockId(0),
            blocks: vec![
                Block {
                    id: BlockId(0),
                    stmts: vec![],
                    terminator: Terminator::Branch(vec![
                        Edge::normal(BlockId(1)),
                        Edge::exception(BlockId(1)),
                    ]),
                },
                Block {
                    id: BlockId(1),
                    stmts: vec![],
                    terminator: Terminator::Exit,
                },
            ],
            using_scopes: vec![UsingScope {
                place: Place::Local(LocalId(0)),
                blocks: vec![BlockId(0)],
            }],
        }
    }

    #[test]
    fn successors_follow_terminators() {
        let cfg = two_block_cfg();
        assert_eq!(cfg.successors(BlockId(0)).len(), 2);
        assert!(cfg.successors(BlockId(1)).is_empty());
    }

    #[test]
    fn using_scope_membership() {
        let cfg = two_block_cfg();
        let place = Place::Local(LocalId(0));
        assert!(cfg.in_using_scope(place, BlockId(0)));
        assert!(!cfg.in_using_scope(place, BlockId(1)));
        assert!(!cfg.in_using_scope(Place::Local(LocalId(1)), BlockId(0)));
    }
}
