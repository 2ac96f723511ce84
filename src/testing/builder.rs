//! Fluent builders for semantic models and method bodies.
//!
//! Tests describe the shape under analysis instead of hand-assembling
//! symbol structs. Ids are assigned in declaration order and spans get
//! distinct, increasing line numbers so report ordering is observable.

use crate::model::{
    Block, BlockId, Cfg, ChainTarget, Edge, LocalId, Member, MemberId, MemberKind, MethodId,
    MethodSymbol, ParamKind, Place, Rvalue, SemanticModel, SinkKind, Span, Stmt, StmtKind,
    Terminator, TypeId, TypeSymbol, UsingScope, Visibility,
};

/// Accumulates types and methods, then freezes them into a model.
#[derive(Debug, Default)]
pub struct ModelBuilder {
    types: Vec<TypeSymbol>,
    methods: Vec<MethodSymbol>,
    next_member: u32,
    next_line: u32,
}

impl ModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new type declaration.
    pub fn ty(&mut self, name: &str) -> TypeBuilder<'_> {
        let id = TypeId(self.types.len() as u32);
        let span = self.next_span();
        TypeBuilder {
            owner: self,
            ty: TypeSymbol {
                id,
                name: name.to_string(),
                span,
                base: None,
                declares_disposable: false,
                sealed: false,
                members: Vec::new(),
                methods: Vec::new(),
            },
            methods: Vec::new(),
        }
    }

    /// A minimal disposable type, for use as a field or local type.
    pub fn disposable_leaf(&mut self, name: &str) -> TypeId {
        self.ty(name).disposable().guarded_release().finish()
    }

    pub fn build(self) -> SemanticModel {
        let mut model = SemanticModel::new(1);
        for ty in self.types {
            model.push_type(ty);
        }
        for method in self.methods {
            model.push_method(method);
        }
        model
    }

    fn next_span(&mut self) -> Span {
        self.next_line += 1;
        Span::new(self.next_line, 1)
    }
}

/// Builds one [`TypeSymbol`] and its declared methods.
pub struct TypeBuilder<'b> {
    owner: &'b mut ModelBuilder,
    ty: TypeSymbol,
    methods: Vec<MethodSymbol>,
}

impl TypeBuilder<'_> {
    pub fn disposable(mut self) -> Self {
        self.ty.declares_disposable = true;
        self
    }

    pub fn sealed(mut self) -> Self {
        self.ty.sealed = true;
        self
    }

    pub fn base(mut self, base: TypeId) -> Self {
        self.ty.base = Some(base);
        self
    }

    /// Declare a field of the given type. Member ids are global and
    /// sequential in declaration order.
    pub fn field(mut self, name: &str, ty: TypeId) -> Self {
        let id = MemberId(self.owner.next_member);
        self.owner.next_member += 1;
        let span = self.owner.next_span();
        self.ty.members.push(Member {
            id,
            name: name.to_string(),
            span,
            ty,
            kind: MemberKind::Field,
        });
        self
    }

    /// Declare a method, customized through the closure.
    pub fn method(mut self, name: &str, f: impl FnOnce(MethodBuilder) -> MethodBuilder) -> Self {
        let span = self.owner.next_span();
        let built = f(MethodBuilder::new(name, span));
        self.methods.push(built.sym);
        self
    }

    /// A public parameterless release method with a re-entrancy guard.
    pub fn guarded_release(self) -> Self {
        self.method("dispose", |m| {
            m.body(
                CfgBuilder::new()
                    .entry(|blk| blk.guard_check().set_guard().ret())
                    .build(),
            )
        })
    }

    /// A release method reachable only through explicit interface
    /// qualification.
    pub fn explicit_release(self) -> Self {
        self.method("dispose", |m| {
            m.explicit().body(
                CfgBuilder::new()
                    .entry(|blk| blk.guard_check().set_guard().ret())
                    .build(),
            )
        })
    }

    /// The two-method idiom: a public forwarder plus a protected
    /// overridable flag overload.
    pub fn virtual_pattern(self) -> Self {
        self.method("dispose", |m| {
            m.body(
                CfgBuilder::new()
                    .entry(|blk| blk.chain_this(true).ret())
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
    }

    pub fn finish(self) -> TypeId {
        let TypeBuilder {
            owner,
            mut ty,
            methods,
        } = self;
        for mut method in methods {
            let id = MethodId(owner.methods.len() as u32);
            method.id = id;
            method.owner = ty.id;
            ty.methods.push(id);
            owner.methods.push(method);
        }
        let id = ty.id;
        owner.types.push(ty);
        id
    }
}

/// Builds one [`MethodSymbol`]; defaults to public, parameterless, no
/// body.
pub struct MethodBuilder {
    sym: MethodSymbol,
}

impl MethodBuilder {
    fn new(name: &str, span: Span) -> Self {
        Self {
            sym: MethodSymbol {
                id: MethodId(0), // assigned at finish
                owner: TypeId(0),
                name: name.to_string(),
                span,
                visibility: Visibility::Public,
                params: Vec::new(),
                is_virtual: false,
                is_override: false,
                explicit_interface: false,
                is_setup: false,
                is_teardown: false,
                body: None,
            },
        }
    }

    pub fn param(mut self, ty: TypeId) -> Self {
        self.sym.params.push(ParamKind::Value(ty));
        self
    }

    pub fn release_flag(mut self) -> Self {
        self.sym.params.push(ParamKind::ReleaseFlag);
        self
    }

    pub fn protected(mut self) -> Self {
        self.sym.visibility = Visibility::Protected;
        self
    }

    pub fn private(mut self) -> Self {
        self.sym.visibility = Visibility::Private;
        self
    }

    pub fn overridable(mut self) -> Self {
        self.sym.is_virtual = true;
        self
    }

    pub fn overrides(mut self) -> Self {
        self.sym.is_override = true;
        self
    }

    pub fn explicit(mut self) -> Self {
        self.sym.explicit_interface = true;
        self
    }

    pub fn setup(mut self) -> Self {
        self.sym.is_setup = true;
        self
    }

    pub fn teardown(mut self) -> Self {
        self.sym.is_teardown = true;
        self
    }

    pub fn body(mut self, cfg: Cfg) -> Self {
        self.sym.body = Some(cfg);
        self
    }
}

/// Builds a [`Cfg`] block by block. The first block is the entry.
#[derive(Debug, Default)]
pub struct CfgBuilder {
    blocks: Vec<Block>,
    scopes: Vec<UsingScope>,
    next_line: u32,
}

impl CfgBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the entry block.
    pub fn entry(self, f: impl FnOnce(BlockBuilder) -> BlockBuilder) -> Self {
        self.block(f)
    }

    /// Add the next block; ids follow insertion order.
    pub fn block(mut self, f: impl FnOnce(BlockBuilder) -> BlockBuilder) -> Self {
        let id = BlockId(self.blocks.len() as u32);
        let built = f(BlockBuilder::new(id, self.next_line));
        self.next_line = built.line;
        self.blocks.push(built.into_block());
        self
    }

    /// Wrap blocks in a releasing scope guaranteeing the local.
    pub fn using_scope(mut self, local: u32, blocks: &[u32]) -> Self {
        self.scopes.push(UsingScope {
            place: Place::Local(LocalId(local)),
            blocks: blocks.iter().map(|b| BlockId(*b)).collect(),
        });
        self
    }

    pub fn build(self) -> Cfg {
        Cfg {
            entry: BlockId(0),
            blocks: self.blocks,
            using_scopes: self.scopes,
        }
    }
}

/// Builds one basic block; statement spans increase line by line.
pub struct BlockBuilder {
    id: BlockId,
    stmts: Vec<Stmt>,
    edges: Vec<Edge>,
    exits: bool,
    line: u32,
}

impl BlockBuilder {
    fn new(id: BlockId, line: u32) -> Self {
        Self {
            id,
            stmts: Vec::new(),
            edges: Vec::new(),
            exits: false,
            line,
        }
    }

    fn push(mut self, kind: StmtKind) -> Self {
        self.line += 1;
        let span = Span::new(self.line, 1);
        self.stmts.push(Stmt::new(kind, span));
        self
    }

    pub fn assign_new(self, local: u32, ty: TypeId) -> Self {
        self.push(StmtKind::Assign {
            place: Place::Local(LocalId(local)),
            value: Rvalue::New(ty),
        })
    }

    pub fn assign_factory(self, local: u32, ty: TypeId) -> Self {
        self.push(StmtKind::Assign {
            place: Place::Local(LocalId(local)),
            value: Rvalue::Factory(ty),
        })
    }

    pub fn assign_param(self, local: u32, param: u32) -> Self {
        self.push(StmtKind::Assign {
            place: Place::Local(LocalId(local)),
            value: Rvalue::Param(param),
        })
    }

    pub fn assign_external(self, local: u32, ty: TypeId) -> Self {
        self.push(StmtKind::Assign {
            place: Place::Local(LocalId(local)),
            value: Rvalue::External(ty),
        })
    }

    pub fn assign_member_read(self, local: u32, member: u32) -> Self {
        self.push(StmtKind::Assign {
            place: Place::Local(LocalId(local)),
            value: Rvalue::MemberRead(MemberId(member)),
        })
    }

    pub fn assign_member_new(self, member: u32, ty: TypeId) -> Self {
        self.push(StmtKind::Assign {
            place: Place::Member(MemberId(member)),
            value: Rvalue::New(ty),
        })
    }

    pub fn assign_member_param(self, member: u32, param: u32) -> Self {
        self.push(StmtKind::Assign {
            place: Place::Member(MemberId(member)),
            value: Rvalue::Param(param),
        })
    }

    pub fn assign_member_move(self, member: u32, local: u32) -> Self {
        self.push(StmtKind::Assign {
            place: Place::Member(MemberId(member)),
            value: Rvalue::Move(Place::Local(LocalId(local))),
        })
    }

    pub fn move_local(self, dst: u32, src: u32) -> Self {
        self.push(StmtKind::Assign {
            place: Place::Local(LocalId(dst)),
            value: Rvalue::Move(Place::Local(LocalId(src))),
        })
    }

    pub fn release_local(self, local: u32) -> Self {
        self.push(StmtKind::ReleaseCall {
            place: Place::Local(LocalId(local)),
        })
    }

    pub fn release_member(self, member: u32) -> Self {
        self.push(StmtKind::ReleaseCall {
            place: Place::Member(MemberId(member)),
        })
    }

    pub fn chain_this(self, flag: bool) -> Self {
        self.push(StmtKind::ChainCall {
            target: ChainTarget::This,
            flag: Some(flag),
        })
    }

    pub fn chain_base(self) -> Self {
        self.push(StmtKind::ChainCall {
            target: ChainTarget::Base,
            flag: None,
        })
    }

    pub fn guard_check(self) -> Self {
        self.push(StmtKind::GuardCheckReturn)
    }

    pub fn set_guard(self) -> Self {
        self.push(StmtKind::SetGuard)
    }

    pub fn call(self, callee: &str, locals: &[u32]) -> Self {
        self.push(StmtKind::Call {
            callee: callee.to_string(),
            args: locals.iter().map(|l| Place::Local(LocalId(*l))).collect(),
        })
    }

    pub fn store_static(self, local: u32) -> Self {
        self.push(StmtKind::Store {
            sink: SinkKind::Static,
            place: Place::Local(LocalId(local)),
        })
    }

    pub fn ret(mut self) -> Self {
        self.exits = true;
        self
    }

    pub fn ret_local(self, local: u32) -> Self {
        self.push(StmtKind::Return {
            place: Some(Place::Local(LocalId(local))),
        })
        .ret()
    }

    pub fn ret_member(self, member: u32) -> Self {
        self.push(StmtKind::Return {
            place: Some(Place::Member(MemberId(member))),
        })
        .ret()
    }

    pub fn goto(mut self, to: u32) -> Self {
        self.edges.push(Edge::normal(BlockId(to)));
        self
    }

    pub fn branch_to(mut self, targets: &[u32]) -> Self {
        for to in targets {
            self.edges.push(Edge::normal(BlockId(*to)));
        }
        self
    }

    /// Add an exceptional edge; combine with `goto`/`branch_to` for the
    /// normal continuation.
    pub fn exception_to(mut self, to: u32) -> Self {
        self.edges.push(Edge::exception(BlockId(to)));
        self
    }

    fn into_block(self) -> Block {
        let terminator = if self.exits {
            Terminator::Exit
        } else if self.edges.len() == 1 && self.edges[0].kind == crate::model::EdgeKind::Normal {
            Terminator::Goto(self.edges[0].to)
        } else if !self.edges.is_empty() {
            Terminator::Branch(self.edges)
        } else {
            Terminator::Exit
        };
        Block {
            id: self.id,
            stmts: self.stmts,
            terminator,
        }
    }
}
