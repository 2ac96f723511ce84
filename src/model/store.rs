//! The immutable symbol store for one compilation snapshot.

use serde::{Deserialize, Serialize};

use super::ids::{MemberId, MethodId, TypeId};
use super::symbols::{Member, MethodSymbol, TypeSymbol};

/// One compilation snapshot's worth of symbols.
///
/// Ids double as indices: `TypeId(n)` is the nth pushed type. The store
/// is never mutated during analysis; the `snapshot` value keys the
/// process-wide contract cache and changes whenever the host rebuilds
/// the model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SemanticModel {
    pub snapshot: u64,
    types: Vec<TypeSymbol>,
    methods: Vec<MethodSymbol>,
}

impl SemanticModel {
    pub fn new(snapshot: u64) -> Self {
        Self {
            snapshot,
            types: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Register a type; its id must equal the next index.
    pub fn push_type(&mut self, ty: TypeSymbol) -> TypeId {
        debug_assert_eq!(ty.id.0 as usize, self.types.len());
        let id = ty.id;
        self.types.push(ty);
        id
    }

    /// Register a method; its id must equal the next index.
    pub fn push_method(&mut self, method: MethodSymbol) -> MethodId {
        debug_assert_eq!(method.id.0 as usize, self.methods.len());
        let id = method.id;
        self.methods.push(method);
        id
    }

    pub fn ty(&self, id: TypeId) -> Option<&TypeSymbol> {
        self.types.get(id.0 as usize)
    }

    pub fn method(&self, id: MethodId) -> Option<&MethodSymbol> {
        self.methods.get(id.0 as usize)
    }

    /// Locate a member together with its declaring type.
    pub fn member(&self, id: MemberId) -> Option<(&TypeSymbol, &Member)> {
        self.types
            .iter()
            .find_map(|t| t.member(id).map(|m| (t, m)))
    }

    pub fn types(&self) -> impl Iterator<Item = &TypeSymbol> {
        self.types.iter()
    }

    pub fn methods(&self) -> impl Iterator<Item = &MethodSymbol> {
        self.methods.iter()
    }

    /// Methods declared on `ty`, in declaration order.
    pub fn methods_of(&self, ty: TypeId) -> impl Iterator<Item = &MethodSymbol> + '_ {
        self.ty(ty)
            .into_iter()
            .flat_map(move |t| t.methods.iter())
            .filter_map(move |id| self.method(*id))
    }

    /// Readable path for a place-holding symbol, for diagnostics.
    pub fn member_path(&self, id: MemberId) -> String {
        match self.member(id) {
            Some((ty, m)) => format!("{}.{}", ty.name, m.name),
            None => format!("<member {}>", id.0),
        }
    }

    pub fn method_path(&self, id: MethodId) -> String {
        match self.method(id) {
            Some(m) => {
                let owner = self
                    .ty(m.owner)
                    .map(|t| t.name.as_str())
                    .unwrap_or("<type>");
                format!("{}.{}", owner, m.name)
            }
            None => format!("<method {}>", id.0),
        }
    }

    /// Replace a method wholesale. Used by fix application in tests;
    /// callers must bump `snapshot` afterwards.
    pub fn replace_method(&mut self, method: MethodSymbol) {
        let idx = method.id.0 as usize;
        if idx < self.methods.len() {
            self.methods[idx] = method;
        }
    }

    #[cfg(test)]
    pub(crate) fn ty_mut_for_tests(&mut self, id: TypeId) -> &mut TypeSymbol {
        &mut self.types[id.0 as usize]
    }

    /// Attach an additional method to an existing type. Used by fix
    /// application; callers must bump `snapshot` afterwards.
    pub fn attach_method(&mut self, method: MethodSymbol) -> MethodId {
        let owner = method.owner;
        let id = MethodId(self.methods.len() as u32);
        let mut method = method;
        method.id = id;
        self.methods.push(method);
        if let Some(ty) = self.types.get_mut(owner.0 as usize) {
            ty.methods.push(id);
        }
        id
    }
}
