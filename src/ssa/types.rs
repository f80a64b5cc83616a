//! Interned type table for SSA values

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Index of an interned type
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TypeId(pub u32);

/// Structure of a type, as far as the analyzer needs to discriminate.
/// Named types carry their full package path so the oracle can match
/// exactly and reject look-alike packages.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// Built-in scalar (int, string, bool, ...)
    Basic(String),
    /// Defined type, identified by package path and name
    Named { package: String, name: String },
    Pointer(TypeId),
    /// Interface type; None for anonymous interfaces
    Interface { name: Option<String> },
    Tuple(Vec<TypeId>),
    Function,
    Slice(TypeId),
    Array(TypeId),
    Map { key: TypeId, value: TypeId },
    Chan(TypeId),
}

/// Deduplicating type storage. Structurally equal types intern to the
/// same id, so id equality is type equality.
#[derive(Debug, Default, Clone)]
pub struct TypeTable {
    kinds: Vec<TypeKind>,
    interned: HashMap<TypeKind, TypeId>,
}

impl TypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, kind: TypeKind) -> TypeId {
        if let Some(id) = self.interned.get(&kind) {
            return *id;
        }
        let id = TypeId(self.kinds.len() as u32);
        self.kinds.push(kind.clone());
        self.interned.insert(kind, id);
        id
    }

    pub fn kind(&self, id: TypeId) -> &TypeKind {
        &self.kinds[id.0 as usize]
    }

    pub fn basic(&mut self, name: &str) -> TypeId {
        self.intern(TypeKind::Basic(name.to_string()))
    }

    pub fn named(&mut self, package: &str, name: &str) -> TypeId {
        self.intern(TypeKind::Named {
            package: package.to_string(),
            name: name.to_string(),
        })
    }

    pub fn pointer_to(&mut self, elem: TypeId) -> TypeId {
        self.intern(TypeKind::Pointer(elem))
    }

    pub fn interface(&mut self, name: Option<&str>) -> TypeId {
        self.intern(TypeKind::Interface {
            name: name.map(str::to_string),
        })
    }

    pub fn tuple(&mut self, elems: Vec<TypeId>) -> TypeId {
        self.intern(TypeKind::Tuple(elems))
    }

    pub fn slice_of(&mut self, elem: TypeId) -> TypeId {
        self.intern(TypeKind::Slice(elem))
    }

    pub fn map_of(&mut self, key: TypeId, value: TypeId) -> TypeId {
        self.intern(TypeKind::Map { key, value })
    }

    pub fn chan_of(&mut self, elem: TypeId) -> TypeId {
        self.intern(TypeKind::Chan(elem))
    }

    /// Strip one level of pointer, if present
    pub fn deref(&self, id: TypeId) -> Option<TypeId> {
        match self.kind(id) {
            TypeKind::Pointer(elem) => Some(*elem),
            _ => None,
        }
    }
}
