//! SSA values and instructions
//!
//! Every SSA entity the analyzer looks at is a value: parameters, free
//! variables, constants, and instructions. Instructions that produce no
//! result (stores, sends, spawns) are values of unit kind so that one id
//! space covers everything and referrer lists stay uniform.

use serde::{Deserialize, Serialize};

use super::types::TypeId;
use crate::core::Pos;

/// Index of a value in its program
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ValueId(pub u32);

/// Index of a function in its program
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FuncId(pub u32);

/// Index of a basic block within its function
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockId(pub u32);

/// Who a call targets
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Callee {
    /// Statically known function
    Function(FuncId),
    /// Method invoked on a receiver value
    Method { recv: ValueId, name: String },
    /// Call through a value: closure, function pointer, bound method
    Dynamic(ValueId),
}

/// A call site: callee plus ordinary (non-receiver) arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallExpr {
    pub callee: Callee,
    pub args: Vec<ValueId>,
}

impl CallExpr {
    fn operands(&self, out: &mut Vec<ValueId>) {
        match &self.callee {
            Callee::Function(_) => {}
            Callee::Method { recv, .. } => out.push(*recv),
            Callee::Dynamic(v) => out.push(*v),
        }
        out.extend_from_slice(&self.args);
    }
}

/// Discriminated instruction/value kinds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueKind {
    /// Function parameter
    Param { index: usize },
    /// Captured variable of a closure, bound at the creation site
    FreeVar { index: usize },
    /// Constant; `nil` marks the null sentinel
    Const { nil: bool },
    Phi { edges: Vec<ValueId> },
    Call(CallExpr),
    /// Address of a local slot
    Alloc { name: String },
    /// Pointer dereference
    Load { addr: ValueId },
    /// Address of a record field
    FieldAddr { base: ValueId, field: usize },
    /// Address of an array/slice element
    IndexAddr { base: ValueId, index: ValueId },
    /// Direct (non-address) field read
    Field { base: ValueId, field: usize },
    /// Map or collection read
    Lookup { container: ValueId, key: ValueId },
    /// Component of a multi-result value
    Extract { tuple: ValueId, index: usize },
    ChangeType { value: ValueId },
    Convert { value: ValueId },
    /// Wrap a concrete value into an interface
    MakeInterface { value: ValueId },
    TypeAssert { value: ValueId },
    SliceOp { value: ValueId },
    /// Closure creation; bindings align with the closure's free variables
    MakeClosure { func: FuncId, bindings: Vec<ValueId> },
    Store { addr: ValueId, value: ValueId },
    /// Channel send
    Send { chan: ValueId, value: ValueId },
    MapUpdate { map: ValueId, key: ValueId, value: ValueId },
    /// Goroutine spawn
    Go(CallExpr),
    /// Deferred call, runs at function exit
    Defer(CallExpr),
    Return { results: Vec<ValueId> },
}

impl ValueKind {
    /// Values this instruction reads. Drives referrer computation.
    pub fn operands(&self) -> Vec<ValueId> {
        let mut out = Vec::new();
        match self {
            ValueKind::Param { .. } | ValueKind::FreeVar { .. } | ValueKind::Const { .. } => {}
            ValueKind::Phi { edges } => out.extend_from_slice(edges),
            ValueKind::Call(call) | ValueKind::Go(call) | ValueKind::Defer(call) => {
                call.operands(&mut out)
            }
            ValueKind::Alloc { .. } => {}
            ValueKind::Load { addr } => out.push(*addr),
            ValueKind::FieldAddr { base, .. } | ValueKind::Field { base, .. } => out.push(*base),
            ValueKind::IndexAddr { base, index } => {
                out.push(*base);
                out.push(*index);
            }
            ValueKind::Lookup { container, key } => {
                out.push(*container);
                out.push(*key);
            }
            ValueKind::Extract { tuple, .. } => out.push(*tuple),
            ValueKind::ChangeType { value }
            | ValueKind::Convert { value }
            | ValueKind::MakeInterface { value }
            | ValueKind::TypeAssert { value }
            | ValueKind::SliceOp { value } => out.push(*value),
            ValueKind::MakeClosure { bindings, .. } => out.extend_from_slice(bindings),
            ValueKind::Store { addr, value } | ValueKind::Send { chan: addr, value } => {
                out.push(*addr);
                out.push(*value);
            }
            ValueKind::MapUpdate { map, key, value } => {
                out.push(*map);
                out.push(*key);
                out.push(*value);
            }
            ValueKind::Return { results } => out.extend_from_slice(results),
        }
        out
    }

    pub fn as_call(&self) -> Option<&CallExpr> {
        match self {
            ValueKind::Call(c) | ValueKind::Go(c) | ValueKind::Defer(c) => Some(c),
            _ => None,
        }
    }
}

/// A value together with everything the analyzer may ask of it
#[derive(Debug, Clone)]
pub struct ValueData {
    pub kind: ValueKind,
    /// Result type; None for instructions without a result
    pub ty: Option<TypeId>,
    /// Owning function; None for constants
    pub func: Option<FuncId>,
    /// Defining block; None for parameters, free variables, constants
    pub block: Option<BlockId>,
    pub pos: Pos,
    /// Instructions that use this value
    pub referrers: Vec<ValueId>,
}
