//! The immutable SSA program the analyzer borrows

use std::collections::HashMap;

use super::function::{BlockData, FunctionData};
use super::types::{TypeId, TypeTable};
use super::value::{BlockId, FuncId, ValueData, ValueId};
use crate::core::Pos;

/// A finished SSA program. Construction goes through
/// [`crate::ssa::ProgramBuilder`]; afterwards the program is read-only and
/// safe to share across parallel per-function analyses.
#[derive(Debug)]
pub struct Program {
    pub(crate) types: TypeTable,
    pub(crate) values: Vec<ValueData>,
    pub(crate) funcs: Vec<FunctionData>,
    /// Closure-creation sites per closure function
    pub(crate) closure_sites: HashMap<FuncId, Vec<ValueId>>,
}

impl Program {
    pub fn value(&self, id: ValueId) -> &ValueData {
        &self.values[id.0 as usize]
    }

    pub fn func(&self, id: FuncId) -> &FunctionData {
        &self.funcs[id.0 as usize]
    }

    pub fn types(&self) -> &TypeTable {
        &self.types
    }

    pub fn block(&self, func: FuncId, block: BlockId) -> &BlockData {
        self.func(func).block(block)
    }

    pub fn func_ids(&self) -> impl Iterator<Item = FuncId> {
        (0..self.funcs.len() as u32).map(FuncId)
    }

    /// Functions that are not closures; entry points for package analysis
    pub fn top_level_funcs(&self) -> Vec<FuncId> {
        self.func_ids()
            .filter(|f| self.func(*f).parent.is_none())
            .collect()
    }

    pub fn type_of(&self, v: ValueId) -> Option<TypeId> {
        self.value(v).ty
    }

    pub fn pos(&self, v: ValueId) -> Pos {
        self.value(v).pos
    }

    /// Where the closure function is materialized in its parents
    pub fn closure_sites(&self, f: FuncId) -> &[ValueId] {
        self.closure_sites.get(&f).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether `ancestor` encloses `f` (reflexively)
    pub fn encloses(&self, ancestor: FuncId, f: FuncId) -> bool {
        let mut cur = Some(f);
        while let Some(c) = cur {
            if c == ancestor {
                return true;
            }
            cur = self.func(c).parent;
        }
        false
    }
}
