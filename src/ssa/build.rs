//! Programmatic SSA construction
//!
//! Used by the test suite and by embedders that hold an SSA in some other
//! form. Construction is validated at `finish()`: phi arity must match
//! block predecessors, closure bindings must match the closure's free
//! variable list, and every instruction must land in a block. Positions
//! are assigned from a program-wide line counter in construction order,
//! which keeps them distinct and totally ordered.

use std::collections::HashMap;

use super::function::{BlockData, FunctionData};
use super::program::Program;
use super::types::{TypeId, TypeTable};
use super::value::{BlockId, Callee, CallExpr, FuncId, ValueData, ValueId, ValueKind};
use crate::core::{Error, Pos, Result};

#[derive(Debug, Default)]
pub struct ProgramBuilder {
    types: TypeTable,
    values: Vec<ValueData>,
    funcs: Vec<FunctionData>,
    next_line: usize,
    errors: Vec<String>,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self {
            next_line: 1,
            ..Self::default()
        }
    }

    pub fn types_mut(&mut self) -> &mut TypeTable {
        &mut self.types
    }

    /// Register a function; its body is filled in via [`Self::build_func`].
    pub fn declare_func(&mut self, name: &str) -> FuncId {
        let id = FuncId(self.funcs.len() as u32);
        self.funcs.push(FunctionData {
            name: name.to_string(),
            params: Vec::new(),
            free_vars: Vec::new(),
            blocks: Vec::new(),
            parent: None,
            bound_method: None,
        });
        id
    }

    pub fn build_func(&mut self, func: FuncId) -> FunctionBuilder<'_> {
        FunctionBuilder {
            pb: self,
            func,
            cur: None,
        }
    }

    /// Program-wide constant; `nil` marks the null sentinel.
    pub fn constant(&mut self, ty: Option<TypeId>, nil: bool) -> ValueId {
        self.push_value(ValueKind::Const { nil }, ty, None, None)
    }

    /// Override the line counter, e.g. to model two files
    pub fn set_line(&mut self, line: usize) {
        self.next_line = line;
    }

    fn next_pos(&mut self) -> Pos {
        let pos = Pos::new(self.next_line, 1);
        self.next_line += 1;
        pos
    }

    fn push_value(
        &mut self,
        kind: ValueKind,
        ty: Option<TypeId>,
        func: Option<FuncId>,
        block: Option<BlockId>,
    ) -> ValueId {
        let pos = self.next_pos();
        let id = ValueId(self.values.len() as u32);
        self.values.push(ValueData {
            kind,
            ty,
            func,
            block,
            pos,
            referrers: Vec::new(),
        });
        id
    }

    pub fn finish(mut self) -> Result<Program> {
        self.validate()?;

        // Referrers
        for id in 0..self.values.len() {
            let operands = self.values[id].kind.operands();
            for op in operands {
                self.values[op.0 as usize].referrers.push(ValueId(id as u32));
            }
        }

        // Closure creation sites
        let mut closure_sites: HashMap<FuncId, Vec<ValueId>> = HashMap::new();
        for (id, value) in self.values.iter().enumerate() {
            if let ValueKind::MakeClosure { func, .. } = &value.kind {
                closure_sites
                    .entry(*func)
                    .or_default()
                    .push(ValueId(id as u32));
            }
        }

        Ok(Program {
            types: self.types,
            values: self.values,
            funcs: self.funcs,
            closure_sites,
        })
    }

    fn validate(&self) -> Result<()> {
        if let Some(msg) = self.errors.first() {
            return Err(Error::invalid_ssa(msg.clone()));
        }
        for (id, value) in self.values.iter().enumerate() {
            match &value.kind {
                ValueKind::Phi { edges } => {
                    let (func, block) = match (value.func, value.block) {
                        (Some(f), Some(b)) => (f, b),
                        _ => return Err(Error::invalid_ssa("phi outside a block")),
                    };
                    let preds = &self.funcs[func.0 as usize].blocks[block.0 as usize].preds;
                    if edges.len() != preds.len() {
                        return Err(Error::PhiArity {
                            value: ValueId(id as u32),
                            block,
                            edges: edges.len(),
                            preds: preds.len(),
                        });
                    }
                }
                ValueKind::MakeClosure { func, bindings } => {
                    let free = &self.funcs[func.0 as usize].free_vars;
                    if bindings.len() != free.len() {
                        return Err(Error::invalid_ssa(format!(
                            "closure {} expects {} bindings, got {}",
                            self.funcs[func.0 as usize].name,
                            free.len(),
                            bindings.len()
                        )));
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// Builds one function body inside a [`ProgramBuilder`].
pub struct FunctionBuilder<'a> {
    pb: &'a mut ProgramBuilder,
    func: FuncId,
    cur: Option<BlockId>,
}

impl FunctionBuilder<'_> {
    pub fn id(&self) -> FuncId {
        self.func
    }

    pub fn set_parent(&mut self, parent: FuncId) {
        self.pb.funcs[self.func.0 as usize].parent = Some(parent);
    }

    pub fn set_bound_method(&mut self, method: &str) {
        self.pb.funcs[self.func.0 as usize].bound_method = Some(method.to_string());
    }

    pub fn param(&mut self, ty: TypeId) -> ValueId {
        let index = self.pb.funcs[self.func.0 as usize].params.len();
        let id = self
            .pb
            .push_value(ValueKind::Param { index }, Some(ty), Some(self.func), None);
        self.pb.funcs[self.func.0 as usize].params.push(id);
        id
    }

    pub fn free_var(&mut self, ty: TypeId) -> ValueId {
        let index = self.pb.funcs[self.func.0 as usize].free_vars.len();
        let id =
            self.pb
                .push_value(ValueKind::FreeVar { index }, Some(ty), Some(self.func), None);
        self.pb.funcs[self.func.0 as usize].free_vars.push(id);
        id
    }

    /// Append a new basic block; the first one becomes current.
    pub fn block(&mut self) -> BlockId {
        let blocks = &mut self.pb.funcs[self.func.0 as usize].blocks;
        let id = BlockId(blocks.len() as u32);
        blocks.push(BlockData::default());
        if self.cur.is_none() {
            self.cur = Some(id);
        }
        id
    }

    pub fn switch_to(&mut self, block: BlockId) {
        self.cur = Some(block);
    }

    pub fn edge(&mut self, from: BlockId, to: BlockId) {
        let blocks = &mut self.pb.funcs[self.func.0 as usize].blocks;
        blocks[from.0 as usize].succs.push(to);
        blocks[to.0 as usize].preds.push(from);
    }

    /// Append a raw instruction to the current block. Emitting an
    /// instruction before any block exists is recorded as a construction
    /// error and surfaces from `finish()`.
    pub fn instr(&mut self, kind: ValueKind, ty: Option<TypeId>) -> ValueId {
        let Some(block) = self.cur else {
            let func = &self.pb.funcs[self.func.0 as usize].name;
            let msg = format!("instruction added to {} before any block", func);
            self.pb.errors.push(msg);
            return self.pb.push_value(kind, ty, Some(self.func), None);
        };
        let id = self.pb.push_value(kind, ty, Some(self.func), Some(block));
        self.pb.funcs[self.func.0 as usize].blocks[block.0 as usize]
            .instrs
            .push(id);
        id
    }

    pub fn method_call(
        &mut self,
        recv: ValueId,
        name: &str,
        args: Vec<ValueId>,
        ty: Option<TypeId>,
    ) -> ValueId {
        self.instr(
            ValueKind::Call(CallExpr {
                callee: Callee::Method {
                    recv,
                    name: name.to_string(),
                },
                args,
            }),
            ty,
        )
    }

    pub fn call_func(&mut self, func: FuncId, args: Vec<ValueId>, ty: Option<TypeId>) -> ValueId {
        self.instr(
            ValueKind::Call(CallExpr {
                callee: Callee::Function(func),
                args,
            }),
            ty,
        )
    }

    pub fn call_dynamic(
        &mut self,
        callee: ValueId,
        args: Vec<ValueId>,
        ty: Option<TypeId>,
    ) -> ValueId {
        self.instr(
            ValueKind::Call(CallExpr {
                callee: Callee::Dynamic(callee),
                args,
            }),
            ty,
        )
    }

    pub fn phi(&mut self, edges: Vec<ValueId>, ty: Option<TypeId>) -> ValueId {
        self.instr(ValueKind::Phi { edges }, ty)
    }

    /// Patch a phi's edge list once back-edge values exist. Edges align
    /// index-for-index with the block's predecessor list.
    pub fn set_phi_edges(&mut self, phi: ValueId, edges: Vec<ValueId>) {
        if let ValueKind::Phi { edges: slot } = &mut self.pb.values[phi.0 as usize].kind {
            *slot = edges;
        }
    }

    pub fn alloc(&mut self, name: &str, ty: TypeId) -> ValueId {
        self.instr(
            ValueKind::Alloc {
                name: name.to_string(),
            },
            Some(ty),
        )
    }

    pub fn load(&mut self, addr: ValueId, ty: Option<TypeId>) -> ValueId {
        self.instr(ValueKind::Load { addr }, ty)
    }

    pub fn store(&mut self, addr: ValueId, value: ValueId) -> ValueId {
        self.instr(ValueKind::Store { addr, value }, None)
    }

    pub fn field_addr(&mut self, base: ValueId, field: usize, ty: Option<TypeId>) -> ValueId {
        self.instr(ValueKind::FieldAddr { base, field }, ty)
    }

    pub fn index_addr(&mut self, base: ValueId, index: ValueId, ty: Option<TypeId>) -> ValueId {
        self.instr(ValueKind::IndexAddr { base, index }, ty)
    }

    pub fn extract(&mut self, tuple: ValueId, index: usize, ty: Option<TypeId>) -> ValueId {
        self.instr(ValueKind::Extract { tuple, index }, ty)
    }

    pub fn make_interface(&mut self, value: ValueId, ty: Option<TypeId>) -> ValueId {
        self.instr(ValueKind::MakeInterface { value }, ty)
    }

    pub fn make_closure(
        &mut self,
        func: FuncId,
        bindings: Vec<ValueId>,
        ty: Option<TypeId>,
    ) -> ValueId {
        self.instr(ValueKind::MakeClosure { func, bindings }, ty)
    }

    pub fn send(&mut self, chan: ValueId, value: ValueId) -> ValueId {
        self.instr(ValueKind::Send { chan, value }, None)
    }

    pub fn map_update(&mut self, map: ValueId, key: ValueId, value: ValueId) -> ValueId {
        self.instr(ValueKind::MapUpdate { map, key, value }, None)
    }

    pub fn go_method(&mut self, recv: ValueId, name: &str, args: Vec<ValueId>) -> ValueId {
        self.instr(
            ValueKind::Go(CallExpr {
                callee: Callee::Method {
                    recv,
                    name: name.to_string(),
                },
                args,
            }),
            None,
        )
    }

    pub fn go_func(&mut self, func: FuncId, args: Vec<ValueId>) -> ValueId {
        self.instr(
            ValueKind::Go(CallExpr {
                callee: Callee::Function(func),
                args,
            }),
            None,
        )
    }

    pub fn go_dynamic(&mut self, callee: ValueId, args: Vec<ValueId>) -> ValueId {
        self.instr(
            ValueKind::Go(CallExpr {
                callee: Callee::Dynamic(callee),
                args,
            }),
            None,
        )
    }

    pub fn defer_method(&mut self, recv: ValueId, name: &str, args: Vec<ValueId>) -> ValueId {
        self.instr(
            ValueKind::Defer(CallExpr {
                callee: Callee::Method {
                    recv,
                    name: name.to_string(),
                },
                args,
            }),
            None,
        )
    }

    pub fn defer_func(&mut self, func: FuncId, args: Vec<ValueId>) -> ValueId {
        self.instr(
            ValueKind::Defer(CallExpr {
                callee: Callee::Function(func),
                args,
            }),
            None,
        )
    }

    pub fn ret(&mut self, results: Vec<ValueId>) -> ValueId {
        self.instr(ValueKind::Return { results }, None)
    }
}
