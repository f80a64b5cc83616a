//! SSA edge-following primitives
//!
//! Stateless helpers shared by the root tracer and the purity inferencer.
//! Each follows at most one "meaningful" edge for a value: stores behind a
//! dereference, the binding behind a captured variable, the returns behind
//! an immediately-invoked closure. Callers layer cycle guards and
//! first/all selection on top.

use crate::ssa::{FuncId, Program, ValueId, ValueKind};

/// Values stored through the given address (a local allocation).
pub fn stores_to(program: &Program, addr: ValueId) -> Vec<ValueId> {
    program
        .value(addr)
        .referrers
        .iter()
        .filter_map(|r| match &program.value(*r).kind {
            ValueKind::Store { addr: a, value } if *a == addr => Some(*value),
            _ => None,
        })
        .collect()
}

/// Values stored to the same field of the same base record.
pub fn field_stores(program: &Program, base: ValueId, field: usize) -> Vec<ValueId> {
    let mut out = Vec::new();
    for r in &program.value(base).referrers {
        if let ValueKind::FieldAddr { base: b, field: f } = &program.value(*r).kind {
            if *b == base && *f == field {
                out.extend(stores_to(program, *r));
            }
        }
    }
    out
}

/// One dereference step for a load address: the values observable through
/// it. For a captured variable this yields the parent's binding (itself an
/// address when the capture is by reference); callers keep tracing.
pub fn load_sources(program: &Program, addr: ValueId) -> Vec<ValueId> {
    match &program.value(addr).kind {
        ValueKind::Alloc { .. } => stores_to(program, addr),
        ValueKind::FreeVar { index } => free_var_bindings(program, addr, *index),
        ValueKind::FieldAddr { base, field } => field_stores(program, *base, *field),
        _ => Vec::new(),
    }
}

/// The values bound at every creation site of the closure owning this
/// free variable.
pub fn free_var_bindings(program: &Program, free_var: ValueId, index: usize) -> Vec<ValueId> {
    let Some(func) = program.value(free_var).func else {
        return Vec::new();
    };
    program
        .closure_sites(func)
        .iter()
        .filter_map(|site| match &program.value(*site).kind {
            ValueKind::MakeClosure { bindings, .. } => bindings.get(index).copied(),
            _ => None,
        })
        .collect()
}

/// All returned values of a function, across every return instruction.
pub fn returned_values(program: &Program, func: FuncId) -> Vec<ValueId> {
    let mut out = Vec::new();
    let fd = program.func(func);
    for block in &fd.blocks {
        for instr in &block.instrs {
            if let ValueKind::Return { results } = &program.value(*instr).kind {
                out.extend_from_slice(results);
            }
        }
    }
    out
}

/// Peel value-preserving wrappers down to a closure-creation site.
pub fn resolve_closure(program: &Program, v: ValueId) -> Option<(FuncId, Vec<ValueId>)> {
    let mut cur = v;
    for _ in 0..32 {
        match &program.value(cur).kind {
            ValueKind::MakeClosure { func, bindings } => return Some((*func, bindings.clone())),
            ValueKind::ChangeType { value }
            | ValueKind::Convert { value }
            | ValueKind::TypeAssert { value }
            | ValueKind::MakeInterface { value } => cur = *value,
            _ => return None,
        }
    }
    None
}
