//! Human-readable rendering of SSA functions
//!
//! Used in trace-level logs and while debugging fixture construction.
//! The format is line-oriented: one block header per basic block with its
//! predecessors, one indented line per instruction.

use std::fmt::Write;

use super::program::Program;
use super::value::{Callee, CallExpr, FuncId, ValueId, ValueKind};

pub fn render_function(program: &Program, func: FuncId) -> String {
    let fd = program.func(func);
    let mut out = String::new();
    let params: Vec<String> = fd.params.iter().map(|p| name(*p)).collect();
    let _ = write!(out, "func {}({})", fd.name, params.join(", "));
    if !fd.free_vars.is_empty() {
        let frees: Vec<String> = fd.free_vars.iter().map(|p| name(*p)).collect();
        let _ = write!(out, " [{}]", frees.join(", "));
    }
    let _ = writeln!(out);
    for (i, block) in fd.blocks.iter().enumerate() {
        let preds: Vec<String> = block.preds.iter().map(|p| format!("b{}", p.0)).collect();
        if preds.is_empty() {
            let _ = writeln!(out, "b{}:", i);
        } else {
            let _ = writeln!(out, "b{}: <- {}", i, preds.join(" "));
        }
        for instr in &block.instrs {
            let _ = writeln!(out, "  {}", render_instr(program, *instr));
        }
    }
    out
}

fn render_instr(program: &Program, v: ValueId) -> String {
    let vd = program.value(v);
    match &vd.kind {
        ValueKind::Phi { edges } => format!("{} = phi {}", name(v), names(edges)),
        ValueKind::Call(call) => format!("{} = call {}", name(v), render_call(program, call)),
        ValueKind::Alloc { name: var } => format!("{} = alloc {}", name(v), var),
        ValueKind::Load { addr } => format!("{} = load {}", name(v), name(*addr)),
        ValueKind::FieldAddr { base, field } => {
            format!("{} = &{}.f{}", name(v), name(*base), field)
        }
        ValueKind::IndexAddr { base, index } => {
            format!("{} = &{}[{}]", name(v), name(*base), name(*index))
        }
        ValueKind::Field { base, field } => format!("{} = {}.f{}", name(v), name(*base), field),
        ValueKind::Lookup { container, key } => {
            format!("{} = {}[{}]", name(v), name(*container), name(*key))
        }
        ValueKind::Extract { tuple, index } => {
            format!("{} = extract {} #{}", name(v), name(*tuple), index)
        }
        ValueKind::ChangeType { value } => format!("{} = changetype {}", name(v), name(*value)),
        ValueKind::Convert { value } => format!("{} = convert {}", name(v), name(*value)),
        ValueKind::MakeInterface { value } => {
            format!("{} = makeinterface {}", name(v), name(*value))
        }
        ValueKind::TypeAssert { value } => format!("{} = typeassert {}", name(v), name(*value)),
        ValueKind::SliceOp { value } => format!("{} = slice {}", name(v), name(*value)),
        ValueKind::MakeClosure { func, bindings } => format!(
            "{} = makeclosure {} {}",
            name(v),
            program.func(*func).name,
            names(bindings)
        ),
        ValueKind::Store { addr, value } => format!("store {} <- {}", name(*addr), name(*value)),
        ValueKind::Send { chan, value } => format!("send {} <- {}", name(*chan), name(*value)),
        ValueKind::MapUpdate { map, key, value } => {
            format!("{}[{}] = {}", name(*map), name(*key), name(*value))
        }
        ValueKind::Go(call) => format!("go {}", render_call(program, call)),
        ValueKind::Defer(call) => format!("defer {}", render_call(program, call)),
        ValueKind::Return { results } => format!("return {}", names(results)),
        ValueKind::Param { .. } | ValueKind::FreeVar { .. } | ValueKind::Const { .. } => {
            format!("{} = ?", name(v))
        }
    }
}

fn render_call(program: &Program, call: &CallExpr) -> String {
    let args = names(&call.args);
    match &call.callee {
        Callee::Function(f) => format!("{}({})", program.func(*f).name, args),
        Callee::Method { recv, name: m } => format!("{}.{}({})", name(*recv), m, args),
        Callee::Dynamic(d) => format!("{}({})", name(*d), args),
    }
}

fn name(v: ValueId) -> String {
    format!("v{}", v.0)
}

fn names(vs: &[ValueId]) -> String {
    vs.iter()
        .map(|v| name(*v))
        .collect::<Vec<_>>()
        .join(", ")
}
