//! Validation of declared-pure functions
//!
//! A pure declaration promises the function does not consume its builder
//! arguments. Validation tracks which values derive from builder-typed
//! parameters and flags every consuming use of a derived value: a chain
//! method call, or a hand-off to a callee that is neither declared pure
//! nor immutable-returning.

use std::collections::HashSet;

use crate::analysis::oracle::TypeOracle;
use crate::analysis::traverse;
use crate::core::Violation;
use crate::directives::Directives;
use crate::ssa::{Callee, CallExpr, FuncId, Program, ValueId, ValueKind};

/// Check one declared-pure function; returns a diagnostic per offending
/// call site.
pub fn validate(
    program: &Program,
    func: FuncId,
    oracle: &TypeOracle,
    directives: &dyn Directives,
) -> Vec<Violation> {
    let fd = program.func(func);
    let mut derived: HashSet<ValueId> = fd
        .params
        .iter()
        .copied()
        .filter(|p| oracle.is_handle_value(program, *p))
        .collect();
    if derived.is_empty() {
        return Vec::new();
    }

    // Derivation propagates through joins and through results of calls
    // that are not declared pure. Iterate to a fixpoint; derivation only
    // grows.
    loop {
        let mut changed = false;
        for block in &fd.blocks {
            for instr in &block.instrs {
                if derived.contains(instr) {
                    continue;
                }
                let is_derived = match &program.value(*instr).kind {
                    ValueKind::Phi { edges } => edges.iter().any(|e| derived.contains(e)),
                    ValueKind::Extract { tuple, .. } => derived.contains(tuple),
                    ValueKind::ChangeType { value }
                    | ValueKind::Convert { value }
                    | ValueKind::MakeInterface { value }
                    | ValueKind::TypeAssert { value }
                    | ValueKind::SliceOp { value } => derived.contains(value),
                    ValueKind::Load { addr } => traverse::load_sources(program, *addr)
                        .iter()
                        .any(|s| derived.contains(s)),
                    ValueKind::Call(call) => {
                        derived_inputs(program, oracle, call, &derived)
                            && !callee_is_exempt(program, oracle, directives, call)
                    }
                    _ => false,
                };
                if is_derived {
                    derived.insert(*instr);
                    changed = true;
                }
            }
        }
        if !changed {
            break;
        }
    }

    let mut out = Vec::new();
    for block in &fd.blocks {
        for instr in &block.instrs {
            let Some(call) = program.value(*instr).kind.as_call() else {
                continue;
            };
            let pos = program.value(*instr).pos;
            match &call.callee {
                Callee::Method { recv, name } => {
                    if oracle.is_handle_value(program, *recv)
                        && !oracle.is_immutable_returning_builtin(name)
                        && derived.contains(recv)
                    {
                        out.push(Violation::purity_pollutes(pos, name));
                    }
                }
                Callee::Function(f) => {
                    if directives.is_pure(*f) || directives.is_immutable_returning(*f) {
                        continue;
                    }
                    if passes_derived_handle(program, oracle, &call.args, &derived) {
                        out.push(Violation::purity_leaks(pos, &program.func(*f).name));
                    }
                }
                Callee::Dynamic(_) => {
                    if passes_derived_handle(program, oracle, &call.args, &derived) {
                        out.push(Violation::purity_leaks(pos, "a function value"));
                    }
                }
            }
        }
    }
    out
}

/// Any builder-typed receiver or argument of the call is derived.
fn derived_inputs(
    program: &Program,
    oracle: &TypeOracle,
    call: &CallExpr,
    derived: &HashSet<ValueId>,
) -> bool {
    let recv_derived = matches!(
        &call.callee,
        Callee::Method { recv, .. }
            if oracle.is_handle_value(program, *recv) && derived.contains(recv)
    );
    recv_derived || passes_derived_handle(program, oracle, &call.args, derived)
}

fn passes_derived_handle(
    program: &Program,
    oracle: &TypeOracle,
    args: &[ValueId],
    derived: &HashSet<ValueId>,
) -> bool {
    args.iter()
        .any(|a| oracle.is_handle_value(program, *a) && derived.contains(a))
}

/// Callees that do not taint their inputs' derivation: declared-pure and
/// immutable-returning functions, and the independent-builder methods.
fn callee_is_exempt(
    program: &Program,
    oracle: &TypeOracle,
    directives: &dyn Directives,
    call: &CallExpr,
) -> bool {
    match &call.callee {
        Callee::Method { recv, name } => {
            oracle.is_handle_value(program, *recv) && oracle.is_immutable_returning_builtin(name)
        }
        Callee::Function(f) => directives.is_pure(*f) || directives.is_immutable_returning(*f),
        Callee::Dynamic(_) => false,
    }
}

/// Check a function declared immutable-returning. The declaration is the
/// stronger contract: every builder it returns must infer `Clean`, not
/// merely parameter-dependent.
pub fn validate_immutable_return(
    program: &Program,
    func: FuncId,
    oracle: &TypeOracle,
    directives: &dyn Directives,
) -> Vec<Violation> {
    use super::infer::PurityInference;
    use super::Purity;

    let inference = PurityInference::new(program, oracle, directives);
    let fd = program.func(func);
    let mut out = Vec::new();
    for block in &fd.blocks {
        for instr in &block.instrs {
            let ValueKind::Return { results } = &program.value(*instr).kind else {
                continue;
            };
            let broken = results.iter().any(|r| {
                oracle.is_handle_value(program, *r)
                    && inference.infer_value(*r) != Purity::Clean
            });
            if broken {
                out.push(Violation::immutable_return_broken(
                    program.value(*instr).pos,
                    &fd.name,
                ));
            }
        }
    }
    out
}
