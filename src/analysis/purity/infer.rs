//! Purity inference over SSA values
//!
//! Answers "what is the purity of this expression?". Used to compose the
//! purity of calls to user-declared pure helpers and to judge the return
//! of a function declared immutable-returning. Any construct outside the
//! known set, and any cycle, is conservatively `Polluted`.
//!
//! Calls to declared-pure helpers compose interprocedurally: the callee's
//! return purity is summarized once (memoized per function) and its
//! parameter dependencies substitute to the matching arguments at the
//! call site.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use super::Purity;
use crate::analysis::oracle::TypeOracle;
use crate::analysis::traverse;
use crate::directives::Directives;
use crate::ssa::{Callee, CallExpr, FuncId, Program, ValueId, ValueKind};

pub struct PurityInference<'a> {
    program: &'a Program,
    oracle: &'a TypeOracle,
    directives: &'a dyn Directives,
    summaries: RefCell<HashMap<FuncId, Purity>>,
    active: RefCell<HashSet<FuncId>>,
}

impl<'a> PurityInference<'a> {
    pub fn new(program: &'a Program, oracle: &'a TypeOracle, directives: &'a dyn Directives) -> Self {
        Self {
            program,
            oracle,
            directives,
            summaries: RefCell::new(HashMap::new()),
            active: RefCell::new(HashSet::new()),
        }
    }

    pub fn infer_value(&self, v: ValueId) -> Purity {
        self.infer_inner(v, &mut HashSet::new())
    }

    /// Join over every builder-typed value of every return instruction.
    pub fn infer_return(&self, func: FuncId) -> Purity {
        let mut acc = Purity::Clean;
        for r in traverse::returned_values(self.program, func) {
            if !self.oracle.is_handle_value(self.program, r) {
                continue;
            }
            acc = acc.join(self.infer_value(r));
            if acc.is_polluted() {
                break;
            }
        }
        acc
    }

    /// Memoized return purity of a whole function. While a summary is
    /// being computed, nested queries for the same function (recursion)
    /// answer `Polluted`.
    pub fn summary(&self, func: FuncId) -> Purity {
        if let Some(hit) = self.summaries.borrow().get(&func) {
            return hit.clone();
        }
        if !self.active.borrow_mut().insert(func) {
            return Purity::Polluted;
        }
        let purity = self.infer_return(func);
        self.active.borrow_mut().remove(&func);
        self.summaries.borrow_mut().insert(func, purity.clone());
        purity
    }

    fn infer_inner(&self, v: ValueId, visited: &mut HashSet<ValueId>) -> Purity {
        if !visited.insert(v) {
            return Purity::Polluted;
        }
        match &self.program.value(v).kind {
            ValueKind::Const { .. } => Purity::Clean,
            ValueKind::Param { .. } => {
                if self.oracle.is_handle_value(self.program, v) {
                    Purity::depends_on(v)
                } else {
                    Purity::Clean
                }
            }
            ValueKind::Call(call) => self.infer_call(call, visited),
            ValueKind::Phi { edges } => {
                let mut acc = Purity::Clean;
                for e in edges {
                    acc = acc.join(self.infer_inner(*e, visited));
                    if acc.is_polluted() {
                        break;
                    }
                }
                acc
            }
            ValueKind::Load { addr } => {
                let sources = traverse::load_sources(self.program, *addr);
                if sources.is_empty() {
                    return Purity::Polluted;
                }
                let mut acc = Purity::Clean;
                for s in sources {
                    acc = acc.join(self.infer_inner(s, visited));
                    if acc.is_polluted() {
                        break;
                    }
                }
                acc
            }
            ValueKind::Extract { tuple, .. } => self.infer_inner(*tuple, visited),
            ValueKind::ChangeType { value }
            | ValueKind::Convert { value }
            | ValueKind::MakeInterface { value }
            | ValueKind::TypeAssert { value }
            | ValueKind::SliceOp { value } => self.infer_inner(*value, visited),
            ValueKind::MakeClosure { bindings, .. } => {
                // Whatever the closure does with a captured builder is
                // outside this analysis.
                if bindings
                    .iter()
                    .any(|b| self.oracle.is_handle_value(self.program, *b))
                {
                    Purity::Polluted
                } else {
                    Purity::Clean
                }
            }
            ValueKind::Field { .. } | ValueKind::Lookup { .. } | ValueKind::IndexAddr { .. } => {
                Purity::Polluted
            }
            _ => Purity::Polluted,
        }
    }

    fn infer_call(&self, call: &CallExpr, visited: &mut HashSet<ValueId>) -> Purity {
        match &call.callee {
            Callee::Method { recv, name } => {
                if self.oracle.is_handle_value(self.program, *recv)
                    && self.oracle.is_immutable_returning_builtin(name)
                {
                    Purity::Clean
                } else {
                    // Chain method, or a method on an unknown receiver
                    Purity::Polluted
                }
            }
            Callee::Function(f) => {
                if self.directives.is_immutable_returning(*f) {
                    return Purity::Clean;
                }
                let handle_args: Vec<ValueId> = call
                    .args
                    .iter()
                    .copied()
                    .filter(|a| self.oracle.is_handle_value(self.program, *a))
                    .collect();
                if self.directives.is_pure(*f) {
                    let mut acc = Purity::Clean;
                    for arg in handle_args {
                        let p = self.argument_purity(arg, visited);
                        acc = acc.join(p);
                        if acc.is_polluted() {
                            break;
                        }
                    }
                    // The callee's summary names the exact parameters its
                    // result rides on; substituting those is tighter than
                    // the all-arguments join.
                    match self.summary(*f) {
                        Purity::Clean => Purity::Clean,
                        Purity::Depends(params) => {
                            let mut refined = Purity::Clean;
                            for p in params.iter() {
                                let Some(arg) = self.param_argument(*p, &call.args) else {
                                    return acc;
                                };
                                refined = refined.join(self.argument_purity(arg, visited));
                                if refined.is_polluted() {
                                    break;
                                }
                            }
                            refined
                        }
                        Purity::Polluted => acc,
                    }
                } else if !handle_args.is_empty() {
                    Purity::Polluted
                } else {
                    // Unknown provenance for a builder minted elsewhere
                    Purity::Polluted
                }
            }
            Callee::Dynamic(_) => Purity::Polluted,
        }
    }

    /// Purity contributed by one argument: the exact parameter when the
    /// argument traces back to a single one, its inferred state otherwise.
    fn argument_purity(&self, arg: ValueId, visited: &mut HashSet<ValueId>) -> Purity {
        match self.trace_to_param(arg) {
            Some(param) => Purity::depends_on(param),
            None => self.infer_inner(arg, visited),
        }
    }

    /// The argument standing for a callee parameter at this call site
    fn param_argument(&self, param: ValueId, args: &[ValueId]) -> Option<ValueId> {
        match &self.program.value(param).kind {
            ValueKind::Param { index } => args.get(*index).copied(),
            _ => None,
        }
    }

    /// Follow value-preserving steps back to a single originating
    /// parameter. Any join with more than one distinct input gives up.
    fn trace_to_param(&self, v: ValueId) -> Option<ValueId> {
        let mut cur = v;
        let mut seen = HashSet::new();
        while seen.insert(cur) {
            match &self.program.value(cur).kind {
                ValueKind::Param { .. } => return Some(cur),
                ValueKind::ChangeType { value }
                | ValueKind::Convert { value }
                | ValueKind::MakeInterface { value }
                | ValueKind::TypeAssert { value }
                | ValueKind::SliceOp { value } => cur = *value,
                ValueKind::Load { addr } => {
                    let mut sources = traverse::load_sources(self.program, *addr);
                    sources.sort();
                    sources.dedup();
                    if sources.len() != 1 {
                        return None;
                    }
                    cur = sources[0];
                }
                ValueKind::Phi { edges } => {
                    let mut distinct = edges.clone();
                    distinct.sort();
                    distinct.dedup();
                    if distinct.len() != 1 {
                        return None;
                    }
                    cur = distinct[0];
                }
                _ => return None,
            }
        }
        None
    }
}
