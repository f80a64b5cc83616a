//! Mutable-root resolution
//!
//! Every builder-typed SSA value either descends from an immutable source
//! (a parameter, a constant, an independent-builder constructor) or from a
//! mutable root: the chain-method call or ordinary call that last
//! established its identity. Chain-method results are their own roots, so
//! a stored intermediate starts a fresh identity and pollution never
//! propagates across an assignment.
//!
//! `trace` resolves a single root; `trace_all` enumerates every dynamic
//! origin across phis, stores, captures, and closure returns. Cycles in
//! the value graph resolve to "immutable", which drops the expression
//! rather than misattributing it.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use log::trace;

use super::cfg::CfgCache;
use super::oracle::TypeOracle;
use super::traverse;
use crate::directives::Directives;
use crate::ssa::{Callee, CallExpr, Program, ValueId, ValueKind};

pub struct RootTracer<'a> {
    program: &'a Program,
    oracle: &'a TypeOracle,
    directives: &'a dyn Directives,
    cfgs: &'a CfgCache<'a>,
    cache: RefCell<HashMap<ValueId, Option<ValueId>>>,
}

impl<'a> RootTracer<'a> {
    pub fn new(
        program: &'a Program,
        oracle: &'a TypeOracle,
        directives: &'a dyn Directives,
        cfgs: &'a CfgCache<'a>,
    ) -> Self {
        Self {
            program,
            oracle,
            directives,
            cfgs,
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// Resolve the mutable root of a builder value, or None when the
    /// value descends only from immutable sources.
    pub fn trace(&self, v: ValueId) -> Option<ValueId> {
        if let Some(hit) = self.cache.borrow().get(&v) {
            return *hit;
        }
        let mut visited = HashSet::new();
        let root = self.trace_inner(v, &mut visited);
        self.cache.borrow_mut().insert(v, root);
        trace!("trace {:?} -> {:?}", v, root);
        root
    }

    /// Every root the value may carry at runtime. Join points (phis,
    /// multiple stores, multiple closure returns) contribute their union.
    pub fn trace_all(&self, v: ValueId) -> Vec<ValueId> {
        let mut out = Vec::new();
        let mut visited = HashSet::new();
        self.trace_all_inner(v, &mut visited, &mut out);
        out
    }

    fn trace_inner(&self, v: ValueId, visited: &mut HashSet<ValueId>) -> Option<ValueId> {
        if let Some(hit) = self.cache.borrow().get(&v) {
            return *hit;
        }
        if !visited.insert(v) {
            return None;
        }
        match &self.program.value(v).kind {
            ValueKind::Const { .. } | ValueKind::Param { .. } => None,
            ValueKind::Call(call) => self.trace_call(v, call, visited),
            ValueKind::Phi { edges } => {
                if self.swap_partner(v).is_some() {
                    // Swapped loop variables stay independent identities
                    return Some(v);
                }
                self.phi_edge_order(v, edges)
                    .into_iter()
                    .find_map(|e| self.trace_inner(e, visited))
            }
            ValueKind::Load { addr } => traverse::load_sources(self.program, *addr)
                .into_iter()
                .find_map(|s| self.trace_inner(s, visited)),
            ValueKind::Alloc { .. } => traverse::stores_to(self.program, v)
                .into_iter()
                .find_map(|s| self.trace_inner(s, visited)),
            ValueKind::FreeVar { index } => traverse::free_var_bindings(self.program, v, *index)
                .into_iter()
                .find_map(|b| self.trace_inner(b, visited)),
            ValueKind::ChangeType { value }
            | ValueKind::Convert { value }
            | ValueKind::MakeInterface { value }
            | ValueKind::TypeAssert { value }
            | ValueKind::SliceOp { value } => self.trace_inner(*value, visited),
            ValueKind::Extract { tuple, .. } => self.trace_inner(*tuple, visited),
            _ => None,
        }
    }

    fn trace_call(
        &self,
        v: ValueId,
        call: &CallExpr,
        visited: &mut HashSet<ValueId>,
    ) -> Option<ValueId> {
        match &call.callee {
            Callee::Method { recv, name } => {
                if self.oracle.is_handle_value(self.program, *recv) {
                    if self.oracle.is_immutable_returning_builtin(name) {
                        None
                    } else {
                        // A chain-method result is its own identity
                        Some(v)
                    }
                } else {
                    // Method on an unknown receiver returning a builder
                    Some(v)
                }
            }
            Callee::Function(f) => {
                if self.directives.is_immutable_returning(*f) || self.directives.is_pure(*f) {
                    None
                } else {
                    Some(v)
                }
            }
            Callee::Dynamic(d) => match traverse::resolve_closure(self.program, *d) {
                Some((cf, bindings)) => {
                    if let Some(method) = self.program.func(cf).bound_method.clone() {
                        match bindings.first() {
                            Some(recv)
                                if self.oracle.is_handle_value(self.program, *recv)
                                    && self.oracle.is_immutable_returning_builtin(&method) =>
                            {
                                None
                            }
                            _ => Some(v),
                        }
                    } else {
                        self.trace_iife(v, cf, visited)
                    }
                }
                // Unknown callee: non-immutable return
                None => Some(v),
            },
        }
    }

    /// An immediately-invoked closure is transparent when its returns all
    /// trace to one root and the result does not escape into storage.
    fn trace_iife(
        &self,
        v: ValueId,
        closure: crate::ssa::FuncId,
        visited: &mut HashSet<ValueId>,
    ) -> Option<ValueId> {
        if self.is_stored(v) {
            return Some(v);
        }
        let rets: Vec<ValueId> = traverse::returned_values(self.program, closure)
            .into_iter()
            .filter(|r| self.oracle.is_handle_value(self.program, *r))
            .collect();
        if rets.is_empty() {
            return None;
        }
        let mut roots: Vec<Option<ValueId>> = Vec::new();
        for r in rets {
            roots.push(self.trace_inner(r, visited));
        }
        if roots.iter().all(Option::is_none) {
            return None;
        }
        let mut distinct: Vec<ValueId> = roots.iter().flatten().copied().collect();
        distinct.dedup();
        if distinct.len() == 1 && roots.iter().all(Option::is_some) {
            distinct.pop()
        } else {
            Some(v)
        }
    }

    fn trace_all_inner(&self, v: ValueId, visited: &mut HashSet<ValueId>, out: &mut Vec<ValueId>) {
        if !visited.insert(v) {
            return;
        }
        match &self.program.value(v).kind {
            ValueKind::Const { .. } | ValueKind::Param { .. } => {}
            ValueKind::Call(call) => self.trace_all_call(v, call, visited, out),
            ValueKind::Phi { edges } => {
                if self.swap_partner(v).is_some() {
                    // Pollution from before the loop flows through the
                    // initial edges of the swapped header phis; intra-loop
                    // reassignment stays confined to the swap phi itself.
                    for e in edges {
                        if let Some(init) = self.initial_edge(*e) {
                            self.trace_all_inner(init, visited, out);
                        }
                    }
                    push_unique(out, v);
                } else {
                    for e in edges {
                        self.trace_all_inner(*e, visited, out);
                    }
                }
            }
            ValueKind::Load { addr } => {
                for s in traverse::load_sources(self.program, *addr) {
                    self.trace_all_inner(s, visited, out);
                }
            }
            ValueKind::Alloc { .. } => {
                for s in traverse::stores_to(self.program, v) {
                    self.trace_all_inner(s, visited, out);
                }
            }
            ValueKind::FreeVar { index } => {
                for b in traverse::free_var_bindings(self.program, v, *index) {
                    self.trace_all_inner(b, visited, out);
                }
            }
            ValueKind::ChangeType { value }
            | ValueKind::Convert { value }
            | ValueKind::MakeInterface { value }
            | ValueKind::TypeAssert { value }
            | ValueKind::SliceOp { value } => self.trace_all_inner(*value, visited, out),
            ValueKind::Extract { tuple, .. } => self.trace_all_inner(*tuple, visited, out),
            _ => {}
        }
    }

    fn trace_all_call(
        &self,
        v: ValueId,
        call: &CallExpr,
        visited: &mut HashSet<ValueId>,
        out: &mut Vec<ValueId>,
    ) {
        match &call.callee {
            Callee::Method { recv, name } => {
                if self.oracle.is_handle_value(self.program, *recv) {
                    if !self.oracle.is_immutable_returning_builtin(name) {
                        push_unique(out, v);
                    }
                } else {
                    push_unique(out, v);
                }
            }
            Callee::Function(f) => {
                if !self.directives.is_immutable_returning(*f) && !self.directives.is_pure(*f) {
                    push_unique(out, v);
                }
            }
            Callee::Dynamic(d) => match traverse::resolve_closure(self.program, *d) {
                Some((cf, bindings)) => {
                    if let Some(method) = self.program.func(cf).bound_method.clone() {
                        let immutable = bindings.first().is_some_and(|recv| {
                            self.oracle.is_handle_value(self.program, *recv)
                                && self.oracle.is_immutable_returning_builtin(&method)
                        });
                        if !immutable {
                            push_unique(out, v);
                        }
                    } else if self.is_stored(v) {
                        push_unique(out, v);
                    } else {
                        for r in traverse::returned_values(self.program, cf) {
                            if self.oracle.is_handle_value(self.program, r) {
                                self.trace_all_inner(r, visited, out);
                            }
                        }
                    }
                }
                _ => push_unique(out, v),
            },
        }
    }

    /// Whether a call result escapes into storage: tuple extraction, a
    /// phi, a store to a local slot, an interface wrap, or an ordinary
    /// argument position. Being the receiver of a further chain method is
    /// chaining, not storing, but storage propagates back through the
    /// chained call's own result.
    pub fn is_stored(&self, v: ValueId) -> bool {
        self.is_stored_inner(v, &mut HashSet::new())
    }

    fn is_stored_inner(&self, v: ValueId, seen: &mut HashSet<ValueId>) -> bool {
        if !seen.insert(v) {
            return false;
        }
        for r in &self.program.value(v).referrers {
            match &self.program.value(*r).kind {
                ValueKind::Extract { .. } | ValueKind::Phi { .. } | ValueKind::MakeInterface { .. } => {
                    return true;
                }
                ValueKind::Store { addr, value } if *value == v => {
                    if matches!(self.program.value(*addr).kind, ValueKind::Alloc { .. }) {
                        return true;
                    }
                }
                ValueKind::Call(c) => {
                    if c.args.contains(&v) {
                        return true;
                    }
                    if let Callee::Method { recv, .. } = &c.callee {
                        if *recv == v && self.is_stored_inner(*r, seen) {
                            return true;
                        }
                    }
                }
                // Spawned and deferred calls take arguments the same way
                ValueKind::Go(c) | ValueKind::Defer(c) => {
                    if c.args.contains(&v) {
                        return true;
                    }
                }
                _ => {}
            }
        }
        false
    }

    /// In a loop-header phi, prefer back-edge values so the body sees the
    /// identity produced by the previous iteration's assignment.
    fn phi_edge_order(&self, v: ValueId, edges: &[ValueId]) -> Vec<ValueId> {
        let vd = self.program.value(v);
        let (Some(func), Some(block)) = (vd.func, vd.block) else {
            return edges.to_vec();
        };
        let cfg = self.cfgs.get(func);
        if !cfg.loops().is_header(block) {
            return edges.to_vec();
        }
        let preds = &self.program.block(func, block).preds;
        let mut order: Vec<usize> = (0..edges.len()).collect();
        order.sort_by(|a, b| preds[*b].cmp(&preds[*a]));
        order.into_iter().map(|i| edges[i]).collect()
    }

    /// The non-back edge of a loop-header phi: the one arriving from the
    /// earliest predecessor in block order.
    fn initial_edge(&self, phi: ValueId) -> Option<ValueId> {
        let vd = self.program.value(phi);
        let ValueKind::Phi { edges } = &vd.kind else {
            return None;
        };
        let (func, block) = (vd.func?, vd.block?);
        let preds = &self.program.block(func, block).preds;
        (0..edges.len())
            .min_by_key(|i| preds[*i])
            .map(|i| edges[i])
    }

    /// Detect the conditional loop-variable swap shape: two phis in the
    /// same non-header block whose edges transpose each other, every edge
    /// itself a loop-header phi.
    fn swap_partner(&self, v: ValueId) -> Option<ValueId> {
        let vd = self.program.value(v);
        let ValueKind::Phi { edges } = &vd.kind else {
            return None;
        };
        if edges.len() != 2 {
            return None;
        }
        let (func, block) = (vd.func?, vd.block?);
        let cfg = self.cfgs.get(func);
        if cfg.loops().is_header(block) {
            return None;
        }
        for e in edges {
            let ed = self.program.value(*e);
            if !matches!(ed.kind, ValueKind::Phi { .. }) || ed.func != Some(func) {
                return None;
            }
            match ed.block {
                Some(b) if cfg.loops().is_header(b) => {}
                _ => return None,
            }
        }
        for instr in &self.program.block(func, block).instrs {
            if *instr == v {
                continue;
            }
            if let ValueKind::Phi { edges: other } = &self.program.value(*instr).kind {
                if other.len() == 2 && other[0] == edges[1] && other[1] == edges[0] {
                    return Some(*instr);
                }
            }
        }
        None
    }
}

fn push_unique(out: &mut Vec<ValueId>, v: ValueId) {
    if !out.contains(&v) {
        out.push(v);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::cfg::CfgCache;
    use crate::directives::NoDirectives;
    use crate::ssa::{ProgramBuilder, TypeId};

    fn builder_with_handle() -> (ProgramBuilder, TypeId, TypeId) {
        let mut pb = ProgramBuilder::new();
        let db = pb.types_mut().named("gorm.io/gorm", "DB");
        let handle = pb.types_mut().pointer_to(db);
        let slot = pb.types_mut().pointer_to(handle);
        (pb, handle, slot)
    }

    #[test]
    fn chain_method_result_is_its_own_root() {
        let (mut pb, handle, _) = builder_with_handle();
        let f = pb.declare_func("f");
        let mut fb = pb.build_func(f);
        let db = fb.param(handle);
        fb.block();
        let q = fb.method_call(db, "Where", vec![], Some(handle));
        let q2 = fb.method_call(q, "Order", vec![], Some(handle));
        fb.ret(vec![q2]);
        let program = pb.finish().unwrap();

        let cfgs = CfgCache::new(&program);
        let oracle = TypeOracle::default();
        let tracer = RootTracer::new(&program, &oracle, &NoDirectives, &cfgs);
        assert_eq!(tracer.trace(db), None);
        assert_eq!(tracer.trace(q), Some(q));
        // Tracing stops at the call; the receiver is not followed
        assert_eq!(tracer.trace(q2), Some(q2));
    }

    #[test]
    fn immutable_constructor_result_is_immutable() {
        let (mut pb, handle, _) = builder_with_handle();
        let f = pb.declare_func("f");
        let mut fb = pb.build_func(f);
        let db = fb.param(handle);
        fb.block();
        let q = fb.method_call(db, "Where", vec![], Some(handle));
        let s = fb.method_call(q, "Session", vec![], Some(handle));
        fb.ret(vec![s]);
        let program = pb.finish().unwrap();

        let cfgs = CfgCache::new(&program);
        let oracle = TypeOracle::default();
        let tracer = RootTracer::new(&program, &oracle, &NoDirectives, &cfgs);
        assert_eq!(tracer.trace(s), None);
    }

    #[test]
    fn loop_header_phi_prefers_the_back_edge() {
        let (mut pb, handle, _) = builder_with_handle();
        let f = pb.declare_func("f");
        let mut fb = pb.build_func(f);
        let db = fb.param(handle);
        let entry = fb.block();
        let header = fb.block();
        let body = fb.block();
        let exit = fb.block();
        fb.edge(entry, header);
        fb.edge(body, header);
        fb.edge(header, body);
        fb.edge(header, exit);
        let w0 = fb.method_call(db, "Where", vec![], Some(handle));
        fb.switch_to(header);
        let h = fb.phi(vec![], Some(handle));
        fb.switch_to(body);
        let w1 = fb.method_call(h, "Where", vec![], Some(handle));
        fb.set_phi_edges(h, vec![w0, w1]);
        fb.switch_to(exit);
        fb.ret(vec![]);
        let program = pb.finish().unwrap();

        let cfgs = CfgCache::new(&program);
        let oracle = TypeOracle::default();
        let tracer = RootTracer::new(&program, &oracle, &NoDirectives, &cfgs);
        // Inside the loop the current identity is last iteration's result
        assert_eq!(tracer.trace(h), Some(w1));
        let mut all = tracer.trace_all(h);
        all.sort();
        assert_eq!(all, vec![w0, w1]);
    }

    #[test]
    fn swapped_loop_variables_stay_independent() {
        // for { if cond { x, y = y, x } }
        let (mut pb, handle, _) = builder_with_handle();
        let f = pb.declare_func("f");
        let mut fb = pb.build_func(f);
        let db = fb.param(handle);
        let entry = fb.block();
        let header = fb.block();
        let cond = fb.block();
        let swap = fb.block();
        let merge = fb.block();
        let exit = fb.block();
        fb.edge(entry, header);
        fb.edge(header, cond);
        fb.edge(header, exit);
        fb.edge(cond, merge);
        fb.edge(cond, swap);
        fb.edge(swap, merge);
        fb.edge(merge, header);
        let x0 = fb.method_call(db, "Where", vec![], Some(handle));
        let y0 = fb.method_call(db, "Where", vec![], Some(handle));
        fb.switch_to(header);
        let hx = fb.phi(vec![], Some(handle));
        let hy = fb.phi(vec![], Some(handle));
        fb.switch_to(merge);
        let sx = fb.phi(vec![hx, hy], Some(handle));
        let sy = fb.phi(vec![hy, hx], Some(handle));
        fb.set_phi_edges(hx, vec![x0, sx]);
        fb.set_phi_edges(hy, vec![y0, sy]);
        fb.switch_to(exit);
        fb.ret(vec![]);
        let program = pb.finish().unwrap();

        let cfgs = CfgCache::new(&program);
        let oracle = TypeOracle::default();
        let tracer = RootTracer::new(&program, &oracle, &NoDirectives, &cfgs);

        // The swap phi is an independent identity for the single-root
        // query, while the all-roots query lets pre-loop pollution
        // through the initial edges.
        assert_eq!(tracer.trace(sx), Some(sx));
        let mut all = tracer.trace_all(sx);
        all.sort();
        let mut expected = vec![x0, y0, sx];
        expected.sort();
        assert_eq!(all, expected);
    }

    #[test]
    fn stored_iife_result_is_the_call() {
        let (mut pb, handle, slot_ty) = builder_with_handle();
        let func_ty = pb.types_mut().intern(crate::ssa::TypeKind::Function);
        let closure = pb.declare_func("f$1");
        let f = pb.declare_func("f");

        let mut fb = pb.build_func(f);
        let db = fb.param(handle);
        fb.block();
        let q = fb.method_call(db, "Where", vec![], Some(handle));
        let mc = fb.make_closure(closure, vec![q], Some(func_ty));
        let r = fb.call_dynamic(mc, vec![], Some(handle));
        let slot = fb.alloc("saved", slot_ty);
        fb.store(slot, r);
        fb.ret(vec![]);
        drop(fb);

        let mut cb = pb.build_func(closure);
        cb.set_parent(f);
        let captured = cb.free_var(handle);
        cb.block();
        cb.ret(vec![captured]);
        let program = pb.finish().unwrap();

        let cfgs = CfgCache::new(&program);
        let oracle = TypeOracle::default();
        let tracer = RootTracer::new(&program, &oracle, &NoDirectives, &cfgs);
        assert!(tracer.is_stored(r));
        assert_eq!(tracer.trace(r), Some(r));
    }

    #[test]
    fn iife_result_passed_to_spawned_or_deferred_calls_is_stored() {
        // go process(func() *DB { return q }()) and the defer twin: the
        // result escapes as an ordinary argument, so the call is opaque.
        let (mut pb, handle, _) = builder_with_handle();
        let func_ty = pb.types_mut().intern(crate::ssa::TypeKind::Function);
        let closure = pb.declare_func("f$1");
        let process = pb.declare_func("process");
        {
            let mut hb = pb.build_func(process);
            hb.param(handle);
            hb.block();
            hb.ret(vec![]);
        }
        let f = pb.declare_func("f");

        let mut fb = pb.build_func(f);
        let db = fb.param(handle);
        fb.block();
        let q = fb.method_call(db, "Where", vec![], Some(handle));
        let mc = fb.make_closure(closure, vec![q], Some(func_ty));
        let spawned_arg = fb.call_dynamic(mc, vec![], Some(handle));
        fb.go_func(process, vec![spawned_arg]);
        let deferred_arg = fb.call_dynamic(mc, vec![], Some(handle));
        fb.defer_func(process, vec![deferred_arg]);
        fb.ret(vec![]);
        drop(fb);

        let mut cb = pb.build_func(closure);
        cb.set_parent(f);
        let captured = cb.free_var(handle);
        cb.block();
        cb.ret(vec![captured]);
        let program = pb.finish().unwrap();

        let cfgs = CfgCache::new(&program);
        let oracle = TypeOracle::default();
        let tracer = RootTracer::new(&program, &oracle, &NoDirectives, &cfgs);
        assert!(tracer.is_stored(spawned_arg));
        assert_eq!(tracer.trace(spawned_arg), Some(spawned_arg));
        assert!(tracer.is_stored(deferred_arg));
        assert_eq!(tracer.trace(deferred_arg), Some(deferred_arg));
    }

    #[test]
    fn cycle_in_the_value_graph_is_immutable() {
        let (mut pb, handle, _) = builder_with_handle();
        let f = pb.declare_func("f");
        let mut fb = pb.build_func(f);
        fb.param(handle);
        let b0 = fb.block();
        let b1 = fb.block();
        fb.edge(b0, b1);
        fb.edge(b1, b1);
        fb.switch_to(b1);
        let h = fb.phi(vec![], Some(handle));
        let wrapped = fb.instr(crate::ssa::ValueKind::ChangeType { value: h }, Some(handle));
        fb.set_phi_edges(h, vec![wrapped, wrapped]);
        fb.ret(vec![]);
        let program = pb.finish().unwrap();

        let cfgs = CfgCache::new(&program);
        let oracle = TypeOracle::default();
        let tracer = RootTracer::new(&program, &oracle, &NoDirectives, &cfgs);
        assert_eq!(tracer.trace(h), None);
        assert_eq!(tracer.trace_all(h), vec![]);
    }
}
