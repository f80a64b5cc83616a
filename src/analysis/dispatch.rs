//! Per-instruction recording policies
//!
//! One tagged-variant dispatch over the instruction kind decides how a
//! builder-touching instruction is recorded: method calls run the full
//! receiver policy, escapes into containers/channels/interfaces pollute,
//! spawns and defers are queued for the later sweeps.

use log::trace;

use super::orchestrator::AnalysisCtx;
use super::traverse;
use crate::ssa::{Callee, CallExpr, ValueId, ValueKind};

/// Which sweep a call is being processed in. Spawned calls still use CFG
/// reachability; deferred calls run at function exit and use the
/// polluted-anywhere predicate instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sweep {
    Regular,
    Spawned,
    Deferred,
}

pub(crate) fn dispatch_instr(ctx: &mut AnalysisCtx<'_>, v: ValueId, sweep: Sweep) {
    let kind = ctx.program.value(v).kind.clone();
    match kind {
        ValueKind::Call(call) => visit_call(ctx, v, &call, sweep),
        ValueKind::Send { value, .. } => escape(ctx, v, value),
        ValueKind::MapUpdate { value, .. } => escape(ctx, v, value),
        ValueKind::Store { addr, value } => {
            // Only element stores escape; a store to a local slot is an
            // assignment and is handled by the receiver policy.
            if matches!(ctx.program.value(addr).kind, ValueKind::IndexAddr { .. }) {
                escape(ctx, v, value);
            }
        }
        ValueKind::MakeInterface { value } => escape(ctx, v, value),
        ValueKind::Go(_) => ctx.go_queue.push(v),
        ValueKind::Defer(_) => ctx.defer_queue.push(v),
        _ => {}
    }
}

/// Process a queued goroutine spawn or deferred call.
pub(crate) fn process_queued(ctx: &mut AnalysisCtx<'_>, v: ValueId, sweep: Sweep) {
    let Some(call) = ctx.program.value(v).kind.as_call().cloned() else {
        return;
    };
    visit_call(ctx, v, &call, sweep);
}

fn visit_call(ctx: &mut AnalysisCtx<'_>, v: ValueId, call: &CallExpr, sweep: Sweep) {
    match &call.callee {
        Callee::Method { recv, name } if ctx.oracle.is_handle_value(ctx.program, *recv) => {
            method_policy(ctx, v, *recv, name, sweep);
        }
        Callee::Method { .. } => pollute_args(ctx, v, &call.args),
        Callee::Function(f) => {
            if !ctx.directives.is_pure(*f) {
                pollute_args(ctx, v, &call.args);
            }
        }
        Callee::Dynamic(d) => match traverse::resolve_closure(ctx.program, *d) {
            Some((cf, bindings)) => {
                let bound = ctx.program.func(cf).bound_method.clone();
                match (bound, bindings.first().copied()) {
                    (Some(method), Some(recv))
                        if ctx.oracle.is_handle_value(ctx.program, recv) =>
                    {
                        // Receiver was pre-bound at closure creation
                        method_policy(ctx, v, recv, &method, sweep);
                    }
                    _ => pollute_args(ctx, v, &call.args),
                }
            }
            None => pollute_args(ctx, v, &call.args),
        },
    }
}

/// Builder arguments escaping into a call whose callee is not pure.
fn pollute_args(ctx: &mut AnalysisCtx<'_>, v: ValueId, args: &[ValueId]) {
    for arg in args {
        if ctx.oracle.is_handle_value(ctx.program, *arg) {
            escape(ctx, v, *arg);
        }
    }
}

/// A builder value leaves the tracked chain; its root is consumed here.
fn escape(ctx: &mut AnalysisCtx<'_>, instr: ValueId, value: ValueId) {
    if !ctx.oracle.is_handle_value(ctx.program, value) {
        return;
    }
    let Some(root) = ctx.tracer.trace(value) else {
        return;
    };
    let vd = ctx.program.value(instr);
    let (Some(func), Some(block)) = (vd.func, vd.block) else {
        return;
    };
    let pos = vd.pos;
    ctx.tracker.mark_polluted(root, func, block, pos);
}

/// The receiver policy for a builder method call.
fn method_policy(ctx: &mut AnalysisCtx<'_>, v: ValueId, recv: ValueId, name: &str, sweep: Sweep) {
    let Some(root) = ctx.tracer.trace(recv) else {
        return;
    };
    let vd = ctx.program.value(v);
    let (Some(func), Some(block)) = (vd.func, vd.block) else {
        return;
    };
    let pos = vd.pos;

    if ctx.oracle.is_immutable_returning_builtin(name) {
        ctx.tracker.record_pure_use(root, pos);
        return;
    }
    if is_assignment(ctx, v) {
        ctx.tracker.record_assignment(root, pos);
        return;
    }
    if ctx.oracle.is_finisher_builtin(name) {
        trace!("finisher {} consumes {:?} at {}", name, root, pos);
    }

    // Check prior pollution against every dynamic origin before this use
    // is recorded, so a call never reports against itself.
    let alternatives = ctx.tracer.trace_all(recv);
    let prior: Vec<ValueId> = alternatives
        .into_iter()
        .filter(|alt| match sweep {
            Sweep::Deferred => ctx.tracker.is_polluted_anywhere(*alt),
            _ => ctx.tracker.is_polluted_at(*alt, func, block, ctx.cfgs),
        })
        .collect();

    ctx.tracker.mark_polluted(root, func, block, pos);
    for alt in prior {
        ctx.tracker.add_violation(pos, alt);
    }

    // A use inside a loop of a root established outside it repeats on the
    // second iteration unconditionally.
    let cfg = ctx.cfgs.get(func);
    if cfg.loops().contains(block) && cfg.is_defined_outside(ctx.program, root) {
        ctx.tracker.add_violation(pos, root);
    }
}

/// A call result is "assigned" when its only downstream uses are phis
/// and/or stores to a local slot.
fn is_assignment(ctx: &AnalysisCtx<'_>, v: ValueId) -> bool {
    let referrers = &ctx.program.value(v).referrers;
    if referrers.is_empty() {
        return false;
    }
    referrers.iter().all(|r| match &ctx.program.value(*r).kind {
        ValueKind::Phi { .. } => true,
        ValueKind::Store { addr, value } => {
            *value == v && matches!(ctx.program.value(*addr).kind, ValueKind::Alloc { .. })
        }
        _ => false,
    })
}
