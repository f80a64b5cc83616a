//! Per-function and package-level analysis drivers
//!
//! A function is swept in three passes: ordinary instructions first
//! (recursing depth-first into closures created along the way), then
//! queued goroutine spawns, then queued deferred calls. Block order is
//! not execution order, so spawned calls only run once every regular
//! use has been recorded; deferred calls run last against the
//! polluted-anywhere predicate. After the sweeps, cross-use reachability
//! detection turns the recorded state into violations.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, trace};
use rayon::prelude::*;

use super::cfg::CfgCache;
use super::dispatch::{self, Sweep};
use super::oracle::TypeOracle;
use super::pollution::PollutionTracker;
use super::purity;
use super::roots::RootTracer;
use crate::core::Violation;
use crate::directives::Directives;
use crate::ssa::{FuncId, Program, ValueId, ValueKind};

/// Caller-supplied cancellation, honored between functions.
#[derive(Debug, Default, Clone)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Shared state threaded through the dispatcher while one function (and
/// the closures below it) is analyzed.
pub(crate) struct AnalysisCtx<'a> {
    pub(crate) program: &'a Program,
    pub(crate) oracle: &'a TypeOracle,
    pub(crate) directives: &'a dyn Directives,
    pub(crate) tracer: RootTracer<'a>,
    pub(crate) tracker: PollutionTracker<'a>,
    pub(crate) cfgs: &'a CfgCache<'a>,
    pub(crate) go_queue: Vec<ValueId>,
    pub(crate) defer_queue: Vec<ValueId>,
    pub(crate) visited: HashSet<FuncId>,
}

/// Analyze one function, returning its violations in source order.
pub fn analyze_function(
    program: &Program,
    func: FuncId,
    oracle: &TypeOracle,
    directives: &dyn Directives,
) -> Vec<Violation> {
    if directives.is_ignored(func) {
        return Vec::new();
    }
    if log::log_enabled!(log::Level::Trace) {
        trace!("{}", crate::ssa::render_function(program, func));
    }

    let cfgs = CfgCache::new(program);
    let mut ctx = AnalysisCtx {
        program,
        oracle,
        directives,
        tracer: RootTracer::new(program, oracle, directives, &cfgs),
        tracker: PollutionTracker::new(program, func, oracle.session_constructor()),
        cfgs: &cfgs,
        go_queue: Vec::new(),
        defer_queue: Vec::new(),
        visited: HashSet::new(),
    };
    ctx.visited.insert(func);

    sweep_func(&mut ctx, func);

    let spawned = std::mem::take(&mut ctx.go_queue);
    for call in spawned {
        dispatch::process_queued(&mut ctx, call, Sweep::Spawned);
    }
    let deferred = std::mem::take(&mut ctx.defer_queue);
    for call in deferred {
        dispatch::process_queued(&mut ctx, call, Sweep::Deferred);
    }

    ctx.tracker.detect_reachability_violations(&cfgs);
    let report = ctx.tracker.collect(directives);
    debug!(
        "analyzed {} -> {} violation(s)",
        program.func(func).name,
        report.len()
    );
    report
}

/// Pass 1 over one function body. Closure creation recurses in place,
/// depth-first, guarded against mutually referential closures.
fn sweep_func(ctx: &mut AnalysisCtx<'_>, func: FuncId) {
    let program = ctx.program;
    ctx.cfgs.get(func);
    for block in &program.func(func).blocks {
        for instr in &block.instrs {
            dispatch::dispatch_instr(ctx, *instr, Sweep::Regular);
            if let ValueKind::MakeClosure { func: closure, .. } = &program.value(*instr).kind {
                if ctx.visited.insert(*closure) {
                    sweep_func(ctx, *closure);
                }
            }
        }
    }
}

/// Analyze every top-level function of a program in parallel and validate
/// every declared-pure function, aggregating one source-ordered report.
/// Functions own disjoint state, so parallelism is safe; the token is
/// checked before each function.
pub fn analyze_program(
    program: &Program,
    oracle: &TypeOracle,
    directives: &dyn Directives,
    cancel: &CancelToken,
) -> Vec<Violation> {
    let mut violations: Vec<Violation> = program
        .top_level_funcs()
        .par_iter()
        .flat_map_iter(|func| {
            if cancel.is_cancelled() {
                return Vec::new().into_iter();
            }
            analyze_function(program, *func, oracle, directives).into_iter()
        })
        .collect();

    let declared: Vec<FuncId> = program
        .func_ids()
        .filter(|f| !directives.is_ignored(*f))
        .filter(|f| directives.is_pure(*f) || directives.is_immutable_returning(*f))
        .collect();
    let contract_diags: Vec<Violation> = declared
        .par_iter()
        .flat_map_iter(|func| {
            if cancel.is_cancelled() {
                return Vec::new().into_iter();
            }
            let mut diags = Vec::new();
            if directives.is_pure(*func) {
                diags.extend(purity::validate(program, *func, oracle, directives));
            }
            if directives.is_immutable_returning(*func) {
                diags.extend(purity::validate_immutable_return(
                    program, *func, oracle, directives,
                ));
            }
            diags.into_iter()
        })
        .collect();
    violations.extend(contract_diags);

    violations.sort_by_key(|v| v.pos);
    violations
}
