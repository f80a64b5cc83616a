//! Purity inference and pure-contract validation scenarios.

mod common;

use chainguard::analysis::{validate, Purity, PurityInference, TypeOracle};
use chainguard::ssa::ProgramBuilder;
use chainguard::{DirectiveSet, NoDirectives, ViolationKind};
use common::handle_types;
use pretty_assertions::assert_eq;

#[test]
fn pure_function_calling_a_chain_method_is_flagged() {
    // pure helper(db): db.Where("x")
    let mut pb = ProgramBuilder::new();
    let t = handle_types(&mut pb);
    let helper = pb.declare_func("helper");
    let mut hb = pb.build_func(helper);
    let db = hb.param(t.handle);
    hb.block();
    let w = hb.method_call(db, "Where", vec![], Some(t.handle));
    hb.ret(vec![w]);
    let program = pb.finish().unwrap();

    let oracle = TypeOracle::default();
    let diags = validate(&program, helper, &oracle, &NoDirectives);
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].pos, program.pos(w));
    assert_eq!(diags[0].kind, ViolationKind::PurityPollutes);
    assert!(diags[0].message.contains("Where"));
}

#[test]
fn pure_function_leaking_to_a_non_pure_callee_is_flagged() {
    let mut pb = ProgramBuilder::new();
    let t = handle_types(&mut pb);
    let sink = pb.declare_func("persist");
    {
        let mut sb = pb.build_func(sink);
        sb.param(t.handle);
        sb.block();
        sb.ret(vec![]);
    }
    let helper = pb.declare_func("helper");
    let mut hb = pb.build_func(helper);
    let db = hb.param(t.handle);
    hb.block();
    let call = hb.call_func(sink, vec![db], None);
    hb.ret(vec![]);
    let program = pb.finish().unwrap();

    let oracle = TypeOracle::default();
    let diags = validate(&program, helper, &oracle, &NoDirectives);
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].pos, program.pos(call));
    assert_eq!(diags[0].kind, ViolationKind::PurityLeaks);
    assert!(diags[0].message.contains("persist"));
}

#[test]
fn session_use_keeps_the_contract() {
    // pure helper(db): return db.Session({})
    let mut pb = ProgramBuilder::new();
    let t = handle_types(&mut pb);
    let helper = pb.declare_func("helper");
    let mut hb = pb.build_func(helper);
    let db = hb.param(t.handle);
    hb.block();
    let s = hb.method_call(db, "Session", vec![], Some(t.handle));
    hb.ret(vec![s]);
    let program = pb.finish().unwrap();

    let oracle = TypeOracle::default();
    assert_eq!(validate(&program, helper, &oracle, &NoDirectives), vec![]);

    let inference = PurityInference::new(&program, &oracle, &NoDirectives);
    assert_eq!(inference.infer_return(helper), Purity::Clean);
}

#[test]
fn returning_the_parameter_depends_on_the_caller() {
    let mut pb = ProgramBuilder::new();
    let t = handle_types(&mut pb);
    let helper = pb.declare_func("helper");
    let mut hb = pb.build_func(helper);
    let db = hb.param(t.handle);
    hb.block();
    hb.ret(vec![db]);
    let program = pb.finish().unwrap();

    let oracle = TypeOracle::default();
    assert_eq!(validate(&program, helper, &oracle, &NoDirectives), vec![]);

    let inference = PurityInference::new(&program, &oracle, &NoDirectives);
    let ret = inference.infer_return(helper);
    assert_eq!(ret, Purity::depends_on(db));
    assert!(ret.valid_for_pure_return());
}

#[test]
fn chain_method_result_infers_polluted() {
    let mut pb = ProgramBuilder::new();
    let t = handle_types(&mut pb);
    let f = pb.declare_func("f");
    let mut fb = pb.build_func(f);
    let db = fb.param(t.handle);
    fb.block();
    let w = fb.method_call(db, "Where", vec![], Some(t.handle));
    fb.ret(vec![w]);
    let program = pb.finish().unwrap();

    let oracle = TypeOracle::default();
    let inference = PurityInference::new(&program, &oracle, &NoDirectives);
    assert_eq!(inference.infer_value(w), Purity::Polluted);
    assert_eq!(inference.infer_return(f), Purity::Polluted);
}

#[test]
fn phi_joins_short_circuit_on_pollution() {
    let mut pb = ProgramBuilder::new();
    let t = handle_types(&mut pb);
    let f = pb.declare_func("f");
    let mut fb = pb.build_func(f);
    let db = fb.param(t.handle);
    let b0 = fb.block();
    let left = fb.block();
    let right = fb.block();
    let merge = fb.block();
    fb.edge(b0, left);
    fb.edge(b0, right);
    fb.edge(left, merge);
    fb.edge(right, merge);
    fb.switch_to(left);
    let s = fb.method_call(db, "Session", vec![], Some(t.handle));
    fb.switch_to(right);
    let w = fb.method_call(db, "Where", vec![], Some(t.handle));
    fb.switch_to(merge);
    let joined = fb.phi(vec![s, w], Some(t.handle));
    fb.ret(vec![joined]);
    let program = pb.finish().unwrap();

    let oracle = TypeOracle::default();
    let inference = PurityInference::new(&program, &oracle, &NoDirectives);
    assert_eq!(inference.infer_value(s), Purity::Clean);
    assert_eq!(inference.infer_value(joined), Purity::Polluted);
}

#[test]
fn pure_helper_composes_through_its_parameter() {
    // pure id(db) { return db }; f(db) { return id(db) }
    let mut pb = ProgramBuilder::new();
    let t = handle_types(&mut pb);
    let id_fn = pb.declare_func("id");
    {
        let mut ib = pb.build_func(id_fn);
        let p = ib.param(t.handle);
        ib.block();
        ib.ret(vec![p]);
    }
    let f = pb.declare_func("f");
    let mut fb = pb.build_func(f);
    let db = fb.param(t.handle);
    fb.block();
    let call = fb.call_func(id_fn, vec![db], Some(t.handle));
    fb.ret(vec![call]);
    let program = pb.finish().unwrap();

    let mut directives = DirectiveSet::new();
    directives.pure.insert(id_fn);
    let oracle = TypeOracle::default();
    let inference = PurityInference::new(&program, &oracle, &directives);
    // The argument traces to f's own parameter, so purity rides on it
    assert_eq!(inference.infer_value(call), Purity::depends_on(db));
}

#[test]
fn callee_summary_substitutes_only_depended_parameters() {
    // pure pick(a, b) { return b }: a tainted first argument does not
    // taint the result, because the summary rides on b alone.
    let mut pb = ProgramBuilder::new();
    let t = handle_types(&mut pb);
    let pick = pb.declare_func("pick");
    {
        let mut fb = pb.build_func(pick);
        fb.param(t.handle);
        let b = fb.param(t.handle);
        fb.block();
        fb.ret(vec![b]);
    }
    let f = pb.declare_func("f");
    let mut fb = pb.build_func(f);
    let db = fb.param(t.handle);
    fb.block();
    let tainted = fb.method_call(db, "Where", vec![], Some(t.handle));
    let call = fb.call_func(pick, vec![tainted, db], Some(t.handle));
    fb.ret(vec![call]);
    let program = pb.finish().unwrap();

    let mut directives = DirectiveSet::new();
    directives.pure.insert(pick);
    let oracle = TypeOracle::default();
    let inference = PurityInference::new(&program, &oracle, &directives);
    assert_eq!(inference.infer_value(call), Purity::depends_on(db));
}

#[test]
fn function_summaries_are_stable_under_recursion() {
    // pure loopy(db) { return loopy(db) }: the summary settles on the
    // parameter dependency instead of spinning.
    let mut pb = ProgramBuilder::new();
    let t = handle_types(&mut pb);
    let loopy = pb.declare_func("loopy");
    let mut fb = pb.build_func(loopy);
    let db = fb.param(t.handle);
    fb.block();
    let call = fb.call_func(loopy, vec![db], Some(t.handle));
    fb.ret(vec![call]);
    let program = pb.finish().unwrap();

    let mut directives = DirectiveSet::new();
    directives.pure.insert(loopy);
    let oracle = TypeOracle::default();
    let inference = PurityInference::new(&program, &oracle, &directives);
    let first = inference.summary(loopy);
    assert_eq!(first, Purity::depends_on(db));
    assert_eq!(inference.summary(loopy), first);
}

#[test]
fn value_cycle_infers_polluted() {
    let mut pb = ProgramBuilder::new();
    let t = handle_types(&mut pb);
    let f = pb.declare_func("f");
    let mut fb = pb.build_func(f);
    fb.param(t.handle);
    let b0 = fb.block();
    let b1 = fb.block();
    fb.edge(b0, b1);
    fb.edge(b1, b1);
    fb.switch_to(b1);
    let h = fb.phi(vec![], Some(t.handle));
    let wrapped = fb.instr(
        chainguard::ssa::ValueKind::ChangeType { value: h },
        Some(t.handle),
    );
    fb.set_phi_edges(h, vec![wrapped, wrapped]);
    fb.ret(vec![]);
    let program = pb.finish().unwrap();

    let oracle = TypeOracle::default();
    let inference = PurityInference::new(&program, &oracle, &NoDirectives);
    assert_eq!(inference.infer_value(h), Purity::Polluted);
}

#[test]
fn capturing_closure_infers_polluted() {
    let mut pb = ProgramBuilder::new();
    let t = handle_types(&mut pb);
    let func_ty = pb.types_mut().intern(chainguard::ssa::TypeKind::Function);
    let closure = pb.declare_func("f$1");
    let f = pb.declare_func("f");
    let mut fb = pb.build_func(f);
    let db = fb.param(t.handle);
    fb.block();
    let mc = fb.make_closure(closure, vec![db], Some(func_ty));
    fb.ret(vec![]);
    drop(fb);
    let mut cb = pb.build_func(closure);
    cb.set_parent(f);
    cb.free_var(t.handle);
    cb.block();
    cb.ret(vec![]);
    let program = pb.finish().unwrap();

    let oracle = TypeOracle::default();
    let inference = PurityInference::new(&program, &oracle, &NoDirectives);
    assert_eq!(inference.infer_value(mc), Purity::Polluted);
}
