//! Package-level entry point: parallel per-function analysis, directive
//! handling, purity validation wiring, and report ordering.

mod common;

use chainguard::{
    analyze_program, CancelToken, DirectiveSet, NoDirectives, TypeOracle, ViolationKind,
};
use chainguard::ssa::ProgramBuilder;
use common::handle_types;
use pretty_assertions::assert_eq;

#[test]
fn report_spans_functions_in_source_order() {
    let mut pb = ProgramBuilder::new();
    let t = handle_types(&mut pb);

    let first = pb.declare_func("first");
    {
        let mut fb = pb.build_func(first);
        let db = fb.param(t.handle);
        fb.block();
        let q = fb.method_call(db, "Where", vec![], Some(t.handle));
        fb.method_call(q, "Find", vec![], Some(t.handle));
        fb.method_call(q, "Count", vec![], Some(t.handle));
        fb.ret(vec![]);
    }
    let second = pb.declare_func("second");
    {
        let mut fb = pb.build_func(second);
        let db = fb.param(t.handle);
        fb.block();
        let q = fb.method_call(db, "Where", vec![], Some(t.handle));
        fb.method_call(q, "Find", vec![], Some(t.handle));
        fb.method_call(q, "Find", vec![], Some(t.handle));
        fb.ret(vec![]);
    }
    let program = pb.finish().unwrap();

    let violations = analyze_program(
        &program,
        &TypeOracle::default(),
        &NoDirectives,
        &CancelToken::new(),
    );
    assert_eq!(violations.len(), 2);
    assert!(violations[0].pos < violations[1].pos);
    assert!(violations
        .iter()
        .all(|v| v.kind == ViolationKind::BuilderReuse));
}

#[test]
fn ignored_functions_are_skipped() {
    let mut pb = ProgramBuilder::new();
    let t = handle_types(&mut pb);
    let f = pb.declare_func("f");
    {
        let mut fb = pb.build_func(f);
        let db = fb.param(t.handle);
        fb.block();
        let q = fb.method_call(db, "Where", vec![], Some(t.handle));
        fb.method_call(q, "Find", vec![], Some(t.handle));
        fb.method_call(q, "Count", vec![], Some(t.handle));
        fb.ret(vec![]);
    }
    let program = pb.finish().unwrap();

    let mut directives = DirectiveSet::new();
    directives.ignored.insert(f);
    let violations = analyze_program(
        &program,
        &TypeOracle::default(),
        &directives,
        &CancelToken::new(),
    );
    assert_eq!(violations, vec![]);
}

#[test]
fn ignored_lines_suppress_single_diagnostics() {
    let mut pb = ProgramBuilder::new();
    let t = handle_types(&mut pb);
    let f = pb.declare_func("f");
    let mut fb = pb.build_func(f);
    let db = fb.param(t.handle);
    fb.block();
    let q = fb.method_call(db, "Where", vec![], Some(t.handle));
    fb.method_call(q, "Find", vec![], Some(t.handle));
    let count = fb.method_call(q, "Count", vec![], Some(t.handle));
    fb.ret(vec![]);
    let program = pb.finish().unwrap();

    let mut directives = DirectiveSet::new();
    directives.ignored_lines.insert(program.pos(count).line);
    let violations = analyze_program(
        &program,
        &TypeOracle::default(),
        &directives,
        &CancelToken::new(),
    );
    assert_eq!(violations, vec![]);
}

#[test]
fn pure_declarations_are_validated_alongside_reuse() {
    let mut pb = ProgramBuilder::new();
    let t = handle_types(&mut pb);
    let helper = pb.declare_func("helper");
    {
        let mut hb = pb.build_func(helper);
        let db = hb.param(t.handle);
        hb.block();
        let w = hb.method_call(db, "Where", vec![], Some(t.handle));
        hb.ret(vec![w]);
    }
    let program = pb.finish().unwrap();

    let mut directives = DirectiveSet::new();
    directives.pure.insert(helper);
    let violations = analyze_program(
        &program,
        &TypeOracle::default(),
        &directives,
        &CancelToken::new(),
    );
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].kind, ViolationKind::PurityPollutes);
}

#[test]
fn cancelled_analysis_reports_nothing() {
    let mut pb = ProgramBuilder::new();
    let t = handle_types(&mut pb);
    let f = pb.declare_func("f");
    {
        let mut fb = pb.build_func(f);
        let db = fb.param(t.handle);
        fb.block();
        let q = fb.method_call(db, "Where", vec![], Some(t.handle));
        fb.method_call(q, "Find", vec![], Some(t.handle));
        fb.method_call(q, "Count", vec![], Some(t.handle));
        fb.ret(vec![]);
    }
    let program = pb.finish().unwrap();

    let cancel = CancelToken::new();
    cancel.cancel();
    let violations = analyze_program(&program, &TypeOracle::default(), &NoDirectives, &cancel);
    assert_eq!(violations, vec![]);
}

#[test]
fn immutable_returning_directive_clears_a_helper_result() {
    // q := freshQuery(db); q.Find; q.Count -- with freshQuery declared
    // immutable-returning, both uses are independent.
    let mut pb = ProgramBuilder::new();
    let t = handle_types(&mut pb);
    let fresh = pb.declare_func("freshQuery");
    {
        let mut hb = pb.build_func(fresh);
        let db = hb.param(t.handle);
        hb.block();
        let s = hb.method_call(db, "Session", vec![], Some(t.handle));
        hb.ret(vec![s]);
    }
    let f = pb.declare_func("f");
    {
        let mut fb = pb.build_func(f);
        let db = fb.param(t.handle);
        fb.block();
        let q = fb.call_func(fresh, vec![db], Some(t.handle));
        fb.method_call(q, "Find", vec![], Some(t.handle));
        fb.method_call(q, "Count", vec![], Some(t.handle));
        fb.ret(vec![]);
    }
    let program = pb.finish().unwrap();

    let mut directives = DirectiveSet::new();
    directives.immutable_returning.insert(fresh);
    let violations = analyze_program(
        &program,
        &TypeOracle::default(),
        &directives,
        &CancelToken::new(),
    );
    assert_eq!(violations, vec![]);

    // Without the directive the helper result is a root and reuse reports
    let violations = analyze_program(
        &program,
        &TypeOracle::default(),
        &NoDirectives,
        &CancelToken::new(),
    );
    assert_eq!(violations.len(), 1);
}
