//! chainguard — dataflow analysis for shared-state query-builder reuse
//!
//! Query-builder handles in some database libraries are shallow clones
//! sharing internal state: reusing one handle across independent query
//! paths silently accumulates conditions from unrelated branches. This
//! crate is the analysis core of a linter that catches such reuse. It
//! consumes an SSA program supplied by an external builder, resolves each
//! builder expression to its mutable origin, tracks where origins are
//! consumed, and reports every reachable second use.
//!
//! The file-walking driver, directive-comment parser, and suggested-fix
//! generator live outside this crate; they communicate through
//! [`ssa::Program`], [`directives::Directives`], and the stream of
//! [`core::Violation`] records.

pub mod analysis;
pub mod config;
pub mod core;
pub mod directives;
pub mod ssa;

// Re-export commonly used types
pub use crate::analysis::{
    analyze_function, analyze_program, validate, validate_immutable_return, CancelToken, Purity,
    PurityInference, RootTracer, TypeOracle,
};
pub use crate::config::AnalyzerConfig;
pub use crate::core::{Error, Pos, Report, Result, Violation, ViolationKind};
pub use crate::directives::{DirectiveSet, Directives, NoDirectives};
