//! Diagnostic records emitted by the analyzer

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ssa::ValueId;

/// Location in source code. Positions are totally ordered by line then
/// column; the analyzer uses this order both to sort the final report and
/// to decide the direction of cross-closure pollution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Pos {
    pub line: usize,
    pub column: usize,
}

impl Pos {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Severity levels for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// What kind of diagnostic a violation carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViolationKind {
    /// A query builder was reused after a chain method consumed it
    BuilderReuse,
    /// A declared-pure function mutates a builder argument
    PurityPollutes,
    /// A declared-pure function leaks a builder argument to a non-pure callee
    PurityLeaks,
    /// A declared immutable-returning function may return a dependent or
    /// tainted builder
    ImmutableReturnBroken,
}

impl ViolationKind {
    /// Reuse corrupts queries at runtime; the contract diagnostics warn
    /// about declarations that may do so in some caller.
    pub fn severity(&self) -> Severity {
        match self {
            ViolationKind::BuilderReuse => Severity::Error,
            ViolationKind::PurityPollutes
            | ViolationKind::PurityLeaks
            | ViolationKind::ImmutableReturnBroken => Severity::Warning,
        }
    }
}

/// A diagnostic record. `root` names the SSA value whose identity was
/// reused, when one was identified; purity diagnostics leave it empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub pos: Pos,
    pub kind: ViolationKind,
    pub message: String,
    pub root: Option<ValueId>,
}

impl Violation {
    /// The advisory for a builder reuse, recommending the configured
    /// session-style constructor as the fix.
    pub fn builder_reuse(pos: Pos, root: ValueId, session_constructor: &str) -> Self {
        Self {
            pos,
            kind: ViolationKind::BuilderReuse,
            message: format!(
                "query builder reused after a chain method; conditions from the earlier \
                 use leak into this query. Derive an independent builder with {}(...) \
                 before branching",
                session_constructor
            ),
            root: Some(root),
        }
    }

    pub fn purity_pollutes(pos: Pos, method: &str) -> Self {
        Self {
            pos,
            kind: ViolationKind::PurityPollutes,
            message: format!(
                "pure function pollutes builder argument by calling {}",
                method
            ),
            root: None,
        }
    }

    pub fn purity_leaks(pos: Pos, callee: &str) -> Self {
        Self {
            pos,
            kind: ViolationKind::PurityLeaks,
            message: format!(
                "pure function passes builder argument to non-pure function {}",
                callee
            ),
            root: None,
        }
    }

    pub fn immutable_return_broken(pos: Pos, func: &str) -> Self {
        Self {
            pos,
            kind: ViolationKind::ImmutableReturnBroken,
            message: format!(
                "function {} is declared immutable-returning but its result is \
                 not guaranteed independent",
                func
            ),
            root: None,
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.pos, self.message)
    }
}

/// How a use of a mutable root was recorded by the pollution tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UseKind {
    /// Immutable-returning method; does not consume the root
    Pure,
    /// Result flows straight into a variable; does not consume the root
    Assignment,
    /// Chain or finisher use; consumes the root
    Polluting,
}
