//! Borrowed SSA program model
//!
//! This module defines the shape of the SSA input the analyzer consumes:
//! functions as ordered lists of basic blocks, blocks as ordered lists of
//! instructions, and values that expose their kind, type, defining block,
//! and referrers. An external SSA builder supplies programs of this shape;
//! the analyzer never mutates a [`Program`] after construction.
//!
//! [`build`] offers a validated programmatic constructor, used by the test
//! suite and by embedders bridging an SSA held in another form.

pub mod build;
pub mod function;
pub mod printer;
pub mod program;
pub mod types;
pub mod value;

pub use build::{FunctionBuilder, ProgramBuilder};
pub use function::{BlockData, FunctionData};
pub use printer::render_function;
pub use program::Program;
pub use types::{TypeId, TypeKind, TypeTable};
pub use value::{BlockId, Callee, CallExpr, FuncId, ValueData, ValueId, ValueKind};
