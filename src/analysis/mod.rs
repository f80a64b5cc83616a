//! The dataflow analysis engine
//!
//! This module holds the coupled core: builder-type recognition, CFG
//! loop/reachability facts, SSA traversal primitives, mutable-root
//! tracing, the per-instruction dispatcher, the pollution tracker, the
//! purity subsystem, and the orchestrator that drives them per function.

pub mod cfg;
pub mod dispatch;
pub mod oracle;
pub mod pollution;
pub mod purity;
pub mod roots;
pub mod traverse;

mod orchestrator;

pub use cfg::{CfgCache, FunctionCfg, LoopInfo};
pub use dispatch::Sweep;
pub use oracle::TypeOracle;
pub use orchestrator::{analyze_function, analyze_program, CancelToken};
pub use pollution::{OriginState, PollutionTracker};
pub use purity::{validate, validate_immutable_return, Purity, PurityInference};
pub use roots::RootTracer;
