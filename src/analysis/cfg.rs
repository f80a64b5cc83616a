//! Control-flow queries over a function's basic blocks
//!
//! Supplies the two facts the rest of the analysis needs: whether one
//! block can reach another, and which blocks lie inside a natural loop.
//! Loop detection leans on the block ordering the SSA supplier guarantees
//! (roughly pre-order over structured control flow): a backward edge is
//! only a loop edge if the cycle is confirmed by reachability, which
//! keeps if/else merge blocks out of the loop set.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

use petgraph::algo::has_path_connecting;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::ssa::{BlockId, FuncId, Program, ValueId};

/// Blocks participating in natural loops, per function
#[derive(Debug, Clone, Default)]
pub struct LoopInfo {
    pub in_loop: BTreeSet<BlockId>,
    pub headers: BTreeSet<BlockId>,
}

impl LoopInfo {
    pub fn contains(&self, block: BlockId) -> bool {
        self.in_loop.contains(&block)
    }

    pub fn is_header(&self, block: BlockId) -> bool {
        self.headers.contains(&block)
    }
}

/// Reachability and loop facts for one function
pub struct FunctionCfg {
    func: FuncId,
    graph: DiGraph<BlockId, ()>,
    nodes: Vec<NodeIndex>,
    loops: LoopInfo,
}

impl FunctionCfg {
    pub fn build(program: &Program, func: FuncId) -> Self {
        let fd = program.func(func);
        let mut graph = DiGraph::new();
        let nodes: Vec<NodeIndex> = fd.block_ids().map(|b| graph.add_node(b)).collect();
        for (i, block) in fd.blocks.iter().enumerate() {
            for succ in &block.succs {
                graph.add_edge(nodes[i], nodes[succ.0 as usize], ());
            }
        }

        let mut cfg = Self {
            func,
            graph,
            nodes,
            loops: LoopInfo::default(),
        };
        cfg.loops = cfg.detect_loops(program);
        cfg
    }

    pub fn func(&self) -> FuncId {
        self.func
    }

    /// True when `dst` is reachable from `src` along successor edges.
    /// A block reaches itself, which reflects loop back-edges returning
    /// to the same block.
    pub fn reachable(&self, src: BlockId, dst: BlockId) -> bool {
        if src == dst {
            return true;
        }
        has_path_connecting(
            &self.graph,
            self.nodes[src.0 as usize],
            self.nodes[dst.0 as usize],
            None,
        )
    }

    pub fn loops(&self) -> &LoopInfo {
        &self.loops
    }

    /// Whether the value's defining block lies outside every loop of this
    /// function. Parameters and constants have no defining block and count
    /// as outside, as do values defined in other functions.
    pub fn is_defined_outside(&self, program: &Program, v: ValueId) -> bool {
        let vd = program.value(v);
        if vd.func != Some(self.func) {
            return true;
        }
        match vd.block {
            Some(block) => !self.loops.in_loop.contains(&block),
            None => true,
        }
    }

    /// An edge `block -> succ` with `index(succ) <= index(block)` is a
    /// potential back-edge; the cycle is confirmed by testing that the
    /// edge source is reachable from its target. Everything between the
    /// two indices is marked in-loop.
    fn detect_loops(&self, program: &Program) -> LoopInfo {
        let fd = program.func(self.func);
        let mut info = LoopInfo::default();
        for (i, block) in fd.blocks.iter().enumerate() {
            for succ in &block.succs {
                let j = succ.0 as usize;
                if j <= i && self.reachable(*succ, BlockId(i as u32)) {
                    for k in j..=i {
                        info.in_loop.insert(BlockId(k as u32));
                    }
                    info.headers.insert(*succ);
                }
            }
        }
        info
    }
}

/// Lazily built per-function CFGs, shared by the tracer, the dispatcher,
/// and the pollution tracker within one analysis.
pub struct CfgCache<'a> {
    program: &'a Program,
    map: RefCell<HashMap<FuncId, Rc<FunctionCfg>>>,
}

impl<'a> CfgCache<'a> {
    pub fn new(program: &'a Program) -> Self {
        Self {
            program,
            map: RefCell::new(HashMap::new()),
        }
    }

    pub fn get(&self, func: FuncId) -> Rc<FunctionCfg> {
        if let Some(cfg) = self.map.borrow().get(&func) {
            return Rc::clone(cfg);
        }
        let cfg = Rc::new(FunctionCfg::build(self.program, func));
        self.map.borrow_mut().insert(func, Rc::clone(&cfg));
        cfg
    }
}
