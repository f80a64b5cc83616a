//! Functions and basic blocks

use super::value::{BlockId, FuncId, ValueId};

/// A basic block: ordered instructions plus CFG edges. Phi edge lists
/// align index-for-index with `preds`.
#[derive(Debug, Clone, Default)]
pub struct BlockData {
    pub instrs: Vec<ValueId>,
    pub preds: Vec<BlockId>,
    pub succs: Vec<BlockId>,
}

/// A function body. Closures carry their lexical parent and their free
/// variables; a receiver-pre-bound method thunk records the method name
/// it wraps so calls through it classify as method calls.
#[derive(Debug, Clone)]
pub struct FunctionData {
    pub name: String,
    pub params: Vec<ValueId>,
    pub free_vars: Vec<ValueId>,
    pub blocks: Vec<BlockData>,
    pub parent: Option<FuncId>,
    pub bound_method: Option<String>,
}

impl FunctionData {
    pub fn block(&self, id: BlockId) -> &BlockData {
        &self.blocks[id.0 as usize]
    }

    pub fn block_ids(&self) -> impl Iterator<Item = BlockId> {
        (0..self.blocks.len() as u32).map(BlockId)
    }
}
