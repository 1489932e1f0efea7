use qpu_hir_symbol::Symbol;

use crate::ir::{
    block::{BasicBlock, BlockId},
    local::{LocalId, LocalPool},
};

/// A single kernel or helper function: an ordered list of blocks, its parameters, and the local
/// pool and VPM manager handle it owns exclusively.
#[derive(Debug, Clone)]
pub struct Method {
    pub name: Symbol,
    pub is_kernel: bool,
    pub parameters: Vec<LocalId>,
    blocks: Vec<BasicBlock>,
    pub locals: LocalPool,
}

impl Method {
    pub fn new(name: Symbol, is_kernel: bool) -> Self {
        Self {
            name,
            is_kernel,
            parameters: Vec::new(),
            blocks: Vec::new(),
            locals: LocalPool::new(),
        }
    }

    pub fn add_block(&mut self, block: BasicBlock) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(block);
        id
    }

    pub fn insert_block_at(&mut self, index: usize, block: BasicBlock) -> BlockId {
        self.blocks.insert(index, block);
        BlockId(index as u32)
    }

    pub fn remove_block(&mut self, id: BlockId) -> BasicBlock {
        self.blocks.remove(id.0 as usize)
    }

    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.0 as usize]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut BasicBlock {
        &mut self.blocks[id.0 as usize]
    }

    pub fn blocks(&self) -> impl Iterator<Item = (BlockId, &BasicBlock)> {
        self.blocks.iter().enumerate().map(|(i, b)| (BlockId(i as u32), b))
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn entry_block(&self) -> BlockId {
        assert!(!self.blocks.is_empty(), "method has no blocks");
        BlockId(0)
    }

    pub fn find_block_by_label(&self, label: Symbol) -> Option<BlockId> {
        self.blocks()
            .find(|(_, block)| block.label == label)
            .map(|(id, _)| id)
    }
}
