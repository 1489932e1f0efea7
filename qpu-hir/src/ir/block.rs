use qpu_hir_symbol::Symbol;

use crate::ir::{
    instruction::{Instruction, InstructionKind},
    local::LocalId,
};

/// Stable identity for a [`BasicBlock`] within a [`crate::Method`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

/// An ordered list of instructions with exactly one label at its head.
#[derive(Debug, Clone)]
pub struct BasicBlock {
    pub label: Symbol,
    instructions: Vec<Instruction>,
}

impl BasicBlock {
    pub fn new(label: Symbol) -> Self {
        Self {
            instructions: vec![Instruction::new(InstructionKind::Label(label))],
            label,
        }
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn instructions_mut(&mut self) -> &mut Vec<Instruction> {
        &mut self.instructions
    }

    pub fn push(&mut self, instruction: Instruction) {
        self.instructions.push(instruction);
    }

    /// Instructions after the leading label, the ones a `LoopFinder`/scheduler actually reasons
    /// about.
    pub fn body(&self) -> &[Instruction] {
        &self.instructions[1..]
    }

    /// The block's trailing terminator, if its last non-label instruction is a branch.
    pub fn terminator(&self) -> Option<&Instruction> {
        self.instructions
            .iter()
            .rev()
            .find(|inst| !inst.is_label())
            .filter(|inst| matches!(inst.kind, InstructionKind::Branch(_)))
    }

    /// True iff this block falls through to the textually next block, i.e. its last non-label
    /// instruction is not an unconditional branch.
    pub fn falls_through(&self) -> bool {
        match self.instructions.iter().rev().find(|inst| !inst.is_label()) {
            Some(Instruction {
                kind: InstructionKind::Branch(b),
                ..
            }) => b.condition != crate::ir::instruction::Condition::Always,
            _ => true,
        }
    }

    /// Every [`LocalId`] read by any instruction in this block, most-recent-definer-style
    /// reasoning is left to the scheduler; this is a flat scan used by analyses that need "does
    /// this block touch local X at all".
    pub fn reads(&self) -> impl Iterator<Item = LocalId> + '_ {
        self.instructions.iter().flat_map(|inst| {
            inst.inputs()
                .into_iter()
                .filter_map(|v| v.as_local())
                .collect::<Vec<_>>()
        })
    }
}
