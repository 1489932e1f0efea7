//! Value-range analysis over memory address expressions, plus small
//! loop-classification utilities built on [`qpu_hir::LoopFinder`]'s output.

mod loop_classification;
mod range;

pub use loop_classification::{classify_blocks, LoopRole};
pub use range::{AccessOperand, AccessRangeAnalyzer, IntegerRange, MemoryAccessRange};
