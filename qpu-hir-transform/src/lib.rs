//! The memory-access classifier, 64-bit split/copy rewrites, the dual-issue instruction
//! scheduler, and the §4.6 ALU/load-immediate word encoder.
//!
//! Grounded on `midenc-hir-transform`'s split between `scheduling.rs` (a pass living beside the
//! other per-function rewrite passes) and this crate's analogous classifier/scheduler split.

pub mod classifier;
mod encoding;
mod scheduler;
mod vpm;

pub use classifier::{
    rewrite_read_then_write_to_copy, split_read_if_struct_aliased, split_write_if_upper_word_zero,
    CachedRange, MemoryAccess, MemoryClassifier, MemoryInfo, Realization, COPY_REWRITE_LOOKAHEAD,
};
pub use encoding::{decode_alu_word, decode_load_immediate_word, encode_alu_word, encode_load_immediate_word, AluWordFields};
pub use scheduler::{schedule, schedule_block, InstructionDag};
pub use vpm::{VpmArea, VpmManager};
