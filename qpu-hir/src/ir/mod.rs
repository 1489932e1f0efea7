pub mod block;
pub mod cfg;
pub mod instruction;
pub mod local;
pub mod loops;
pub mod method;
pub mod value;

pub use self::{
    block::{BasicBlock, BlockId},
    cfg::{CfgEdge, CfgError, ControlFlowGraph, NodeIndex},
    instruction::{
        AluDispatch, AluOpcode, AluOperation, Branch, CombinedOperation, Condition, Decorations,
        Instruction, InstructionKind, LoadImmediate, LoadImmediateKind, MemoryInstruction, MemoryOp,
        MoveOperation, RegisterPort,
    },
    local::{GlobalInitializer, Local, LocalId, LocalOrigin, LocalPool, LocalReference},
    loops::{ControlFlowLoop, LoopFinder},
    method::Method,
    value::{HardwareRegister, Lane, Literal, RegisterFile, SIMDVector, SmallImmediate, Value, SIMD_WIDTH},
};
